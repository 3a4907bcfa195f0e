//! Typed Modbus client: one transporter, per-function request builders
//! and response validation.

mod device_id;
mod pdu;

pub use device_id::{DeviceIdCode, DeviceIdentification};

use std::sync::Mutex;

use tracing::debug;

use crate::config::{RtuConfig, TcpConfig};
use crate::constants::{function, BROADCAST_SLAVE_ID, COIL_OFF, COIL_ON, EXCEPTION_BIT, MAX_SLAVE_ID};
use crate::errors::{ClientError, ModbusException, ProtocolErrorKind, ValidationError};
use crate::transport::{RtuOverTcpTransport, SerialTransport, TcpTransport, Transport};

/// Creates a client speaking RTU over the given serial device.
pub fn new_rtu_client(port: &str, config: &RtuConfig) -> Result<Client, ClientError> {
    Ok(Client::with_transport(Transport::Serial(
        SerialTransport::new(port, config)?,
    )))
}

/// Creates a client speaking Modbus TCP to `endpoint` (`host:port`).
pub fn new_tcp_client(endpoint: &str, config: &TcpConfig) -> Result<Client, ClientError> {
    Ok(Client::with_transport(Transport::Tcp(TcpTransport::new(
        endpoint, config,
    )?)))
}

/// Creates a client speaking RTU framing over a TCP stream.
pub fn new_rtu_over_tcp_client(endpoint: &str, config: &TcpConfig) -> Result<Client, ClientError> {
    Ok(Client::with_transport(Transport::RtuOverTcp(
        RtuOverTcpTransport::new(endpoint, config)?,
    )))
}

pub struct Client {
    transport: Transport,
    last_exception: Mutex<Option<ModbusException>>,
}

impl Client {
    fn with_transport(transport: Transport) -> Self {
        Self {
            transport,
            last_exception: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The most recent exception any request on this client produced.
    pub fn last_exception(&self) -> Option<ModbusException> {
        self.last_exception.lock().ok().and_then(|guard| *guard)
    }

    /// Drops any pooled connection; the next request reconnects.
    pub async fn close(&self) {
        self.transport.close().await;
    }

    /// One transaction: frame, send, await, unframe, surface exceptions,
    /// verify the echoed function code.
    async fn request(&self, slave_id: u8, request: &[u8]) -> Result<Vec<u8>, ClientError> {
        if slave_id > MAX_SLAVE_ID {
            return Err(ValidationError::InvalidSlaveId(slave_id).into());
        }

        let response = self.transport.transact(slave_id, request).await?;
        if response.is_empty() {
            return Err(ClientError::protocol(
                ProtocolErrorKind::InvalidPdu,
                "Empty response PDU",
            ));
        }

        let function_code = request[0];
        if response[0] == function_code | EXCEPTION_BIT {
            if response.len() < 2 {
                return Err(ClientError::protocol(
                    ProtocolErrorKind::InvalidPdu,
                    "Exception PDU without exception code",
                ));
            }
            let exception = ModbusException::new(function_code, response[1]);
            debug!("Slave {} raised {}", slave_id, exception);
            if let Ok(mut guard) = self.last_exception.lock() {
                *guard = Some(exception);
            }
            return Err(exception.into());
        }

        if response[0] != function_code {
            return Err(ClientError::protocol(
                ProtocolErrorKind::FunctionMismatch,
                format!(
                    "Requested function {:#04X}, response carries {:#04X}",
                    function_code, response[0]
                ),
            ));
        }

        Ok(response)
    }

    async fn read_bits(
        &self,
        function_code: u8,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<bool>, ClientError> {
        if slave_id == BROADCAST_SLAVE_ID {
            return Err(ValidationError::BroadcastRead.into());
        }
        let request = pdu::build_read(function_code, address, quantity)?;
        let response = self.request(slave_id, &request).await?;
        pdu::parse_bit_response(&response[1..], quantity)
    }

    async fn read_words(
        &self,
        function_code: u8,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ClientError> {
        if slave_id == BROADCAST_SLAVE_ID {
            return Err(ValidationError::BroadcastRead.into());
        }
        let request = pdu::build_read(function_code, address, quantity)?;
        let response = self.request(slave_id, &request).await?;
        pdu::parse_word_response(&response[1..], quantity)
    }

    pub async fn read_coils(
        &self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<bool>, ClientError> {
        self.read_bits(function::READ_COILS, slave_id, address, quantity)
            .await
    }

    pub async fn read_discrete_inputs(
        &self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<bool>, ClientError> {
        self.read_bits(function::READ_DISCRETE_INPUTS, slave_id, address, quantity)
            .await
    }

    pub async fn read_holding_registers(
        &self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ClientError> {
        self.read_words(function::READ_HOLDING_REGISTERS, slave_id, address, quantity)
            .await
    }

    pub async fn read_input_registers(
        &self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ClientError> {
        self.read_words(function::READ_INPUT_REGISTERS, slave_id, address, quantity)
            .await
    }

    pub async fn write_single_coil(
        &self,
        slave_id: u8,
        address: u16,
        value: bool,
    ) -> Result<(), ClientError> {
        let wire_value = if value { COIL_ON } else { COIL_OFF };
        let request = pdu::build_write_single(function::WRITE_SINGLE_COIL, address, wire_value);
        if slave_id == BROADCAST_SLAVE_ID {
            return self.transport.send_broadcast(&request).await;
        }
        let response = self.request(slave_id, &request).await?;
        pdu::check_write_echo(&response[1..], address, wire_value)
    }

    pub async fn write_single_register(
        &self,
        slave_id: u8,
        address: u16,
        value: u16,
    ) -> Result<(), ClientError> {
        let request = pdu::build_write_single(function::WRITE_SINGLE_REGISTER, address, value);
        if slave_id == BROADCAST_SLAVE_ID {
            return self.transport.send_broadcast(&request).await;
        }
        let response = self.request(slave_id, &request).await?;
        pdu::check_write_echo(&response[1..], address, value)
    }

    pub async fn write_multiple_coils(
        &self,
        slave_id: u8,
        address: u16,
        values: &[bool],
    ) -> Result<(), ClientError> {
        let request = pdu::build_write_multiple_coils(address, values)?;
        if slave_id == BROADCAST_SLAVE_ID {
            return self.transport.send_broadcast(&request).await;
        }
        let response = self.request(slave_id, &request).await?;
        pdu::check_write_echo(&response[1..], address, values.len() as u16)
    }

    pub async fn write_multiple_registers(
        &self,
        slave_id: u8,
        address: u16,
        values: &[u16],
    ) -> Result<(), ClientError> {
        let request = pdu::build_write_multiple_registers(address, values)?;
        if slave_id == BROADCAST_SLAVE_ID {
            return self.transport.send_broadcast(&request).await;
        }
        let response = self.request(slave_id, &request).await?;
        pdu::check_write_echo(&response[1..], address, values.len() as u16)
    }

    pub async fn mask_write_register(
        &self,
        slave_id: u8,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> Result<(), ClientError> {
        let request = pdu::build_mask_write(address, and_mask, or_mask);
        if slave_id == BROADCAST_SLAVE_ID {
            return self.transport.send_broadcast(&request).await;
        }
        let response = self.request(slave_id, &request).await?;
        pdu::check_mask_echo(&response[1..], address, and_mask, or_mask)
    }

    pub async fn read_write_multiple_registers(
        &self,
        slave_id: u8,
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        values: &[u16],
    ) -> Result<Vec<u16>, ClientError> {
        if slave_id == BROADCAST_SLAVE_ID {
            return Err(ValidationError::BroadcastRead.into());
        }
        let request =
            pdu::build_read_write_multiple(read_address, read_quantity, write_address, values)?;
        let response = self.request(slave_id, &request).await?;
        pdu::parse_word_response(&response[1..], read_quantity)
    }

    pub async fn read_fifo_queue(
        &self,
        slave_id: u8,
        address: u16,
    ) -> Result<Vec<u16>, ClientError> {
        if slave_id == BROADCAST_SLAVE_ID {
            return Err(ValidationError::BroadcastRead.into());
        }
        let request = pdu::build_read_fifo(address);
        let response = self.request(slave_id, &request).await?;
        pdu::parse_fifo_response(&response[1..])
    }

    /// Sends an arbitrary PDU and returns the raw response PDU.
    /// Exceptions are decoded and surfaced; no other shape checks are
    /// applied, so callers of custom function codes own their framing.
    pub async fn read_raw(&self, slave_id: u8, request: &[u8]) -> Result<Vec<u8>, ClientError> {
        if request.is_empty() {
            return Err(ClientError::protocol(
                ProtocolErrorKind::InvalidPdu,
                "Empty request PDU",
            ));
        }
        if slave_id > MAX_SLAVE_ID {
            return Err(ValidationError::InvalidSlaveId(slave_id).into());
        }

        let response = self.transport.transact(slave_id, request).await?;
        if response.len() >= 2 && response[0] == request[0] | EXCEPTION_BIT {
            let exception = ModbusException::new(request[0], response[1]);
            if let Ok(mut guard) = self.last_exception.lock() {
                *guard = Some(exception);
            }
            return Err(exception.into());
        }
        Ok(response)
    }
}
