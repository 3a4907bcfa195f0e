//! The three transporters and the framing seam between PDUs and wires.

mod backoff;
mod rtu_tcp;
mod serial;
mod tcp;

pub use backoff::BackoffStrategy;
pub use rtu_tcp::RtuOverTcpTransport;
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::TcpConfig;
use crate::constants::{function, BROADCAST_SLAVE_ID};
use crate::errors::{ClientError, FrameErrorKind, IoOperation, TransportError};
use crate::frame;

/// Dials `endpoint`, pacing attempts with the configured backoff.
pub(crate) async fn connect_with_retry(
    endpoint: &str,
    config: &TcpConfig,
) -> Result<TcpStream, TransportError> {
    let mut backoff = BackoffStrategy::new(config);

    loop {
        match TcpStream::connect(endpoint).await {
            Ok(stream) => {
                stream.set_nodelay(true).map_err(|e| {
                    TransportError::io(IoOperation::Configure, "Failed to set TCP_NODELAY", e)
                })?;
                debug!("Connected to {}", endpoint);
                return Ok(stream);
            }
            Err(e) => match backoff.next_backoff() {
                Some(delay) => {
                    warn!(
                        "Connect to {} failed ({}), retrying in {:?}",
                        endpoint, e, delay
                    );
                    sleep(delay).await;
                }
                None => {
                    return Err(TransportError::Connect {
                        endpoint: endpoint.to_string(),
                        attempts: backoff.attempts(),
                        source: e,
                    });
                }
            },
        }
    }
}

/// One transporter per client, dispatched by variant.
pub enum Transport {
    Serial(SerialTransport),
    Tcp(TcpTransport),
    RtuOverTcp(RtuOverTcpTransport),
}

impl Transport {
    /// Whether group reads may run concurrently. A serial bus is
    /// half-duplex with a single master, so it never does.
    pub fn supports_concurrent_dispatch(&self) -> bool {
        !matches!(self, Transport::Serial(_))
    }

    /// Frames the request PDU, runs one transaction and returns the
    /// response PDU after unframing and addressing checks.
    pub(crate) async fn transact(&self, slave_id: u8, pdu: &[u8]) -> Result<Vec<u8>, ClientError> {
        match self {
            Transport::Serial(serial) => {
                let request = frame::rtu::pack(slave_id, pdu)?;
                let hint = guess_rtu_response_len(pdu);
                let response = serial.send_and_receive(&request, hint).await?;
                unpack_rtu_response(&response, slave_id)
            }
            Transport::RtuOverTcp(transport) => {
                let request = frame::rtu::pack(slave_id, pdu)?;
                let response = transport.send_and_receive(&request).await?;
                unpack_rtu_response(&response, slave_id)
            }
            Transport::Tcp(transport) => {
                let transaction_id = transport.next_transaction_id();
                let request = frame::tcp::pack(transaction_id, slave_id, pdu)?;
                let response = transport.send_and_receive(&request, transaction_id).await?;
                let (_, unit_id, response_pdu) =
                    frame::tcp::unpack(&response, transport.max_frame_length())?;
                if unit_id != slave_id {
                    let details =
                        format!("Response from unit {} while addressing {}", unit_id, slave_id);
                    return Err(ClientError::frame(
                        FrameErrorKind::UnexpectedResponse,
                        details,
                        Some(response.clone()),
                    ));
                }
                Ok(response_pdu.to_vec())
            }
        }
    }

    /// Fire-and-forget write for broadcast requests (slave id 0); no
    /// response exists to await.
    pub(crate) async fn send_broadcast(&self, pdu: &[u8]) -> Result<(), ClientError> {
        match self {
            Transport::Serial(serial) => {
                let request = frame::rtu::pack(BROADCAST_SLAVE_ID, pdu)?;
                serial.send(&request).await
            }
            Transport::RtuOverTcp(transport) => {
                let request = frame::rtu::pack(BROADCAST_SLAVE_ID, pdu)?;
                transport.send(&request).await
            }
            Transport::Tcp(transport) => {
                let transaction_id = transport.next_transaction_id();
                let request = frame::tcp::pack(transaction_id, BROADCAST_SLAVE_ID, pdu)?;
                // MBAP carries unit 0 to the gateway; no reply is defined.
                transport.send(&request).await
            }
        }
    }

    /// Drops any pooled connection. Serial ports close on drop.
    pub async fn close(&self) {
        match self {
            Transport::Serial(_) => {}
            Transport::Tcp(transport) => transport.close().await,
            Transport::RtuOverTcp(transport) => transport.close().await,
        }
    }
}

fn unpack_rtu_response(response: &[u8], slave_id: u8) -> Result<Vec<u8>, ClientError> {
    let (response_slave, response_pdu) = frame::rtu::unpack(response)?;
    if response_slave != slave_id {
        let details = format!(
            "Response from slave {} while addressing {}",
            response_slave, slave_id
        );
        return Err(ClientError::frame(
            FrameErrorKind::UnexpectedResponse,
            details,
            Some(response.to_vec()),
        ));
    }
    Ok(response_pdu.to_vec())
}

/// Expected RTU response length for a request PDU, used as an early-exit
/// hint for the serial read loop. Exception responses are shorter and
/// still terminate on the inter-character gap.
fn guess_rtu_response_len(pdu: &[u8]) -> Option<usize> {
    let quantity = |range: std::ops::Range<usize>| -> Option<u16> {
        pdu.get(range.start).and_then(|&hi| {
            pdu.get(range.start + 1)
                .map(|&lo| u16::from_be_bytes([hi, lo]))
        })
    };

    match *pdu.first()? {
        function::READ_COILS | function::READ_DISCRETE_INPUTS => {
            let bits = quantity(3..5)? as usize;
            Some(1 + 1 + 1 + bits.div_ceil(8) + 2)
        }
        function::READ_HOLDING_REGISTERS | function::READ_INPUT_REGISTERS => {
            let words = quantity(3..5)? as usize;
            Some(1 + 1 + 1 + words * 2 + 2)
        }
        function::WRITE_SINGLE_COIL
        | function::WRITE_SINGLE_REGISTER
        | function::WRITE_MULTIPLE_COILS
        | function::WRITE_MULTIPLE_REGISTERS => Some(1 + 1 + 2 + 2 + 2),
        function::MASK_WRITE_REGISTER => Some(1 + 1 + 2 + 2 + 2 + 2),
        function::READ_WRITE_MULTIPLE_REGISTERS => {
            let words = quantity(3..5)? as usize;
            Some(1 + 1 + 1 + words * 2 + 2)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_len_hints() {
        // Read Holding Registers, qty 10: slave + fc + count + 20 + crc
        assert_eq!(
            guess_rtu_response_len(&[0x03, 0x00, 0x00, 0x00, 0x0A]),
            Some(25)
        );
        // Read Coils, qty 3: one data byte
        assert_eq!(
            guess_rtu_response_len(&[0x01, 0x00, 0x00, 0x00, 0x03]),
            Some(6)
        );
        // Write echoes are fixed size
        assert_eq!(
            guess_rtu_response_len(&[0x05, 0x00, 0x0A, 0xFF, 0x00]),
            Some(8)
        );
        // No hint for unknown codes
        assert_eq!(guess_rtu_response_len(&[0x42, 0x00]), None);
    }
}
