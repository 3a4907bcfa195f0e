use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::trace;

use crate::config::TcpConfig;
use crate::constants::{function, EXCEPTION_BIT, MAX_RTU_FRAME_LENGTH};
use crate::errors::{ClientError, FrameErrorKind, IoOperation, TransportError};
use crate::frame::crc16;

use super::connect_with_retry;

/// RTU framing carried over a TCP byte stream. There are no
/// inter-character gaps to delimit frames, so boundaries are recovered
/// from the function code: fixed sizes for write echoes, byte-count
/// prefixes for reads, and a CRC scan for anything else.
pub struct RtuOverTcpTransport {
    endpoint: String,
    config: TcpConfig,
    stream: Mutex<Option<TcpStream>>,
}

impl RtuOverTcpTransport {
    pub fn new(endpoint: impl Into<String>, config: &TcpConfig) -> Result<Self, ClientError> {
        config.validate()?;
        Ok(Self {
            endpoint: endpoint.into(),
            config: config.clone(),
            stream: Mutex::new(None),
        })
    }

    pub async fn close(&self) {
        *self.stream.lock().await = None;
    }

    /// Writes a frame without awaiting a response (broadcast).
    pub async fn send(&self, frame: &[u8]) -> Result<(), ClientError> {
        let mut guard = self.stream.lock().await;
        if guard.is_none() {
            *guard = Some(connect_with_retry(&self.endpoint, &self.config).await?);
        }
        let stream = match guard.as_mut() {
            Some(stream) => stream,
            None => return Err(TransportError::Closed.into()),
        };

        let result = timeout(self.config.timeout, stream.write_all(frame)).await;
        match result {
            Ok(Ok(())) => {
                trace!("RTU frame out: {}", hex::encode(frame));
                Ok(())
            }
            Ok(Err(e)) => {
                *guard = None;
                Err(TransportError::io(IoOperation::Write, "TCP write failed", e).into())
            }
            Err(_) => {
                *guard = None;
                Err(TransportError::timeout(IoOperation::Write, self.config.timeout).into())
            }
        }
    }

    pub async fn send_and_receive(&self, frame: &[u8]) -> Result<Vec<u8>, ClientError> {
        let mut guard = self.stream.lock().await;
        if guard.is_none() {
            *guard = Some(connect_with_retry(&self.endpoint, &self.config).await?);
        }
        let stream = match guard.as_mut() {
            Some(stream) => stream,
            None => return Err(TransportError::Closed.into()),
        };

        let result = timeout(self.config.timeout, transact(stream, frame)).await;
        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                *guard = None;
                Err(e)
            }
            Err(_) => {
                *guard = None;
                Err(TransportError::timeout(IoOperation::Read, self.config.timeout).into())
            }
        }
    }
}

async fn transact(stream: &mut TcpStream, frame: &[u8]) -> Result<Vec<u8>, ClientError> {
    stream
        .write_all(frame)
        .await
        .map_err(|e| TransportError::io(IoOperation::Write, "TCP write failed", e))?;

    trace!("RTU frame out: {}", hex::encode(frame));

    // slave id, function code and the first data byte are enough to
    // decide how the rest of the frame is delimited.
    let mut buf = Vec::with_capacity(MAX_RTU_FRAME_LENGTH);
    read_into(stream, &mut buf, 3).await?;

    let function_code = buf[1];
    let first = buf[2];

    if function_code & EXCEPTION_BIT != 0 {
        // slave + function + exception code + CRC
        read_into(stream, &mut buf, 2).await?;
    } else {
        match function_code {
            function::READ_COILS
            | function::READ_DISCRETE_INPUTS
            | function::READ_HOLDING_REGISTERS
            | function::READ_INPUT_REGISTERS
            | function::READ_WRITE_MULTIPLE_REGISTERS => {
                // byte-count prefixed: count bytes of data + CRC
                read_into(stream, &mut buf, first as usize + 2).await?;
            }
            function::WRITE_SINGLE_COIL
            | function::WRITE_SINGLE_REGISTER
            | function::WRITE_MULTIPLE_COILS
            | function::WRITE_MULTIPLE_REGISTERS => {
                // fixed echo: slave + function + 4 data bytes + CRC
                read_into(stream, &mut buf, 5).await?;
            }
            function::MASK_WRITE_REGISTER => {
                // slave + function + address + and-mask + or-mask + CRC
                read_into(stream, &mut buf, 7).await?;
            }
            function::READ_FIFO_QUEUE => {
                // two-byte count covers the FIFO count field and the words
                read_into(stream, &mut buf, 1).await?;
                let count = u16::from_be_bytes([first, buf[3]]) as usize;
                read_into(stream, &mut buf, count + 2).await?;
            }
            function::ENCAPSULATED_INTERFACE_TRANSPORT => {
                read_device_id_body(stream, &mut buf).await?;
            }
            _ => {
                crc_scan(stream, &mut buf).await?;
            }
        }
    }

    if buf.len() > MAX_RTU_FRAME_LENGTH {
        return Err(ClientError::frame(
            FrameErrorKind::TooLong,
            format!("RTU frame of {} bytes exceeds 256", buf.len()),
            Some(buf),
        ));
    }

    trace!("RTU frame in: {}", hex::encode(&buf));
    Ok(buf)
}

async fn read_into(
    stream: &mut TcpStream,
    buf: &mut Vec<u8>,
    count: usize,
) -> Result<(), ClientError> {
    let offset = buf.len();
    buf.resize(offset + count, 0);
    stream
        .read_exact(&mut buf[offset..])
        .await
        .map_err(|e| TransportError::io(IoOperation::Read, "TCP read failed", e))?;
    Ok(())
}

/// A device-identification response has no single byte count; walk its
/// object list to find the frame end. On entry `buf` holds slave,
/// function and the MEI type byte.
async fn read_device_id_body(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Result<(), ClientError> {
    // id code, conformity, more-follows, next object id, object count
    read_into(stream, buf, 5).await?;
    let object_count = buf[7];

    for _ in 0..object_count {
        read_into(stream, buf, 2).await?;
        let object_len = buf[buf.len() - 1] as usize;
        read_into(stream, buf, object_len).await?;
    }

    // CRC
    read_into(stream, buf, 2).await?;
    Ok(())
}

/// Fallback for unknown function codes: extend the frame byte by byte
/// until its trailer is a valid CRC over the rest.
async fn crc_scan(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Result<(), ClientError> {
    loop {
        if buf.len() >= 4 {
            let payload = &buf[..buf.len() - 2];
            let received = u16::from_le_bytes([buf[buf.len() - 2], buf[buf.len() - 1]]);
            if crc16(payload) == received {
                return Ok(());
            }
        }
        if buf.len() >= MAX_RTU_FRAME_LENGTH {
            return Err(ClientError::frame(
                FrameErrorKind::InvalidFormat,
                "No CRC-delimited frame within 256 bytes",
                Some(buf.clone()),
            ));
        }
        read_into(stream, buf, 1).await?;
    }
}
