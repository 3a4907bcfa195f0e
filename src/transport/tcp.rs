use std::sync::atomic::{AtomicU16, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{trace, warn};

use crate::config::TcpConfig;
use crate::errors::{ClientError, FrameErrorKind, IoOperation, TransportError};
use crate::frame::MbapHeader;

use super::connect_with_retry;

/// Modbus TCP transporter. Connects lazily, serializes transactions at
/// the connection boundary, and correlates replies by transaction id.
pub struct TcpTransport {
    endpoint: String,
    config: TcpConfig,
    stream: Mutex<Option<TcpStream>>,
    transaction_id: AtomicU16,
}

impl TcpTransport {
    pub fn new(endpoint: impl Into<String>, config: &TcpConfig) -> Result<Self, ClientError> {
        config.validate()?;
        Ok(Self {
            endpoint: endpoint.into(),
            config: config.clone(),
            stream: Mutex::new(None),
            transaction_id: AtomicU16::new(0),
        })
    }

    pub fn max_frame_length(&self) -> usize {
        self.config.max_frame_length
    }

    /// Monotonically increasing transaction id, wrapping at u16::MAX.
    pub fn next_transaction_id(&self) -> u16 {
        self.transaction_id.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Drops the connection; the next transaction reconnects.
    pub async fn close(&self) {
        *self.stream.lock().await = None;
    }

    /// Writes one MBAP frame without awaiting a response (broadcast).
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
                trace!("MBAP frame out: {}", hex::encode(frame));
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

    /// Writes one MBAP frame and returns the response whose transaction
    /// id matches `expected_tid`. Frames with a stale id are discarded.
    pub async fn send_and_receive(
        &self,
        frame: &[u8],
        expected_tid: u16,
    ) -> Result<Vec<u8>, ClientError> {
        let mut guard = self.stream.lock().await;

        if guard.is_none() {
            *guard = Some(connect_with_retry(&self.endpoint, &self.config).await?);
        }
        let stream = match guard.as_mut() {
            Some(stream) => stream,
            None => return Err(TransportError::Closed.into()),
        };

        let result = timeout(
            self.config.timeout,
            transact(stream, frame, expected_tid, self.config.max_frame_length),
        )
        .await;

        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                // A half-read stream is unusable for the next caller.
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

async fn transact(
    stream: &mut TcpStream,
    frame: &[u8],
    expected_tid: u16,
    max_frame_length: usize,
) -> Result<Vec<u8>, ClientError> {
    stream
        .write_all(frame)
        .await
        .map_err(|e| TransportError::io(IoOperation::Write, "TCP write failed", e))?;

    trace!("MBAP frame out: {}", hex::encode(frame));

    loop {
        let mut header = [0u8; 6];
        stream
            .read_exact(&mut header)
            .await
            .map_err(|e| TransportError::io(IoOperation::Read, "MBAP header read failed", e))?;

        let mbap = MbapHeader::parse(&header);

        if mbap.protocol_id != 0 {
            return Err(ClientError::frame(
                FrameErrorKind::InvalidHeader,
                format!("Protocol ID {:#06X}, expected 0x0000", mbap.protocol_id),
                Some(header.to_vec()),
            ));
        }

        let body_len = mbap.length as usize;
        if body_len == 0 || 6 + body_len > max_frame_length {
            return Err(ClientError::frame(
                FrameErrorKind::InvalidHeader,
                format!("MBAP length field {}", body_len),
                Some(header.to_vec()),
            ));
        }

        let mut body = vec![0u8; body_len];
        stream
            .read_exact(&mut body)
            .await
            .map_err(|e| TransportError::io(IoOperation::Read, "MBAP body read failed", e))?;

        if mbap.transaction_id != expected_tid {
            warn!(
                "Discarding response with transaction ID {} while awaiting {}",
                mbap.transaction_id, expected_tid
            );
            continue;
        }

        let mut full = Vec::with_capacity(6 + body_len);
        full.extend_from_slice(&header);
        full.extend_from_slice(&body);

        trace!("MBAP frame in: {}", hex::encode(&full));
        return Ok(full);
    }
}
