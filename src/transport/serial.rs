use std::io::Read;
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::config::RtuConfig;
use crate::constants::MIN_RTU_FRAME_LENGTH;
use crate::errors::{ClientError, FrameErrorKind, IoOperation, SerialErrorKind, TransportError};

/// Serial RTU transporter. One transaction owns the port for its full
/// write-then-read cycle; frames end on an inter-character gap, the frame
/// timeout, or the configured size cap.
pub struct SerialTransport {
    port: Mutex<Box<dyn SerialPort>>,
    device: String,
    timeout: Duration,
    frame_timeout: Duration,
    max_frame_size: usize,
}

impl SerialTransport {
    pub fn new(device: &str, config: &RtuConfig) -> Result<Self, ClientError> {
        config.validate()?;

        // The port timeout doubles as the inter-character deadline: each
        // read call returns TimedOut after a quiet gap of t1.5.
        let port = serialport::new(device, config.baud_rate)
            .data_bits(config.data_bits.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .timeout(config.inter_char_time)
            .open()
            .map_err(TransportError::from)?;

        debug!("Opened serial port {}", config.serial_port_info(device));

        Ok(Self {
            port: Mutex::new(port),
            device: device.to_string(),
            timeout: config.timeout,
            frame_timeout: config.frame_timeout,
            max_frame_size: config.max_frame_size,
        })
    }

    /// Writes a frame without awaiting a response (broadcast).
    pub async fn send(&self, frame: &[u8]) -> Result<(), ClientError> {
        timeout(self.timeout, async {
            let mut port = self.port.lock().await;
            self.write_frame(port.as_mut(), frame)
        })
        .await
        .map_err(|_| TransportError::timeout(IoOperation::Write, self.timeout))??;

        Ok(())
    }

    /// One full transaction: flush stale input, write the request, then
    /// assemble the response frame under the timing rules.
    pub async fn send_and_receive(
        &self,
        frame: &[u8],
        expected_len: Option<usize>,
    ) -> Result<Vec<u8>, ClientError> {
        timeout(self.timeout, async {
            let mut port = self.port.lock().await;
            self.write_frame(port.as_mut(), frame)?;
            self.read_frame(port.as_mut(), expected_len)
        })
        .await
        .map_err(|_| TransportError::timeout(IoOperation::Read, self.timeout))?
    }

    fn write_frame(&self, port: &mut dyn SerialPort, frame: &[u8]) -> Result<(), ClientError> {
        port.clear(serialport::ClearBuffer::Input)
            .map_err(TransportError::from)?;
        port.write_all(frame)
            .map_err(|e| TransportError::io(IoOperation::Write, "serial write failed", e))?;
        port.flush()
            .map_err(|e| TransportError::io(IoOperation::Flush, "serial flush failed", e))?;

        trace!("RTU frame out: {}", hex::encode(frame));
        Ok(())
    }

    fn read_frame(
        &self,
        port: &mut dyn SerialPort,
        expected_len: Option<usize>,
    ) -> Result<Vec<u8>, ClientError> {
        let deadline = Instant::now() + self.frame_timeout;
        let mut buf = vec![0u8; self.max_frame_size];
        let mut len = 0usize;

        loop {
            if len == self.max_frame_size {
                break;
            }
            if let Some(expected) = expected_len {
                if len >= expected {
                    break;
                }
            }

            match port.read(&mut buf[len..]) {
                Ok(0) => {
                    return Err(TransportError::serial(
                        SerialErrorKind::Disconnected,
                        &self.device,
                        "EOF while reading response",
                        None,
                    )
                    .into());
                }
                Ok(n) => len += n,
                Err(e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    // Quiet line for t1.5 after a started frame ends it.
                    if len >= MIN_RTU_FRAME_LENGTH {
                        break;
                    }
                }
                Err(e) => {
                    return Err(TransportError::io(IoOperation::Read, "serial read failed", e).into())
                }
            }

            if Instant::now() >= deadline {
                if len >= MIN_RTU_FRAME_LENGTH {
                    break;
                }
                return Err(TransportError::timeout(IoOperation::Read, self.frame_timeout).into());
            }
        }

        buf.truncate(len);

        if len < MIN_RTU_FRAME_LENGTH {
            return Err(ClientError::frame(
                FrameErrorKind::TooShort,
                format!("Serial response of {} bytes", len),
                Some(buf),
            ));
        }

        trace!("RTU frame in: {}", hex::encode(&buf));
        Ok(buf)
    }
}
