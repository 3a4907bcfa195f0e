use thiserror::Error;

use super::{
    ConfigValidationError, FrameError, FrameErrorKind, FrameFormatKind, FrameSizeKind,
    ModbusException, ProtocolErrorKind, TransportError, ValidationError,
};

/// Top-level error for every client and manager operation.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Protocol violation: {kind} - {details}")]
    Protocol {
        kind: ProtocolErrorKind,
        details: String,
    },

    #[error(transparent)]
    Exception(#[from] ModbusException),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigValidationError),

    #[error("Operation on a stopped handle")]
    Closed,
}

impl ClientError {
    pub fn protocol(kind: ProtocolErrorKind, details: impl Into<String>) -> Self {
        ClientError::Protocol {
            kind,
            details: details.into(),
        }
    }

    pub fn frame(
        kind: FrameErrorKind,
        details: impl Into<String>,
        frame_data: Option<Vec<u8>>,
    ) -> Self {
        let details = details.into();
        match kind {
            FrameErrorKind::TooShort | FrameErrorKind::TooLong => {
                ClientError::Frame(FrameError::Size {
                    kind: match kind {
                        FrameErrorKind::TooShort => FrameSizeKind::TooShort,
                        _ => FrameSizeKind::TooLong,
                    },
                    details,
                    frame_data,
                })
            }
            FrameErrorKind::InvalidCrc => {
                // Callers with the actual CRC values build FrameError::Crc
                // directly; this path keeps the frame bytes for diagnostics.
                ClientError::Frame(FrameError::Format {
                    kind: FrameFormatKind::InvalidFormat,
                    details,
                    frame_data,
                })
            }
            FrameErrorKind::InvalidFormat
            | FrameErrorKind::InvalidSlaveId
            | FrameErrorKind::InvalidHeader
            | FrameErrorKind::UnexpectedResponse => ClientError::Frame(FrameError::Format {
                kind: match kind {
                    FrameErrorKind::InvalidHeader => FrameFormatKind::InvalidHeader,
                    FrameErrorKind::InvalidSlaveId => FrameFormatKind::InvalidSlaveId,
                    FrameErrorKind::UnexpectedResponse => FrameFormatKind::UnexpectedResponse,
                    _ => FrameFormatKind::InvalidFormat,
                },
                details,
                frame_data,
            }),
        }
    }

    /// The exception carried by this error, if it is one.
    pub fn as_exception(&self) -> Option<&ModbusException> {
        match self {
            ClientError::Exception(exception) => Some(exception),
            _ => None,
        }
    }
}
