use std::time::Duration;
use thiserror::Error;

use super::{IoOperation, SerialErrorKind};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Serial port error: {kind} on {port} - {details}")]
    Serial {
        kind: SerialErrorKind,
        port: String,
        details: String,
        #[source]
        source: Option<serialport::Error>,
    },

    #[error("Connect to {endpoint} failed after {attempts} attempts")]
    Connect {
        endpoint: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {operation} failed - {details}")]
    Io {
        operation: IoOperation,
        details: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timeout after {limit:?} during {operation}")]
    Timeout {
        operation: IoOperation,
        limit: Duration,
    },

    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    pub fn io(operation: IoOperation, details: impl Into<String>, source: std::io::Error) -> Self {
        TransportError::Io {
            operation,
            details: details.into(),
            source,
        }
    }

    pub fn timeout(operation: IoOperation, limit: Duration) -> Self {
        TransportError::Timeout { operation, limit }
    }

    pub fn serial(
        kind: SerialErrorKind,
        port: impl Into<String>,
        details: impl Into<String>,
        source: Option<serialport::Error>,
    ) -> Self {
        TransportError::Serial {
            kind,
            port: port.into(),
            details: details.into(),
            source,
        }
    }
}

impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        match err.kind {
            serialport::ErrorKind::NoDevice => TransportError::Serial {
                kind: SerialErrorKind::OpenFailed,
                port: err.to_string(),
                details: "Device not found".into(),
                source: Some(err),
            },
            serialport::ErrorKind::InvalidInput => TransportError::Serial {
                kind: SerialErrorKind::ConfigurationFailed,
                port: err.to_string(),
                details: "Invalid configuration".into(),
                source: Some(err),
            },
            serialport::ErrorKind::Io(io_err) => TransportError::Io {
                operation: match io_err {
                    std::io::ErrorKind::TimedOut => IoOperation::Read,
                    std::io::ErrorKind::WriteZero => IoOperation::Write,
                    _ => IoOperation::Control,
                },
                details: io_err.to_string(),
                source: std::io::Error::new(io_err, err.description),
            },
            _ => TransportError::Serial {
                kind: SerialErrorKind::OpenFailed,
                port: err.to_string(),
                details: err.to_string(),
                source: Some(err),
            },
        }
    }
}
