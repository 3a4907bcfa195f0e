use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigValidationError {
    #[error("RTU configuration error: {0}")]
    Rtu(String),

    #[error("TCP configuration error: {0}")]
    Tcp(String),

    #[error("Manager configuration error: {0}")]
    Manager(String),

    #[error("Logging configuration error: {0}")]
    Logging(String),
}

impl ConfigValidationError {
    pub fn rtu(details: impl Into<String>) -> Self {
        Self::Rtu(details.into())
    }

    pub fn tcp(details: impl Into<String>) -> Self {
        Self::Tcp(details.into())
    }

    pub fn manager(details: impl Into<String>) -> Self {
        Self::Manager(details.into())
    }

    pub fn logging(details: impl Into<String>) -> Self {
        Self::Logging(details.into())
    }
}
