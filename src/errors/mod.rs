mod client;
mod config;
mod exception;
mod frame;
mod kinds;
mod transport;
mod validation;

pub use kinds::FrameErrorKind;
pub use kinds::FrameFormatKind;
pub use kinds::FrameSizeKind;
pub use kinds::IoOperation;
pub use kinds::ProtocolErrorKind;
pub use kinds::SerialErrorKind;

pub use client::ClientError;
pub use config::ConfigValidationError;
pub use exception::{ExceptionCode, ModbusException};
pub use frame::FrameError;
pub use transport::TransportError;
pub use validation::ValidationError;
