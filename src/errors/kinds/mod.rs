mod frame_error;
mod frame_format;
mod frame_size;
mod io_operation;
mod protocol_error;
mod serial_error;

pub use frame_error::FrameErrorKind;
pub use frame_format::FrameFormatKind;
pub use frame_size::FrameSizeKind;
pub use io_operation::IoOperation;
pub use protocol_error::ProtocolErrorKind;
pub use serial_error::SerialErrorKind;
