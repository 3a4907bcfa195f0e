use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Quantity {quantity} out of range for function {function:#04X} (1..={max})")]
    QuantityOutOfRange {
        function: u8,
        quantity: u16,
        max: u16,
    },

    #[error("Slave ID {0} out of range (0..=247)")]
    InvalidSlaveId(u8),

    #[error("Broadcast slave ID not allowed for reads")]
    BroadcastRead,

    #[error("Unsupported function code {0:#04X}")]
    UnsupportedFunction(u8),

    #[error("Duplicate register tag: {0}")]
    DuplicateTag(String),

    #[error("No physical registers to load")]
    Empty,

    #[error("Unknown data type: {0}")]
    UnknownDataType(String),

    #[error("Unknown data order: {0}")]
    UnknownDataOrder(String),

    #[error("Data order {order} does not fit data type {data_type} ({expected} bytes)")]
    OrderWidthMismatch {
        order: String,
        data_type: String,
        expected: usize,
    },

    #[error("Register {tag}: window of {quantity} words too small for {data_type}")]
    WindowTooSmall {
        tag: String,
        quantity: u16,
        data_type: String,
    },

    #[error("Data type {0} is not valid for bit-oriented reads")]
    BitTypeMismatch(String),
}
