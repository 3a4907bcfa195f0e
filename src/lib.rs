//! Async Modbus client library: RTU over serial, TCP (MBAP) and RTU
//! framing over TCP, with a register manager that batches declared data
//! points into contiguous grouped reads.

pub mod client;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame;
pub mod logging;
pub mod register;
pub mod transport;

pub use client::{new_rtu_client, new_rtu_over_tcp_client, new_tcp_client};
pub use client::{Client, DeviceIdCode, DeviceIdentification};
pub use config::{DataBits, Parity, StopBits};
pub use config::{LoggingConfig, ManagerConfig, RtuConfig, TcpConfig};
pub use errors::{
    ClientError, ConfigValidationError, ExceptionCode, FrameError, FrameErrorKind, IoOperation,
    ModbusException, ProtocolErrorKind, SerialErrorKind, TransportError, ValidationError,
};
pub use register::{
    group_registers, DataOrder, DataType, DeviceRegister, GroupReadError, RegisterGroup,
    RegisterManager, ScalarType, Value,
};
pub use transport::{
    BackoffStrategy, RtuOverTcpTransport, SerialTransport, TcpTransport, Transport,
};
