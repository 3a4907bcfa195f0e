//! Declarative device registers, contiguous grouping, typed decoding
//! and the streaming register manager.

pub mod decode;
mod grouping;
mod manager;
mod types;

pub use grouping::{group_registers, RegisterGroup};
pub use manager::{ErrorCallback, GroupReadError, ReadCallback, RegisterManager};
pub use types::{DataOrder, DataType, DeviceRegister, ScalarType, Value};
