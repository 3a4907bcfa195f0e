mod logging;
mod manager;
mod rtu;
mod tcp;
mod types;

pub use logging::Config as LoggingConfig;
pub use manager::Config as ManagerConfig;
pub use rtu::Config as RtuConfig;
pub use tcp::Config as TcpConfig;
pub use types::{DataBits, Parity, StopBits};
