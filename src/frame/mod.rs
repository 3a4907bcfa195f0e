//! Byte-exact framing for the two Modbus ADUs: RTU (slave + PDU + CRC)
//! and TCP (MBAP header + PDU).

mod crc;
pub mod rtu;
pub mod tcp;

pub use crc::crc16;
pub use tcp::MbapHeader;
