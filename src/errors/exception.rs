use thiserror::Error;

/// Exception codes a Modbus server may return in an exception PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    SlaveDeviceFailure,
    Acknowledge,
    SlaveDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetNoResponse,
    Unknown(u8),
}

impl ExceptionCode {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::SlaveDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::SlaveDeviceBusy,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathUnavailable,
            0x0B => Self::GatewayTargetNoResponse,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::SlaveDeviceFailure => 0x04,
            Self::Acknowledge => 0x05,
            Self::SlaveDeviceBusy => 0x06,
            Self::MemoryParityError => 0x08,
            Self::GatewayPathUnavailable => 0x0A,
            Self::GatewayTargetNoResponse => 0x0B,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IllegalFunction => write!(f, "Illegal function"),
            Self::IllegalDataAddress => write!(f, "Illegal data address"),
            Self::IllegalDataValue => write!(f, "Illegal data value"),
            Self::SlaveDeviceFailure => write!(f, "Slave device failure"),
            Self::Acknowledge => write!(f, "Acknowledge"),
            Self::SlaveDeviceBusy => write!(f, "Slave device busy"),
            Self::MemoryParityError => write!(f, "Memory parity error"),
            Self::GatewayPathUnavailable => write!(f, "Gateway path unavailable"),
            Self::GatewayTargetNoResponse => {
                write!(f, "Gateway target device failed to respond")
            }
            Self::Unknown(code) => write!(f, "Unknown exception code {code:#04X}"),
        }
    }
}

/// Exception response from the server: the original (unmasked) function
/// code and the decoded exception code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Modbus exception for function {function:#04X}: {code}")]
pub struct ModbusException {
    pub function: u8,
    pub code: ExceptionCode,
}

impl ModbusException {
    pub fn new(function: u8, code: u8) -> Self {
        Self {
            function,
            code: ExceptionCode::from_code(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for code in [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x08, 0x0A, 0x0B, 0x7F] {
            assert_eq!(ExceptionCode::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_display_names() {
        let err = ModbusException::new(0x01, 0x02);
        assert!(err.to_string().contains("Illegal data address"));
    }
}
