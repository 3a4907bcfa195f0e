use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::types::{DataBits, Parity, StopBits};
use crate::constants::{MAX_RTU_FRAME_LENGTH, MIN_RTU_FRAME_LENGTH};
use crate::errors::ConfigValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,

    /// Overall deadline for one request/response transaction.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Inter-character gap (t1.5): a pause this long ends a frame.
    #[serde(with = "humantime_serde")]
    pub inter_char_time: Duration,

    /// Upper bound on assembling one response frame (t3.5 envelope).
    #[serde(with = "humantime_serde")]
    pub frame_timeout: Duration,

    pub max_frame_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            timeout: Duration::from_secs(1),
            inter_char_time: Duration::from_millis(3),
            frame_timeout: Duration::from_millis(100),
            max_frame_size: MAX_RTU_FRAME_LENGTH,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.timeout.is_zero() {
            return Err(ConfigValidationError::rtu("timeout cannot be 0"));
        }
        if self.inter_char_time.is_zero() {
            return Err(ConfigValidationError::rtu("inter_char_time cannot be 0"));
        }
        if self.frame_timeout < self.inter_char_time {
            return Err(ConfigValidationError::rtu(format!(
                "frame_timeout ({:?}) cannot be shorter than inter_char_time ({:?})",
                self.frame_timeout, self.inter_char_time
            )));
        }
        if self.max_frame_size < MIN_RTU_FRAME_LENGTH || self.max_frame_size > MAX_RTU_FRAME_LENGTH
        {
            return Err(ConfigValidationError::rtu(format!(
                "max_frame_size must be within {}..={}",
                MIN_RTU_FRAME_LENGTH, MAX_RTU_FRAME_LENGTH
            )));
        }
        Ok(())
    }

    pub fn serial_port_info(&self, device: &str) -> String {
        format!(
            "{} ({} baud, {} data bits, {} parity, {} stop bits)",
            device, self.baud_rate, self.data_bits, self.parity, self.stop_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_frame_timeout_below_gap() {
        let config = Config {
            frame_timeout: Duration::from_micros(100),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_frame_limit() {
        let config = Config {
            max_frame_size: 512,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
