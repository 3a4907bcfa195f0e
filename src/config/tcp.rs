use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAX_TCP_FRAME_LENGTH;
use crate::errors::ConfigValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Deadline for one request/response transaction.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Initial delay between connect attempts; grows by `backoff_multiplier`.
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Connect attempts before giving up. `None` retries until the caller
    /// cancels.
    pub max_retries: Option<u32>,

    pub backoff_multiplier: f64,

    #[serde(with = "humantime_serde")]
    pub max_retry_delay: Duration,

    /// Upper bound on a full MBAP ADU.
    pub max_frame_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            retry_delay: Duration::from_millis(200),
            max_retries: Some(3),
            backoff_multiplier: 2.0,
            max_retry_delay: Duration::from_secs(30),
            max_frame_length: DEFAULT_MAX_TCP_FRAME_LENGTH,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.timeout.is_zero() {
            return Err(ConfigValidationError::tcp("timeout cannot be 0"));
        }
        if self.retry_delay.is_zero() {
            return Err(ConfigValidationError::tcp("retry_delay cannot be 0"));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigValidationError::tcp(format!(
                "backoff_multiplier ({}) cannot be below 1.0",
                self.backoff_multiplier
            )));
        }
        if self.max_frame_length < DEFAULT_MAX_TCP_FRAME_LENGTH {
            return Err(ConfigValidationError::tcp(format!(
                "max_frame_length ({}) cannot be below {}",
                self.max_frame_length, DEFAULT_MAX_TCP_FRAME_LENGTH
            )));
        }
        Ok(())
    }
}
