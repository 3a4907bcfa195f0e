use serde::{Deserialize, Serialize};

use crate::errors::ConfigValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Capacity of the decoded-data queue between reads and the consumer.
    pub queue_size: usize,

    /// Concurrent group reads on TCP transports; serial is always
    /// sequential.
    pub concurrency: usize,

    /// Collapse registers sharing (slave, function, address, quantity)
    /// into a single group member.
    pub dedup_addresses: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_size: 64,
            concurrency: 8,
            dedup_addresses: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.queue_size == 0 {
            return Err(ConfigValidationError::manager("queue_size cannot be 0"));
        }
        if self.concurrency == 0 {
            return Err(ConfigValidationError::manager("concurrency cannot be 0"));
        }
        Ok(())
    }
}
