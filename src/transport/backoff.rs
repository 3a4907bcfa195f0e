use std::time::Duration;

use crate::config::TcpConfig;

/// Helper for pacing reconnect attempts.
pub struct BackoffStrategy {
    initial_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    max_retries: Option<u32>,
    current_attempt: u32,
}

impl BackoffStrategy {
    pub fn new(config: &TcpConfig) -> Self {
        Self {
            initial_interval: config.retry_delay,
            max_interval: config.max_retry_delay,
            multiplier: config.backoff_multiplier,
            max_retries: config.max_retries,
            current_attempt: 0,
        }
    }

    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_retries) = self.max_retries {
            if self.current_attempt >= max_retries {
                return None;
            }
        }

        let interval = self.initial_interval.as_secs_f64()
            * self.multiplier.powi(self.current_attempt as i32);

        let interval = Duration::from_secs_f64(interval.min(self.max_interval.as_secs_f64()));

        self.current_attempt += 1;
        Some(interval)
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}
