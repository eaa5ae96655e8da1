//! Receiver configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a log receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Receiver id. Names the storage client and prefixes every checkpoint.
    #[serde(default = "default_id")]
    pub id: String,

    /// How long `stop` waits for the consumer to take the remaining
    /// deliveries before it abandons them, in milliseconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

fn default_id() -> String {
    "logpipe".to_string()
}

fn default_shutdown_timeout() -> u64 {
    5000
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            id: default_id(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

impl ReceiverConfig {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_id() {
        assert_eq!(ReceiverConfig::default().id, "logpipe");
        let config: ReceiverConfig = toml::from_str("").unwrap();
        assert_eq!(config.id, "logpipe");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_shutdown_timeout_builder() {
        let config = ReceiverConfig::default().with_shutdown_timeout(Duration::from_millis(250));
        assert_eq!(config.shutdown_timeout_ms, 250);
    }
}
