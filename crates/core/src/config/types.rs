use serde::{Deserialize, Serialize};

use crate::converter::ConverterConfig;
use crate::emitter::EmitterConfig;
use crate::logging::LoggingConfig;
use crate::receiver::ReceiverConfig;
use crate::storage::StorageConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub receiver: ReceiverConfig,
    #[serde(default)]
    pub emitter: EmitterConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageBackend;

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[receiver]
id = "journald"

[emitter]
max_batch_size = 50
flush_interval_ms = 200
queue_capacity = 4

[converter]
worker_count = 3
flush_interval_ms = 500
max_groups = 64

[storage]
backend = "sqlite"
path = "/var/lib/logpipe/checkpoints.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.receiver.id, "journald");
        assert_eq!(config.emitter.max_batch_size, 50);
        assert_eq!(config.emitter.queue_capacity, 4);
        assert_eq!(config.converter.worker_count, Some(3));
        assert_eq!(config.converter.max_groups, 64);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(
            config.storage.path.as_deref().and_then(|p| p.to_str()),
            Some("/var/lib/logpipe/checkpoints.db")
        );
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.emitter.max_batch_size, 100);
        assert_eq!(config.emitter.flush_interval_ms, 100);
        assert_eq!(config.converter.worker_count, None);
        assert_eq!(config.storage.backend, StorageBackend::None);
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.receiver.id, config.receiver.id);
    }
}
