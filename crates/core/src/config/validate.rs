use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Emitter has at least one flush trigger and a non-zero queue
/// - Converter worker count, queue capacity and group cap are positive
/// - Receiver id is not empty and the shutdown timeout is positive
/// - SQLite storage has a path
/// - Logging filter parses
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.receiver.id.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "receiver.id cannot be empty".to_string(),
        ));
    }

    if config.receiver.shutdown_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "receiver.shutdown_timeout_ms cannot be 0".to_string(),
        ));
    }

    config.emitter.validate()?;
    config.converter.validate()?;
    config.storage.validate()?;

    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&config.logging.filter) {
        return Err(ConfigError::ValidationError(format!(
            "logging.filter is invalid: {}",
            e
        )));
    }

    Ok(())
}
