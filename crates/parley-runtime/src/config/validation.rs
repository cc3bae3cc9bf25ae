//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, ParleyConfig, ServiceConfig, TypingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &ParleyConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_typing_config(&config.typing)?;
    validate_service_config(&config.service)?;

    if config.adapters.keys().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::validation("Adapter section names cannot be empty"));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is 'file'",
        ));
    }

    if let Some(target) = logging.filters.keys().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid log filter target: {target:?}"
        )));
    }

    Ok(())
}

fn validate_typing_config(typing: &TypingConfig) -> ConfigResult<()> {
    if typing.period_ms == 0 {
        return Err(ConfigError::validation(
            "typing.period_ms must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_service_config(service: &ServiceConfig) -> ConfigResult<()> {
    if service.timeout_ms == Some(0) {
        return Err(ConfigError::validation(
            "service.timeout_ms must be greater than 0",
        ));
    }

    if service.concurrency_limit == Some(0) {
        return Err(ConfigError::validation(
            "service.concurrency_limit must be greater than 0",
        ));
    }

    Ok(())
}
