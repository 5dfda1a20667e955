use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Upload size limit is positive
/// - Engine command is set
/// - Cancellation grace period is positive
/// - Storage has an http(s) endpoint when enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.workspace.max_upload_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "workspace.max_upload_bytes must be greater than 0".to_string(),
        ));
    }

    if config.engine.command.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.command cannot be empty".to_string(),
        ));
    }

    if config.orchestrator.cancel_grace_ms == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.cancel_grace_ms must be greater than 0".to_string(),
        ));
    }

    if config.storage.enabled {
        let url = config.storage.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "storage.api_base_url must be an http(s) URL when storage is enabled, got '{}'",
                url
            )));
        }
    }

    Ok(())
}
