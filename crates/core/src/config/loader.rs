use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};
use crate::storage::StorageConfig;

/// Prefix for structured environment overrides, e.g. `PDFXLATE_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "PDFXLATE_";

/// Flat storage variables recognised alongside the prefixed ones.
pub const ENABLE_OBJECT_STORAGE: &str = "ENABLE_OBJECT_STORAGE";
pub const STORAGE_API_URL: &str = "STORAGE_API_URL";
pub const STORAGE_API_TOKEN: &str = "STORAGE_API_TOKEN";

/// Load configuration from an optional file with environment variable overrides.
///
/// Without a file, built-in defaults are used. A path that was named but does
/// not exist is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::new();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    let mut config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    apply_storage_env(&mut config.storage, |key| std::env::var(key).ok());

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Apply the flat storage variables on top of an already loaded config.
pub fn apply_storage_env<F>(storage: &mut StorageConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENABLE_OBJECT_STORAGE) {
        storage.enabled = value.trim().eq_ignore_ascii_case("true");
    }
    if let Some(value) = lookup(STORAGE_API_URL) {
        storage.api_base_url = value.trim().to_string();
    }
    if let Some(value) = lookup(STORAGE_API_TOKEN) {
        storage.auth_token = value;
    }
}
