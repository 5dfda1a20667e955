mod loader;
mod types;
mod validate;

pub use loader::{
    apply_storage_env, load_config, load_config_from_str, ENABLE_OBJECT_STORAGE, ENV_PREFIX,
    STORAGE_API_TOKEN, STORAGE_API_URL,
};
pub use types::*;
pub use validate::validate_config;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
