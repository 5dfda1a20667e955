//! Remote object storage configuration.

use serde::{Deserialize, Serialize};

/// Configuration for uploading finished artifacts to object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Upload artifacts after a task completes.
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the storage API, e.g. `https://host/api/v1/storage`.
    /// Presign requests go to `{api_base_url}/presigned-url`.
    #[serde(default)]
    pub api_base_url: String,

    /// Bearer token sent with presign requests.
    #[serde(default)]
    pub auth_token: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base_url: String::new(),
            auth_token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StorageConfig {
    pub fn with_endpoint(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self.enabled = true;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = token.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
