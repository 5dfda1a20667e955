use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::engine::EngineConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::storage::StorageConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served as a fallback for non-API paths (e.g. a web UI build).
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8000
}

/// On-disk working area for uploaded inputs and per-task outputs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Root directory. Uploaded files live under `files/`, task outputs under `tasks/`.
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
    /// Maximum accepted size of an uploaded PDF in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl WorkspaceConfig {
    pub fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_upload_bytes() -> u64 {
    100 * 1024 * 1024
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub engine: SanitizedEngineConfig,
    pub orchestrator: OrchestratorConfig,
    pub storage: SanitizedStorageConfig,
}

/// Engine config without the raw argument list.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEngineConfig {
    pub command: String,
    pub arg_count: usize,
}

/// Storage config with the bearer token hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub enabled: bool,
    pub api_base_url: String,
    pub auth_token_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            workspace: config.workspace.clone(),
            engine: SanitizedEngineConfig {
                command: config.engine.command.clone(),
                arg_count: config.engine.args.len(),
            },
            orchestrator: config.orchestrator.clone(),
            storage: SanitizedStorageConfig {
                enabled: config.storage.enabled,
                api_base_url: config.storage.api_base_url.clone(),
                auth_token_configured: !config.storage.auth_token.is_empty(),
                timeout_secs: config.storage.timeout_secs,
            },
        }
    }
}
