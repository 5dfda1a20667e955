//! Configuration for the engine adapter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the external translation engine is launched.
///
/// The command receives the path of a JSON job description as its last
/// argument and reports events as one JSON object per stdout line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable to run.
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments placed before the job file path.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the engine process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Maximum bytes of stderr kept for error reports.
    #[serde(default = "default_stderr_limit")]
    pub stderr_limit_bytes: usize,
}

fn default_command() -> String {
    "pdf2zh-engine".to_string()
}

fn default_stderr_limit() -> usize {
    16 * 1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            env: BTreeMap::new(),
            stderr_limit_bytes: default_stderr_limit(),
        }
    }
}

impl EngineConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.command, "pdf2zh-engine");
        assert!(config.args.is_empty());
        assert_eq!(config.stderr_limit_bytes, 16 * 1024);
    }

    #[test]
    fn test_deserialize() {
        let toml = r#"
            command = "python3"
            args = ["-m", "engine_bridge"]

            [env]
            PYTHONUNBUFFERED = "1"
        "#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.command, "python3");
        assert_eq!(config.args, vec!["-m", "engine_bridge"]);
        assert_eq!(config.env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new("sh")
            .with_args(["-c", "true"])
            .with_env("A", "b");
        assert_eq!(config.command, "sh");
        assert_eq!(config.args.len(), 2);
        assert_eq!(config.env.len(), 1);
    }
}
