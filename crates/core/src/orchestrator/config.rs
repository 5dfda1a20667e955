//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the task orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How long `cancel` waits for a task to stop before aborting it (milliseconds).
    #[serde(default = "default_cancel_grace")]
    pub cancel_grace_ms: u64,

    /// Upper bound on a whole translation run (seconds, 0 = unlimited).
    /// Expiry is reported as an error.
    #[serde(default)]
    pub task_timeout_secs: u64,
}

fn default_cancel_grace() -> u64 {
    5000 // 5 seconds
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cancel_grace_ms: default_cancel_grace(),
            task_timeout_secs: 0,
        }
    }
}
