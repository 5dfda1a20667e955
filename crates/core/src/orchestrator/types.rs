//! Types for the task orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::{TaskCounts, TaskError};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Task not found.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The orchestrator no longer accepts new tasks.
    #[error("orchestrator is shutting down")]
    ShuttingDown,

    /// Task registry error.
    #[error("task registry error: {0}")]
    Registry(TaskError),
}

impl From<TaskError> for OrchestratorError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound(id) => OrchestratorError::TaskNotFound(id),
            other => OrchestratorError::Registry(other),
        }
    }
}

/// A task currently running under the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTaskInfo {
    pub task_id: String,
    pub started_at: DateTime<Utc>,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether new tasks are accepted.
    pub accepting: bool,
    /// Number of tasks with a live background unit.
    pub active_tasks: usize,
    /// Registry counts by status.
    pub tasks: TaskCounts,
}
