//! Error types for the engine adapter.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced while starting or running the translation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine executable could not be found.
    #[error("Engine not found at path: {path}")]
    NotFound { path: PathBuf },

    /// Input file does not exist.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Engine process ended unsuccessfully.
    #[error("Engine process failed: {reason}")]
    ProcessFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// I/O error while talking to the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Job description could not be written.
    #[error("Failed to serialize job: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl EngineError {
    /// Creates a new process failed error with captured error output.
    pub fn process_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProcessFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Message suitable for a task's `error` field.
    pub fn task_message(&self) -> String {
        match self {
            Self::ProcessFailed {
                reason,
                stderr: Some(stderr),
            } if !stderr.trim().is_empty() => {
                format!("{}: {}", reason, stderr.trim())
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_message_includes_stderr() {
        let err = EngineError::process_failed("exit code 2", Some("Traceback...\n".to_string()));
        assert_eq!(err.task_message(), "exit code 2: Traceback...");

        let err = EngineError::process_failed("exit code 2", None);
        assert_eq!(err.task_message(), "Engine process failed: exit code 2");
    }
}
