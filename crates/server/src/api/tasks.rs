//! Translation task handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use pdfxlate_core::{
    ArtifactKind, FileError, JobConfig, OrchestratorError, Task, TaskStatus,
};

use super::error::{api_error, bad_request, internal, not_found, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a translation: a file id plus job options.
#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub file_id: String,
    #[serde(flatten)]
    pub config: JobConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub task_id: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub status: String,
    /// Status of the task after the request.
    pub task_status: TaskStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReleaseTaskResponse {
    pub status: String,
}

fn task_error(e: OrchestratorError) -> ApiError {
    match e {
        OrchestratorError::TaskNotFound(_) => not_found("Task not found"),
        OrchestratorError::ShuttingDown => {
            api_error(StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down")
        }
        other => {
            error!(error = %other, "Task operation failed");
            internal("Task operation failed")
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Start translating a previously uploaded file.
pub async fn start_translation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let Json(body) =
        payload.map_err(|e| bad_request(format!("Invalid settings: {}", e.body_text())))?;

    let input = match state.files().resolve(&body.file_id).await {
        Ok(path) => path,
        Err(FileError::NotFound(_)) => return Err(not_found("File not found")),
        Err(e) => {
            error!(file_id = %body.file_id, error = %e, "Failed to resolve upload");
            return Err(internal("Failed to resolve uploaded file"));
        }
    };

    let settings = body
        .config
        .resolve(state.services())
        .map_err(|e| bad_request(format!("Invalid settings: {}", e)))?;

    let task_id = state
        .orchestrator()
        .start(input, settings)
        .await
        .map_err(task_error)?;

    info!(task_id = %task_id, file_id = %body.file_id, "Translation requested");
    Ok(Json(TranslateResponse {
        task_id,
        status: "started".to_string(),
    }))
}

/// Current snapshot of a task.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    state
        .tasks()
        .get(&task_id)
        .await
        .map(Json)
        .map_err(|_| not_found("Task not found"))
}

/// Request cancellation. Succeeds for tasks that already finished.
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let task = state
        .orchestrator()
        .cancel(&task_id)
        .await
        .map_err(task_error)?;

    Ok(Json(CancelResponse {
        status: "cancelled".to_string(),
        task_status: task.status,
    }))
}

/// Download one of a completed task's PDFs.
pub async fn download_artifact(
    State(state): State<Arc<AppState>>,
    Path((task_id, kind)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let task = state
        .tasks()
        .get(&task_id)
        .await
        .map_err(|_| not_found("Task not found"))?;

    if task.status != TaskStatus::Completed {
        return Err(bad_request("Translation not completed"));
    }

    let kind: ArtifactKind = kind
        .parse()
        .map_err(|_| bad_request("Invalid file type"))?;

    let Some(path) = task
        .result
        .as_ref()
        .and_then(|result| result.artifact_path(kind))
    else {
        return Err(not_found("File not found"));
    };

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(task_id = %task_id, path = %path.display(), "Artifact missing on disk");
            return Err(not_found("File not found"));
        }
        Err(e) => {
            error!(task_id = %task_id, path = %path.display(), error = %e, "Failed to read artifact");
            return Err(internal("Failed to read file"));
        }
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        kind.download_filename(&task_id)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Cancel if needed, then drop the task and its outputs.
pub async fn release_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Json<ReleaseTaskResponse> {
    state.orchestrator().release(&task_id).await;
    Json(ReleaseTaskResponse {
        status: "cleaned".to_string(),
    })
}
