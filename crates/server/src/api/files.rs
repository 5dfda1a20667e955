//! Uploaded file handlers.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use pdfxlate_core::FileError;

use super::error::{api_error, bad_request, internal, not_found, ApiError};
use crate::state::AppState;

/// Multipart field carrying the document.
const FILE_FIELD: &str = "file";

/// Filename recorded when the client sends none.
const DEFAULT_FILENAME: &str = "document.pdf";

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReleaseFileResponse {
    pub status: String,
    pub file_id: String,
}

fn multipart_error(e: MultipartError) -> ApiError {
    api_error(e.status(), format!("Failed to read upload: {}", e.body_text()))
}

/// Register an uploaded PDF and return its id.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(bad_request(format!("Missing '{}' field", FILE_FIELD)));
    };

    match state.files().register(&bytes, &filename).await {
        Ok(file) => {
            info!(file_id = %file.id, filename = %file.filename, size = file.size, "File uploaded");
            Ok(Json(UploadResponse {
                file_id: file.id,
                filename: file.filename,
                size: file.size,
            }))
        }
        Err(e @ FileError::TooLarge { .. }) => {
            Err(api_error(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()))
        }
        Err(e) if e.is_client_error() => Err(bad_request(e.to_string())),
        Err(e) => {
            error!(error = %e, "Failed to store upload");
            Err(internal("Failed to store uploaded file"))
        }
    }
}

/// Delete an uploaded file and its directory.
pub async fn release_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<ReleaseFileResponse>, ApiError> {
    if state.files().release(&file_id).await {
        info!(file_id = %file_id, "File released");
        Ok(Json(ReleaseFileResponse {
            status: "deleted".to_string(),
            file_id,
        }))
    } else {
        Err(not_found("File not found"))
    }
}
