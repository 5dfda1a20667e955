use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pdfxlate_core::job::{Language, ServiceInfo, LANGUAGES};
use pdfxlate_core::{SanitizedConfig, TaskStatus};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_tasks: usize,
    pub completed_tasks: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let counts = state.tasks().counts().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        active_tasks: state.orchestrator().active_count(),
        completed_tasks: counts.get(TaskStatus::Completed),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

pub async fn list_languages() -> Json<&'static [Language]> {
    Json(LANGUAGES)
}

pub async fn list_services(State(state): State<Arc<AppState>>) -> Json<Vec<ServiceInfo>> {
    Json(state.services().infos())
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
