use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use super::{files, handlers, middleware::metrics_middleware, tasks, ws};
use crate::state::AppState;

/// Headroom over the upload limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.config().workspace.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/languages", get(handlers::list_languages))
        .route("/services", get(handlers::list_services))
        // Uploaded files
        .route("/files", post(files::upload_file))
        .route("/files/{id}", delete(files::release_file))
        // Tasks
        .route("/translate", post(tasks::start_translation))
        .route("/tasks/{id}", get(tasks::get_task).delete(tasks::release_task))
        .route("/tasks/{id}/cancel", post(tasks::cancel_task))
        .route("/tasks/{id}/artifacts/{kind}", get(tasks::download_artifact))
        // Live updates
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(body_limit));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics));

    // Serve a static UI with SPA fallback when configured
    if let Some(dir) = &state.config().server.static_dir {
        let serve_dir = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
        router = router.fallback_service(serve_dir);
    }

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
