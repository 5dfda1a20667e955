use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdfxlate_core::{
    load_config, validate_config, ArtifactUploader, DedupUploader, FileRegistry, ServiceCatalog,
    SubprocessEngine, TaskOrchestrator, TaskRegistry, TranslationEngine,
};
use pdfxlate_server::api::{create_router, WsBroadcaster};
use pdfxlate_server::state::AppState;

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "PDFXLATE_CONFIG";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
    match &config_path {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No {} set, using defaults and environment", CONFIG_ENV),
    }
    let config = load_config(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Workspace root: {:?}", config.workspace.root);
    info!("Engine command: {}", config.engine.command);

    // Working directories
    let files_dir = config.workspace.files_dir();
    let tasks_dir = config.workspace.tasks_dir();
    for dir in [&files_dir, &tasks_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {:?}", dir))?;
    }

    let files = Arc::new(FileRegistry::new(
        files_dir,
        config.workspace.max_upload_bytes,
    ));
    let registry = Arc::new(TaskRegistry::new(tasks_dir));

    // Translation engine
    let engine: Arc<dyn TranslationEngine> =
        Arc::new(SubprocessEngine::new(config.engine.clone()));

    // Artifact uploads
    let uploader = DedupUploader::from_config(&config.storage)
        .context("Failed to create storage client")?;
    if uploader.is_enabled() {
        info!("Object storage enabled at {}", config.storage.api_base_url);
    } else {
        info!("Object storage disabled");
    }
    let uploader: Arc<dyn ArtifactUploader> = Arc::new(uploader);

    let orchestrator = Arc::new(TaskOrchestrator::new(
        config.orchestrator.clone(),
        Arc::clone(&registry),
        engine,
        uploader,
    ));

    // Translation services are read from the environment once
    let services = ServiceCatalog::from_env();
    for service in services.infos() {
        info!(
            "Service {}: credentials {}",
            service.name,
            if service.credentials_configured { "configured" } else { "missing" }
        );
    }

    let ws_broadcaster = WsBroadcaster::default();

    let state = Arc::new(AppState::new(
        config.clone(),
        files,
        Arc::clone(&orchestrator),
        services,
        ws_broadcaster,
    ));

    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    orchestrator.shutdown().await;
    info!("All tasks stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
