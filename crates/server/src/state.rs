use std::sync::Arc;

use pdfxlate_core::{
    Config, FileRegistry, SanitizedConfig, ServiceCatalog, TaskOrchestrator, TaskRegistry,
};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    files: Arc<FileRegistry>,
    orchestrator: Arc<TaskOrchestrator>,
    services: ServiceCatalog,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    /// Build the state and route task registry changes to the WebSocket feed.
    pub fn new(
        config: Config,
        files: Arc<FileRegistry>,
        orchestrator: Arc<TaskOrchestrator>,
        services: ServiceCatalog,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        orchestrator
            .registry()
            .set_listener(ws_broadcaster.task_listener());

        Self {
            config,
            files,
            orchestrator,
            services,
            ws_broadcaster,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn files(&self) -> &FileRegistry {
        &self.files
    }

    pub fn orchestrator(&self) -> &TaskOrchestrator {
        &self.orchestrator
    }

    pub fn tasks(&self) -> &TaskRegistry {
        self.orchestrator.registry()
    }

    pub fn services(&self) -> &ServiceCatalog {
        &self.services
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
