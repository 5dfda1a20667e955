pub mod config;
pub mod engine;
pub mod files;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod storage;
pub mod task;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    ServerConfig, WorkspaceConfig,
};
pub use engine::{EngineConfig, EngineError, EngineEvent, SubprocessEngine, TranslationEngine};
pub use files::{FileError, FileRegistry, UploadedFile};
pub use job::{JobConfig, JobConfigError, JobSettings, ServiceCatalog};
pub use orchestrator::{OrchestratorConfig, OrchestratorError, OrchestratorStatus, TaskOrchestrator};
pub use storage::{ArtifactUploader, DedupUploader, StorageCacheEntry, StorageConfig, StorageError};
pub use task::{ArtifactKind, Task, TaskRegistry, TaskStatus};
