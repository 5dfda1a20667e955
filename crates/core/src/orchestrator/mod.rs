//! Task orchestrator for translation runs.
//!
//! Each task gets one background unit that drives the engine, mirrors its
//! events into the task registry, uploads finished artifacts and always ends
//! with exactly one terminal status:
//! - **Completed**: the engine finished; result and upload entries attached
//! - **Error**: the engine failed, stopped early, panicked or timed out
//! - **Cancelled**: a cancel request was observed first

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::TaskOrchestrator;
pub use types::{ActiveTaskInfo, OrchestratorError, OrchestratorStatus};
