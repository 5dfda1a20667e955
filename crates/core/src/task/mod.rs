//! Task registry: the polling source for translation task status.

mod registry;
mod types;

pub use registry::{TaskError, TaskEvent, TaskListener, TaskRegistry};
pub use types::{ArtifactKind, Task, TaskCounts, TaskResult, TaskStatus, TaskUpdate};
