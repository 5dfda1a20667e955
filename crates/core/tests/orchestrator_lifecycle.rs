//! Orchestrator lifecycle integration tests.
//!
//! These tests drive complete tasks through the orchestrator with a scripted
//! engine: pending -> running -> completed | error | cancelled

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use pdfxlate_core::{
    storage::StorageBackend,
    task::{ArtifactKind, TaskEvent, TaskStatus},
    testing::{fixtures, MockEngine, MockStorageBackend, ScriptStep},
    ArtifactUploader, DedupUploader, OrchestratorConfig, OrchestratorError, Task, TaskOrchestrator,
    TaskRegistry,
};

/// Test helper to create all dependencies for orchestrator testing.
struct TestHarness {
    registry: Arc<TaskRegistry>,
    engine: MockEngine,
    storage: Arc<MockStorageBackend>,
    input: std::path::PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    async fn new(script: Vec<ScriptStep>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input = temp_dir.path().join("input.pdf");
        tokio::fs::write(&input, fixtures::pdf_bytes("input"))
            .await
            .expect("Failed to write input");

        Self {
            registry: Arc::new(TaskRegistry::new(temp_dir.path().join("tasks"))),
            engine: MockEngine::with_script(script),
            storage: Arc::new(MockStorageBackend::new()),
            input,
            _temp_dir: temp_dir,
        }
    }

    fn orchestrator(&self, config: OrchestratorConfig) -> TaskOrchestrator {
        self.build(config, Arc::new(DedupUploader::disabled()))
    }

    /// Replace the storage backend with one that stalls every presign.
    fn with_slow_storage(mut self, delay: Duration) -> Self {
        self.storage = Arc::new(MockStorageBackend::new().with_delay(delay));
        self
    }

    fn orchestrator_with_storage(&self) -> TaskOrchestrator {
        self.storage_orchestrator(OrchestratorConfig::default())
    }

    fn storage_orchestrator(&self, config: OrchestratorConfig) -> TaskOrchestrator {
        let backend: Arc<dyn StorageBackend> = self.storage.clone();
        self.build(config, Arc::new(DedupUploader::new(backend)))
    }

    fn build(
        &self,
        config: OrchestratorConfig,
        uploader: Arc<dyn ArtifactUploader>,
    ) -> TaskOrchestrator {
        TaskOrchestrator::new(
            config,
            self.registry.clone(),
            Arc::new(self.engine.clone()),
            uploader,
        )
    }

    async fn start(&self, orchestrator: &TaskOrchestrator) -> String {
        orchestrator
            .start(self.input.clone(), fixtures::job_settings())
            .await
            .expect("Failed to start task")
    }

    /// Poll until the task reaches a terminal status.
    async fn wait_terminal(&self, task_id: &str) -> Task {
        self.wait_for(task_id, |task| task.status.is_terminal()).await
    }

    /// Poll until `count` artifacts are recorded in the task's storage map.
    async fn wait_uploaded(&self, task_id: &str, count: usize) -> Task {
        self.wait_for(task_id, |task| {
            task.result
                .as_ref()
                .is_some_and(|result| result.storage.len() >= count)
        })
        .await
    }

    async fn wait_for<F>(&self, task_id: &str, condition: F) -> Task
    where
        F: Fn(&Task) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let task = self.registry.get(task_id).await.expect("task exists");
            if condition(&task) {
                return task;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("Timed out waiting for task {}: {:?}", task_id, task);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        cancel_grace_ms: 200,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_progress_then_finish_completes() {
    let harness = TestHarness::new(vec![
        ScriptStep::progress(42.0, "Rendering"),
        ScriptStep::finish(3.5),
    ])
    .await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_terminal(&task_id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert_eq!(task.stage, "Translation complete");
    assert!(task.error.is_none());

    let result = task.result.expect("completed task has a result");
    assert_eq!(result.total_seconds, 3.5);
    let workspace = harness.registry.workspace(&task_id);
    assert_eq!(result.mono_pdf_path, Some(workspace.join("mono.pdf")));
    assert_eq!(result.dual_pdf_path, Some(workspace.join("dual.pdf")));
    assert!(result.storage.is_empty());

    let jobs = harness.engine.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].task_id, task_id);
    assert_eq!(jobs[0].output_dir, workspace);
    assert_eq!(jobs[0].input_path, harness.input);
}

#[tokio::test]
async fn test_progress_is_visible_while_running() {
    let harness = TestHarness::new(vec![
        ScriptStep::Emit(pdfxlate_core::EngineEvent::update(
            pdfxlate_core::engine::ProgressReport::new(42.0, "Rendering")
                .with_parts(2, 3)
                .with_stage_counters(5, 10),
        )),
        ScriptStep::Hang,
    ])
    .await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_for(&task_id, |t| t.progress == 42).await;

    assert_eq!(task.status, TaskStatus::Running);
    assert_eq!(task.stage, "Rendering");
    assert_eq!((task.part_index, task.total_parts), (2, 3));
    assert_eq!((task.stage_current, task.stage_total), (5, 10));

    orchestrator.cancel(&task_id).await.unwrap();
}

#[tokio::test]
async fn test_first_poll_has_not_progressed() {
    let harness = TestHarness::new(vec![ScriptStep::sleep_ms(200), ScriptStep::finish(1.0)]).await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    let task = harness.registry.get(&task_id).await.unwrap();

    assert!(matches!(task.status, TaskStatus::Pending | TaskStatus::Running));
    assert_eq!(task.progress, 0);
    assert!(orchestrator.is_active(&task_id));

    harness.wait_terminal(&task_id).await;
}

#[tokio::test]
async fn test_engine_error_event() {
    let harness = TestHarness::new(vec![
        ScriptStep::progress(10.0, "Parse"),
        ScriptStep::error("engine crashed"),
    ])
    .await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_terminal(&task_id).await;

    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(task.error.as_deref(), Some("engine crashed"));
    assert!(task.result.is_none());
}

#[tokio::test]
async fn test_engine_fails_to_start() {
    let harness = TestHarness::new(vec![]).await;
    harness.engine.fail_to_start("engine binary missing").await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_terminal(&task_id).await;

    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.error.unwrap().contains("engine binary missing"));
}

#[tokio::test]
async fn test_stream_error_is_captured() {
    let harness = TestHarness::new(vec![ScriptStep::Fail("pipe closed".to_string())]).await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_terminal(&task_id).await;

    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.error.unwrap().contains("pipe closed"));
}

#[tokio::test]
async fn test_stream_ending_without_result() {
    let harness = TestHarness::new(vec![ScriptStep::progress(50.0, "Translate")]).await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_terminal(&task_id).await;

    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(
        task.error.as_deref(),
        Some("Engine stream ended without a result")
    );
}

#[tokio::test]
async fn test_panic_is_captured() {
    let harness = TestHarness::new(vec![ScriptStep::Panic("layout model exploded".to_string())]).await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_terminal(&task_id).await;

    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(
        task.error.as_deref(),
        Some("Translation task panicked: layout model exploded")
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!orchestrator.is_active(&task_id));
}

#[tokio::test]
async fn test_timeout_is_reported_as_error() {
    let harness = TestHarness::new(vec![ScriptStep::Hang]).await;
    let orchestrator = harness.orchestrator(OrchestratorConfig {
        task_timeout_secs: 1,
        ..fast_config()
    });

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_terminal(&task_id).await;

    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(
        task.error.as_deref(),
        Some("Translation timed out after 1 seconds")
    );
}

#[tokio::test]
async fn test_cancel_running_task() {
    let harness = TestHarness::new(vec![ScriptStep::progress(20.0, "Translate"), ScriptStep::Hang]).await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    harness.wait_for(&task_id, |t| t.progress == 20).await;

    let task = orchestrator.cancel(&task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.error.as_deref(), Some("Translation was cancelled"));

    // The engine stream was dropped and the unit deregistered.
    assert_eq!(harness.engine.dropped_streams(), 1);
    assert!(!orchestrator.is_active(&task_id));
    assert_eq!(orchestrator.active_count(), 0);

    // Late polls keep the terminal snapshot.
    let polled = harness.registry.get(&task_id).await.unwrap();
    assert_eq!(polled.status, TaskStatus::Cancelled);
    assert_eq!(polled.progress, 20);
}

#[tokio::test]
async fn test_cancel_after_completion_is_noop() {
    let harness = TestHarness::new(vec![ScriptStep::finish(2.0)]).await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    harness.wait_terminal(&task_id).await;

    let task = orchestrator.cancel(&task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.error.is_none());

    // Still a no-op the second time.
    let task = orchestrator.cancel(&task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_cancel_unknown_task() {
    let harness = TestHarness::new(vec![]).await;
    let orchestrator = harness.orchestrator(fast_config());

    let err = orchestrator.cancel("no-such-task").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::TaskNotFound(id) if id == "no-such-task"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_aborts_after_grace() {
    let harness = TestHarness::new(vec![
        ScriptStep::progress(5.0, "Parse"),
        ScriptStep::Block(Duration::from_millis(400)),
        ScriptStep::Hang,
    ])
    .await;
    let orchestrator = harness.orchestrator(OrchestratorConfig {
        cancel_grace_ms: 50,
        ..Default::default()
    });

    let task_id = harness.start(&orchestrator).await;
    harness.wait_for(&task_id, |t| t.progress == 5).await;
    // Let the unit enter the blocking step.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let task = orchestrator.cancel(&task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.error.as_deref(), Some("Translation was cancelled"));
    assert!(!orchestrator.is_active(&task_id));
}

#[tokio::test]
async fn test_artifacts_are_uploaded() {
    let harness = TestHarness::new(vec![ScriptStep::finish(1.5)]).await;
    let orchestrator = harness.orchestrator_with_storage();

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_uploaded(&task_id, 2).await;

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.result.unwrap();
    assert_eq!(result.storage.len(), 2);
    assert!(result.storage.contains_key(&ArtifactKind::Mono));
    assert!(result.storage.contains_key(&ArtifactKind::Dual));
    assert_eq!(harness.storage.puts().await.len(), 2);
}

#[tokio::test]
async fn test_upload_failure_does_not_fail_task() {
    let harness = TestHarness::new(vec![ScriptStep::finish(1.5)]).await;
    harness.storage.fail_next_put(500).await;
    let orchestrator = harness.orchestrator_with_storage();

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_uploaded(&task_id, 1).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.error.is_none());
    let result = task.result.unwrap();
    // Mono is uploaded first and takes the failure.
    assert!(!result.storage.contains_key(&ArtifactKind::Mono));
    assert!(result.storage.contains_key(&ArtifactKind::Dual));
}

#[tokio::test]
async fn test_identical_outputs_across_tasks_upload_once() {
    let harness = TestHarness::new(vec![ScriptStep::finish(1.0)]).await;
    let orchestrator = harness.orchestrator_with_storage();

    let first = harness.start(&orchestrator).await;
    harness.wait_uploaded(&first, 2).await;
    let second = harness.start(&orchestrator).await;
    let task = harness.wait_uploaded(&second, 2).await;

    // Both runs write byte-identical mono and dual files.
    assert_eq!(harness.storage.puts().await.len(), 2);
    assert_eq!(task.result.unwrap().storage.len(), 2);
}

#[tokio::test]
async fn test_completed_snapshot_precedes_uploads() {
    let harness = TestHarness::new(vec![ScriptStep::finish(3.5)])
        .await
        .with_slow_storage(Duration::from_millis(300));
    let orchestrator = harness.orchestrator_with_storage();

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_terminal(&task_id).await;

    // Paths and elapsed time are visible while uploads are still in flight.
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    let result = task.result.unwrap();
    assert_eq!(result.total_seconds, 3.5);
    assert!(result.mono_pdf_path.is_some());
    assert!(result.storage.is_empty());

    let task = harness.wait_uploaded(&task_id, 2).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result.unwrap().total_seconds, 3.5);
}

#[tokio::test]
async fn test_cancel_during_upload_keeps_result() {
    let harness = TestHarness::new(vec![ScriptStep::finish(3.5)])
        .await
        .with_slow_storage(Duration::from_millis(700));
    let orchestrator = harness.storage_orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    harness.wait_terminal(&task_id).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    // First presign is still sleeping.
    assert_eq!(harness.storage.presign_count().await, 0);

    let task = orchestrator.cancel(&task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.error.is_none());
    assert_eq!(task.result.as_ref().unwrap().total_seconds, 3.5);

    // Uploads carry on after the cancel request.
    let task = harness.wait_uploaded(&task_id, 2).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.error.is_none());
    assert_eq!(harness.storage.puts().await.len(), 2);
}

#[tokio::test]
async fn test_timeout_does_not_cover_uploads() {
    let harness = TestHarness::new(vec![ScriptStep::finish(3.5)])
        .await
        .with_slow_storage(Duration::from_millis(700));
    // Two presigns at 700ms each outlast the one second limit.
    let orchestrator = harness.storage_orchestrator(OrchestratorConfig {
        task_timeout_secs: 1,
        ..fast_config()
    });

    let task_id = harness.start(&orchestrator).await;
    let task = harness.wait_uploaded(&task_id, 2).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.error.is_none());
    assert_eq!(task.result.unwrap().total_seconds, 3.5);
}

#[tokio::test]
async fn test_release_during_upload() {
    let harness = TestHarness::new(vec![ScriptStep::finish(1.0)])
        .await
        .with_slow_storage(Duration::from_millis(300));
    let orchestrator = harness.storage_orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    harness.wait_terminal(&task_id).await;

    assert!(orchestrator.release(&task_id).await);
    assert!(!harness.registry.contains(&task_id).await);

    // The unit notices the task is gone and winds down.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while orchestrator.is_active(&task_id) {
        assert!(tokio::time::Instant::now() < deadline, "unit never finished");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!harness.registry.contains(&task_id).await);
}

#[tokio::test]
async fn test_release_removes_task_and_workspace() {
    let harness = TestHarness::new(vec![ScriptStep::finish(1.0)]).await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    harness.wait_terminal(&task_id).await;
    let workspace = harness.registry.workspace(&task_id);
    assert!(workspace.join("mono.pdf").exists());

    assert!(orchestrator.release(&task_id).await);
    assert!(!workspace.exists());
    assert!(harness.registry.get(&task_id).await.is_err());

    // Releasing again is harmless.
    assert!(!orchestrator.release(&task_id).await);
}

#[tokio::test]
async fn test_release_cancels_running_task() {
    let harness = TestHarness::new(vec![ScriptStep::Hang]).await;
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    harness
        .wait_for(&task_id, |t| t.status == TaskStatus::Running)
        .await;

    assert!(orchestrator.release(&task_id).await);
    assert!(!orchestrator.is_active(&task_id));
    assert!(!harness.registry.contains(&task_id).await);
}

#[tokio::test]
async fn test_shutdown_cancels_and_rejects() {
    let harness = TestHarness::new(vec![ScriptStep::Hang]).await;
    let orchestrator = harness.orchestrator(fast_config());

    let a = harness.start(&orchestrator).await;
    let b = harness.start(&orchestrator).await;
    assert_eq!(orchestrator.active_tasks().len(), 2);

    orchestrator.shutdown().await;

    assert_eq!(orchestrator.active_count(), 0);
    for id in [&a, &b] {
        let task = harness.registry.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
    }

    let err = orchestrator
        .start(harness.input.clone(), fixtures::job_settings())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::ShuttingDown));

    let status = orchestrator.status().await;
    assert!(!status.accepting);
    assert_eq!(status.tasks.get(TaskStatus::Cancelled), 2);
}

#[tokio::test]
async fn test_listener_sees_terminal_snapshot() {
    let harness = TestHarness::new(vec![ScriptStep::progress(30.0, "Parse"), ScriptStep::finish(1.0)]).await;
    let seen: Arc<Mutex<Vec<TaskStatus>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    harness.registry.set_listener(Arc::new(move |event: &TaskEvent| {
        if let TaskEvent::Updated(task) = event {
            sink.lock().unwrap().push(task.status);
        }
    }));
    let orchestrator = harness.orchestrator(fast_config());

    let task_id = harness.start(&orchestrator).await;
    harness.wait_terminal(&task_id).await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&TaskStatus::Pending));
    assert_eq!(seen.last(), Some(&TaskStatus::Completed));
    assert_eq!(
        seen.iter().filter(|s| s.is_terminal()).count(),
        1,
        "exactly one terminal write"
    );
}

#[tokio::test]
async fn test_listener_sees_storage_after_completion() {
    let harness = TestHarness::new(vec![ScriptStep::finish(1.0)]).await;
    let seen: Arc<Mutex<Vec<(TaskStatus, usize)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    harness.registry.set_listener(Arc::new(move |event: &TaskEvent| {
        if let TaskEvent::Updated(task) = event {
            let stored = task.result.as_ref().map_or(0, |r| r.storage.len());
            sink.lock().unwrap().push((task.status, stored));
        }
    }));
    let orchestrator = harness.orchestrator_with_storage();

    let task_id = harness.start(&orchestrator).await;
    harness.wait_uploaded(&task_id, 2).await;

    let seen = seen.lock().unwrap().clone();
    let completed: Vec<_> = seen
        .iter()
        .filter(|(status, _)| *status == TaskStatus::Completed)
        .collect();
    // The terminal snapshot first, then the same snapshot with storage.
    assert_eq!(completed, vec![&(TaskStatus::Completed, 0), &(TaskStatus::Completed, 2)]);
}
