//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Task orchestration (starts, outcomes, durations)
//! - Engine events
//! - Artifact uploads

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Orchestrator - Task Metrics
// =============================================================================

/// Tasks started total.
pub static TASKS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("pdfxlate_tasks_started_total", "Total translation tasks started").unwrap()
});

/// Tasks finished total by outcome.
pub static TASKS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pdfxlate_tasks_finished_total",
            "Total translation tasks that reached a terminal status",
        ),
        &["outcome"], // "completed", "error", "cancelled"
    )
    .unwrap()
});

/// Task duration in seconds.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pdfxlate_task_duration_seconds",
            "Wall-clock duration of translation tasks",
        )
        .buckets(vec![
            1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
        ]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Engine Metrics
// =============================================================================

/// Engine events received by kind.
pub static ENGINE_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfxlate_engine_events_total", "Engine events received"),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Storage Metrics
// =============================================================================

/// Artifact uploads by result.
pub static ARTIFACT_UPLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfxlate_artifact_uploads_total", "Artifact upload attempts"),
        &["result"], // "uploaded", "cache_hit", "failed", "disabled"
    )
    .unwrap()
});

/// Bytes uploaded to object storage.
pub static UPLOADED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pdfxlate_uploaded_bytes_total",
        "Bytes uploaded to object storage",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Tasks
        Box::new(TASKS_STARTED.clone()),
        Box::new(TASKS_FINISHED.clone()),
        Box::new(TASK_DURATION.clone()),
        // Engine
        Box::new(ENGINE_EVENTS.clone()),
        // Storage
        Box::new(ARTIFACT_UPLOADS.clone()),
        Box::new(UPLOADED_BYTES.clone()),
    ]
}
