//! Server state management for the cleaner server

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::CleanerConfig;
use crate::job::{BatchOutcome, JobError, JobRecord, JobResult};

/// A job that failed, kept for `ListResults`
#[derive(Clone, Debug, Serialize)]
pub struct FailureSummary {
    pub layer: i32,
    pub datatype: i32,
    pub message: String,
    pub cancelled: bool,
}

/// Queued jobs, finished results and the handle of any running batch
pub struct ServerState {
    pub config: CleanerConfig,
    pub queue: Vec<JobRecord>,
    pub results: IndexMap<(i32, i32), JobResult>,
    pub failures: Vec<FailureSummary>,
    pub cancel: Arc<AtomicBool>,
    pub running: bool,
    pub shutdown_requested: bool,
}

impl ServerState {
    pub fn new() -> Self {
        Self::with_config(CleanerConfig::default())
    }

    pub fn with_config(config: CleanerConfig) -> Self {
        Self {
            config,
            queue: Vec::new(),
            results: IndexMap::new(),
            failures: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            running: false,
            shutdown_requested: false,
        }
    }

    /// Fresh cancellation flag for the next batch
    pub fn arm_cancel(&mut self) -> Arc<AtomicBool> {
        self.cancel = Arc::new(AtomicBool::new(false));
        Arc::clone(&self.cancel)
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Store the outcome of a batch; failures replace the previous batch's
    pub fn absorb(&mut self, batch: BatchOutcome) {
        self.failures = batch
            .failures
            .into_iter()
            .map(|f| FailureSummary {
                layer: f.layer,
                datatype: f.datatype,
                cancelled: matches!(f.error, JobError::Cancelled),
                message: f.error.to_string(),
            })
            .collect();
        self.results.extend(batch.results);
        self.running = false;
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result from a background batch
pub struct RunAsyncResult {
    pub batch: Result<BatchOutcome, JobError>,
    pub elapsed_ms: f64,
}
