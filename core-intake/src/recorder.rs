//! # Batch Run Recorder
//!
//! Turns a finished run into an immutable [`BatchRun`] and keeps a bounded,
//! newest-first history persisted as one JSON value.
//!
//! Run statistics come from each item's phase-1 [`UploadOutcome`], so a poller
//! that later demotes an accepted item to `duplicate` or `error` does not
//! change the numbers already recorded.

use bridge_traits::{Clock, SettingsStore};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::item::{UploadItem, UploadOutcome, UploadStatus};

/// Settings key holding the serialized history.
pub const HISTORY_KEY: &str = "resume_upload.history";

/// Final state of one file in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub name: String,
    pub final_status: UploadStatus,
    pub result_label: String,
}

/// Summary of one completed batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRun {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub files: Vec<FileOutcome>,
}

pub struct BatchRunRecorder {
    store: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    limit: usize,
    history: Mutex<Vec<BatchRun>>,
}

impl BatchRunRecorder {
    pub fn new(store: Arc<dyn SettingsStore>, clock: Arc<dyn Clock>, limit: usize) -> Self {
        Self {
            store,
            clock,
            limit: limit.max(1),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Restore history from the settings store.
    ///
    /// A missing, unreadable or corrupt value leaves the history empty.
    pub async fn load(&self) -> usize {
        let stored = match self.store.get_string(HISTORY_KEY).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read batch history");
                None
            }
        };

        let mut runs = match stored.as_deref().map(serde_json::from_str::<Vec<BatchRun>>) {
            Some(Ok(runs)) => runs,
            Some(Err(e)) => {
                warn!(error = %e, "Discarding corrupt batch history");
                Vec::new()
            }
            None => Vec::new(),
        };
        runs.truncate(self.limit);

        let count = runs.len();
        *self.history.lock() = runs;
        debug!(count, "Batch history loaded");
        count
    }

    /// Record a finished run over its member items.
    pub async fn record(&self, run_id: &str, items: &[UploadItem], total_at_start: usize) -> BatchRun {
        let mut run = BatchRun {
            id: run_id.to_string(),
            timestamp: self.clock.now(),
            total: total_at_start,
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            files: Vec::with_capacity(items.len()),
        };

        for item in items {
            match item.upload_outcome {
                Some(UploadOutcome::Accepted) => run.success_count += 1,
                Some(UploadOutcome::Rejected) => run.failed_count += 1,
                None => {}
            }
            if item.status == UploadStatus::Skipped {
                run.skipped_count += 1;
            }
            run.files.push(FileOutcome {
                name: item.name.clone(),
                final_status: item.status,
                result_label: item
                    .message
                    .clone()
                    .unwrap_or_else(|| item.status.as_str().to_string()),
            });
        }

        let serialized = {
            let mut history = self.history.lock();
            history.insert(0, run.clone());
            history.truncate(self.limit);
            serde_json::to_string(&*history)
        };

        match serialized {
            Ok(json) => {
                if let Err(e) = self.store.set_string(HISTORY_KEY, &json).await {
                    warn!(run_id = %run.id, error = %e, "Failed to persist batch history");
                }
            }
            Err(e) => warn!(run_id = %run.id, error = %e, "Failed to serialize batch history"),
        }

        info!(
            run_id = %run.id,
            total = run.total,
            succeeded = run.success_count,
            failed = run.failed_count,
            skipped = run.skipped_count,
            "Batch run recorded"
        );
        run
    }

    /// Recorded runs, newest first.
    pub fn history(&self) -> Vec<BatchRun> {
        self.history.lock().clone()
    }

    /// Forget every recorded run.
    pub async fn clear(&self) -> crate::error::Result<()> {
        self.history.lock().clear();
        self.store.delete(HISTORY_KEY).await?;
        Ok(())
    }
}
