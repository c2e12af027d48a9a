//! # Duplicate Pre-Check
//!
//! Optional pass over pending items that flags likely duplicates before
//! anything is uploaded. Candidate names come from filenames
//! ([`extract_candidate_name`]); lookups run one at a time.
//!
//! Lookup failures are logged and counted. They never change an item and never
//! abort the pass.

use bridge_traits::DuplicateLookup;
use core_runtime::events::{CoreEvent, EventBus, PrecheckEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{IntakeError, Result};
use crate::item::{DuplicateInfo, UploadStatus};
use crate::name_extract::extract_candidate_name;
use crate::store::ItemStore;

/// Totals for one pre-check pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrecheckSummary {
    pub checked: usize,
    pub duplicates: usize,
    pub unnamed: usize,
    pub lookup_failures: usize,
}

pub struct DuplicatePrecheck {
    lookup: Arc<dyn DuplicateLookup>,
    events: EventBus,
    progress_every: usize,
    running: AtomicBool,
}

/// Clears the running flag when a pass ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DuplicatePrecheck {
    pub fn new(lookup: Arc<dyn DuplicateLookup>, events: EventBus, progress_every: usize) -> Self {
        Self {
            lookup,
            events,
            progress_every: progress_every.max(1),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Check every item that is pending when the pass starts.
    #[instrument(skip(self, store))]
    pub async fn run(&self, store: &ItemStore) -> Result<PrecheckSummary> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(IntakeError::PrecheckInProgress);
        }
        let _guard = RunningGuard(&self.running);

        let candidates = store.ids_where(|item| item.status == UploadStatus::Pending);
        let total = candidates.len() as u64;
        info!(total, "Starting duplicate pre-check");
        self.emit(PrecheckEvent::Started { total });

        let mut summary = PrecheckSummary::default();

        for id in candidates {
            // Skip items removed or dispatched since the pass started.
            let Some(item) = store
                .get(id)
                .filter(|item| item.status == UploadStatus::Pending)
            else {
                continue;
            };
            summary.checked += 1;

            match extract_candidate_name(&item.name) {
                None => {
                    debug!(item_id = %id, "No candidate name in filename");
                    summary.unnamed += 1;
                }
                Some(name) => match self.lookup.check_duplicate_by_name(&name).await {
                    Ok(check) => {
                        if let Some(existing) = check.best_match() {
                            let info = DuplicateInfo::new(&existing.id, &existing.name);
                            let message = IntakeError::DuplicateDetected {
                                candidate_id: existing.id.clone(),
                                candidate_name: existing.name.clone(),
                            }
                            .to_string();
                            let flagged = store.update(id, |item| {
                                if item.status != UploadStatus::Pending {
                                    return Ok(false);
                                }
                                item.mark_duplicate(Some(info), message)?;
                                Ok(true)
                            });
                            if matches!(flagged, Ok(true)) {
                                summary.duplicates += 1;
                            }
                        }
                    }
                    Err(e) => {
                        let failure = IntakeError::LookupFailure {
                            name,
                            message: e.to_string(),
                        };
                        warn!(item_id = %id, error = %failure, "Duplicate lookup failed");
                        summary.lookup_failures += 1;
                    }
                },
            }

            if summary.checked % self.progress_every == 0 {
                self.emit_progress(&summary, total);
            }
        }

        if summary.checked % self.progress_every != 0 || summary.checked == 0 {
            self.emit_progress(&summary, total);
        }

        info!(
            checked = summary.checked,
            duplicates = summary.duplicates,
            unnamed = summary.unnamed,
            lookup_failures = summary.lookup_failures,
            "Duplicate pre-check completed"
        );
        self.emit(PrecheckEvent::Completed {
            checked: summary.checked as u64,
            duplicates: summary.duplicates as u64,
            unnamed: summary.unnamed as u64,
            lookup_failures: summary.lookup_failures as u64,
        });

        Ok(summary)
    }

    fn emit_progress(&self, summary: &PrecheckSummary, total: u64) {
        self.emit(PrecheckEvent::Progress {
            checked: summary.checked as u64,
            total,
            duplicates: summary.duplicates as u64,
        });
    }

    fn emit(&self, event: PrecheckEvent) {
        let _ = self.events.emit(CoreEvent::Precheck(event));
    }
}
