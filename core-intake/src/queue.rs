//! # Batch Uploader
//!
//! Owns the upload list and drains it against the parsing backend with a
//! bounded number of simultaneous transfers.
//!
//! ## Overview
//!
//! A run starts from every item that is `pending` or `duplicate` at that
//! moment, in list order. A single dispatch loop hands items to upload tasks:
//!
//! 1. Stop if the run is paused
//! 2. Wait for a free slot on the run's semaphore
//! 3. Stop if the run was paused while waiting
//! 4. Pop the next item; skip it when it is a duplicate and skipping is on
//! 5. Otherwise mark it `uploading`, spawn its upload task, wait the dispatch delay
//!
//! The backlog, the active counter and the pause flag share one lock, so
//! popping an item and reserving its slot happen together. Each upload task
//! holds its semaphore permit until the transfer settles, then hands an
//! accepted item to the [`TaskPoller`].
//!
//! A run completes exactly once, when the backlog is empty and no transfer is
//! active. Status polling is not part of completion. Completion records the run
//! in history, emits `RunCompleted` and resolves the `start()` future.
//!
//! ## Usage
//!
//! ```ignore
//! let uploader = BatchUploader::new(dependencies, UploadConfig::default())?;
//! uploader.load_persisted().await?;
//!
//! let report = uploader.add_files(files);
//! for rejected in &report.rejected {
//!     println!("{}", rejected);
//! }
//!
//! uploader.run_precheck().await?;
//! let run = uploader.start().await?;
//! println!("{} accepted, {} failed", run.success_count, run.failed_count);
//! ```

use bridge_traits::{
    Clock, DuplicateLookup, ResumeParsingService, SettingsStore, UploadRequest,
};
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use core_runtime::logging::strip_path;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::time::{interval_at, sleep, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::categories::CategoryLabels;
use crate::config::{clamp_concurrency, UploadConfig};
use crate::error::{IntakeError, Result, ValidationError};
use crate::item::{validate_file_with_limit, IncomingFile, UploadItem, UploadItemId, UploadStatus};
use crate::poller::TaskPoller;
use crate::precheck::{DuplicatePrecheck, PrecheckSummary};
use crate::recorder::{BatchRun, BatchRunRecorder};
use crate::store::{ItemStore, QueueCounts};

/// Summary handed back when a run completes.
pub type RunReport = BatchRun;

/// Collaborators the uploader needs.
#[derive(Clone)]
pub struct IntakeDependencies {
    pub parsing_service: Arc<dyn ResumeParsingService>,
    /// Required for [`BatchUploader::run_precheck`]
    pub duplicate_lookup: Option<Arc<dyn DuplicateLookup>>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
}

/// Result of adding a batch of files.
#[derive(Debug, Default)]
pub struct AddFilesReport {
    pub added: Vec<UploadItemId>,
    pub rejected: Vec<ValidationError>,
}

struct RunSettings {
    concurrency_limit: u8,
    skip_duplicates: bool,
}

struct ActiveRun {
    id: String,
    backlog: VecDeque<UploadItemId>,
    members: Vec<UploadItemId>,
    total: usize,
    active: usize,
    paused: bool,
    /// A dispatch loop is running for this run
    draining: bool,
    slots: Arc<Semaphore>,
    done: Option<oneshot::Sender<BatchRun>>,
}

enum Dispatch {
    Upload(UploadRequest),
    Skipped,
    Dropped,
}

enum Step {
    Upload(UploadItemId, UploadRequest),
    Skipped,
    Stop,
    Complete(ActiveRun),
}

impl ActiveRun {
    /// Pop items until one can be dispatched or skipped.
    ///
    /// Items removed or changed since the run was seeded are dropped.
    fn next_step(&mut self, store: &ItemStore, skip_duplicates: bool) -> Step {
        while let Some(id) = self.backlog.pop_front() {
            let dispatch = store.update(id, |item| match item.status {
                UploadStatus::Duplicate if skip_duplicates => {
                    item.skip()?;
                    Ok(Dispatch::Skipped)
                }
                UploadStatus::Pending | UploadStatus::Duplicate => {
                    item.begin_upload()?;
                    Ok(Dispatch::Upload(UploadRequest {
                        file_name: item.name.clone(),
                        mime_type: item.mime_type.clone(),
                        payload: item.payload.clone(),
                        category: item.category.clone(),
                        force_create: item.force_create,
                    }))
                }
                _ => Ok(Dispatch::Dropped),
            });

            match dispatch {
                Ok(Dispatch::Upload(request)) => {
                    self.active += 1;
                    return Step::Upload(id, request);
                }
                Ok(Dispatch::Skipped) => {
                    debug!(item_id = %id, "Skipped duplicate");
                    return Step::Skipped;
                }
                Ok(Dispatch::Dropped) | Err(_) => {
                    debug!(item_id = %id, "Dropping item that left the backlog");
                }
            }
        }

        self.draining = false;
        Step::Stop
    }

    fn is_finished(&self) -> bool {
        self.backlog.is_empty() && self.active == 0
    }
}

/// Take the run out of its slot if it is the given run and has no work left.
fn take_finished(slot: &mut Option<ActiveRun>, run_id: &str) -> Option<ActiveRun> {
    let finished = slot
        .as_ref()
        .is_some_and(|run| run.id == run_id && run.is_finished());
    if finished {
        slot.take()
    } else {
        None
    }
}

struct Inner {
    service: Arc<dyn ResumeParsingService>,
    store: ItemStore,
    poller: TaskPoller,
    precheck: Option<DuplicatePrecheck>,
    recorder: BatchRunRecorder,
    categories: CategoryLabels,
    events: EventBus,
    settings: Mutex<RunSettings>,
    config: UploadConfig,
    run: Mutex<Option<ActiveRun>>,
}

/// Concurrency-bounded batch upload queue.
///
/// Cloning is cheap; clones share the same list and run state.
#[derive(Clone)]
pub struct BatchUploader {
    inner: Arc<Inner>,
}

impl BatchUploader {
    pub fn new(deps: IntakeDependencies, config: UploadConfig) -> Result<Self> {
        config.validate()?;

        let store = ItemStore::new(deps.events.clone());
        let poller = TaskPoller::new(Arc::clone(&deps.parsing_service), config.poller.clone());
        let precheck = deps.duplicate_lookup.map(|lookup| {
            DuplicatePrecheck::new(lookup, deps.events.clone(), config.precheck_progress_every)
        });
        let recorder = BatchRunRecorder::new(
            Arc::clone(&deps.settings_store),
            deps.clock,
            config.history_limit,
        );
        let categories = CategoryLabels::new(deps.settings_store);

        Ok(Self {
            inner: Arc::new(Inner {
                service: deps.parsing_service,
                store,
                poller,
                precheck,
                recorder,
                categories,
                events: deps.events,
                settings: Mutex::new(RunSettings {
                    concurrency_limit: config.concurrency_limit,
                    skip_duplicates: config.skip_duplicates,
                }),
                config,
                run: Mutex::new(None),
            }),
        })
    }

    /// Restore batch history and category labels.
    pub async fn load_persisted(&self) -> Result<()> {
        let runs = self.inner.recorder.load().await;
        let labels = self.inner.categories.load().await;
        info!(runs, labels, "Restored persisted intake state");
        Ok(())
    }

    // ------------------------------------------------------------------
    // List management
    // ------------------------------------------------------------------

    /// Validate and enqueue files as `pending` items.
    ///
    /// Rejected files are reported and never become items. A name already in
    /// the list (or earlier in this batch) is rejected.
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub fn add_files(&self, files: Vec<IncomingFile>) -> AddFilesReport {
        let mut report = AddFilesReport::default();

        for file in files {
            let checked = validate_file_with_limit(
                &file.name,
                file.mime_type.as_deref(),
                file.size_bytes(),
                self.inner.config.max_file_size_bytes,
            )
            .and_then(|()| {
                if self.inner.store.contains_name(&file.name) {
                    Err(ValidationError::DuplicateName {
                        name: file.name.clone(),
                    })
                } else {
                    Ok(())
                }
            });

            match checked {
                Ok(()) => {
                    let id = self.inner.store.push(UploadItem::new(file));
                    report.added.push(id);
                }
                Err(reason) => {
                    debug!(file = %strip_path(&file.name), reason = %reason, "Rejected file");
                    report.rejected.push(reason);
                }
            }
        }

        info!(
            added = report.added.len(),
            rejected = report.rejected.len(),
            "Files added"
        );
        report
    }

    /// Remove one item. Refused while its transfer is in flight.
    pub fn remove_file(&self, id: UploadItemId) -> Result<UploadItem> {
        // Dispatch marks items `uploading` under the run lock.
        let _run = self.inner.run.lock();
        let item = self
            .inner
            .store
            .get(id)
            .ok_or_else(|| IntakeError::ItemNotFound(id.to_string()))?;

        if item.status == UploadStatus::Uploading {
            return Err(IntakeError::InvalidStateTransition {
                from: item.status.as_str().to_string(),
                to: "removed".to_string(),
                reason: "transfer in progress".to_string(),
            });
        }

        self.inner
            .store
            .remove(id)
            .ok_or_else(|| IntakeError::ItemNotFound(id.to_string()))
    }

    /// Empty the list. Refused during a run.
    pub fn clear_all(&self) -> Result<usize> {
        let run = self.inner.run.lock();
        if run.is_some() {
            return Err(IntakeError::RunInProgress);
        }
        let removed = self.inner.store.clear();
        info!(removed, "Upload list cleared");
        Ok(removed)
    }

    /// Change an item's category, or clear it with `None`.
    pub fn set_category(&self, id: UploadItemId, category: Option<String>) -> Result<()> {
        self.inner.store.update(id, |item| {
            if !item.category_editable() {
                return Err(IntakeError::CategoryLocked {
                    name: item.name.clone(),
                    status: item.status.as_str().to_string(),
                });
            }
            item.category = category
                .map(|label| label.trim().to_string())
                .filter(|label| !label.is_empty());
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Set the concurrency limit for the next run. Returns the clamped value.
    pub fn set_concurrency_limit(&self, limit: u8) -> u8 {
        let effective = clamp_concurrency(limit);
        self.inner.settings.lock().concurrency_limit = effective;
        debug!(requested = limit, effective, "Concurrency limit updated");
        effective
    }

    pub fn concurrency_limit(&self) -> u8 {
        self.inner.settings.lock().concurrency_limit
    }

    /// Takes effect at the next dispatch, including during a run.
    pub fn set_skip_duplicates(&self, skip: bool) {
        self.inner.settings.lock().skip_duplicates = skip;
    }

    pub fn skip_duplicates(&self) -> bool {
        self.inner.settings.lock().skip_duplicates
    }

    // ------------------------------------------------------------------
    // Duplicate pre-check
    // ------------------------------------------------------------------

    /// Flag pending items whose filename names an existing candidate.
    pub async fn run_precheck(&self) -> Result<PrecheckSummary> {
        let precheck =
            self.inner
                .precheck
                .as_ref()
                .ok_or_else(|| IntakeError::CapabilityMissing {
                    capability: "DuplicateLookup".to_string(),
                    message: "No duplicate lookup service configured".to_string(),
                })?;
        precheck.run(&self.inner.store).await
    }

    // ------------------------------------------------------------------
    // Runs
    // ------------------------------------------------------------------

    /// Upload every `pending` and `duplicate` item and wait for the run to
    /// complete.
    ///
    /// Dropping the returned future does not stop the run.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<RunReport> {
        let (run_id, total, limit, done) = {
            let mut slot = self.inner.run.lock();
            if slot.is_some() {
                return Err(IntakeError::RunInProgress);
            }

            let backlog: VecDeque<UploadItemId> = self
                .inner
                .store
                .ids_where(|item| item.status.is_dispatchable())
                .into();
            if backlog.is_empty() {
                return Err(IntakeError::NothingToUpload);
            }

            let limit = self.inner.settings.lock().concurrency_limit;
            let run_id = Uuid::new_v4().to_string();
            let total = backlog.len();
            let (tx, rx) = oneshot::channel();

            *slot = Some(ActiveRun {
                id: run_id.clone(),
                members: backlog.iter().copied().collect(),
                backlog,
                total,
                active: 0,
                paused: false,
                draining: true,
                slots: Arc::new(Semaphore::new(limit as usize)),
                done: Some(tx),
            });
            (run_id, total, limit, rx)
        };

        info!(run_id = %run_id, total, concurrency_limit = limit, "Batch run started");
        self.emit(UploadEvent::RunStarted {
            run_id: run_id.clone(),
            total: total as u64,
            concurrency_limit: limit,
        });

        tokio::spawn(self.clone().drain(run_id));

        done.await.map_err(|_| IntakeError::NoActiveRun)
    }

    /// Stop dispatching. Transfers already in flight continue.
    pub fn pause(&self) -> Result<()> {
        let (run_id, remaining) = {
            let mut slot = self.inner.run.lock();
            let run = slot.as_mut().ok_or(IntakeError::NoActiveRun)?;
            if run.paused {
                return Ok(());
            }
            run.paused = true;
            (run.id.clone(), run.backlog.len())
        };

        info!(run_id = %run_id, remaining, "Batch run paused");
        self.emit(UploadEvent::RunPaused {
            run_id,
            remaining: remaining as u64,
        });
        Ok(())
    }

    /// Continue dispatching the remaining backlog.
    pub fn resume(&self) -> Result<()> {
        let (run_id, remaining, respawn) = {
            let mut slot = self.inner.run.lock();
            let run = slot.as_mut().ok_or(IntakeError::NoActiveRun)?;
            if !run.paused {
                return Ok(());
            }
            run.paused = false;
            let respawn = !run.draining;
            run.draining = true;
            (run.id.clone(), run.backlog.len(), respawn)
        };

        info!(run_id = %run_id, remaining, "Batch run resumed");
        self.emit(UploadEvent::RunResumed {
            run_id: run_id.clone(),
            remaining: remaining as u64,
        });

        if respawn {
            tokio::spawn(self.clone().drain(run_id));
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.run.lock().is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.inner
            .run
            .lock()
            .as_ref()
            .is_some_and(|run| run.paused)
    }

    // ------------------------------------------------------------------
    // Retry and force
    // ------------------------------------------------------------------

    /// Reset every `error` item to `pending`. Returns how many were reset.
    #[instrument(skip(self))]
    pub fn retry_all_failed(&self) -> Result<usize> {
        let run = self.inner.run.lock();
        if run.is_some() {
            return Err(IntakeError::RunInProgress);
        }

        let failed = self
            .inner
            .store
            .ids_where(|item| item.status == UploadStatus::Error);
        let reset = failed
            .into_iter()
            .filter(|id| {
                self.inner
                    .store
                    .update(*id, |item| item.reset_for_retry())
                    .is_ok()
            })
            .count();

        info!(reset, "Failed items reset for retry");
        Ok(reset)
    }

    /// Reset one `error` item to `pending`.
    ///
    /// Returns `false` without changing anything when the item is not `error`.
    pub fn retry_one(&self, id: UploadItemId) -> Result<bool> {
        let run = self.inner.run.lock();
        if run.is_some() {
            return Err(IntakeError::RunInProgress);
        }

        self.inner.store.update(id, |item| {
            if item.status != UploadStatus::Error {
                return Ok(false);
            }
            item.reset_for_retry()?;
            Ok(true)
        })
    }

    /// Queue a duplicate for upload anyway, asking the backend to create it.
    pub fn force_upload(&self, id: UploadItemId) -> Result<()> {
        self.inner.store.update(id, |item| item.force())
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> Vec<UploadItem> {
        self.inner.store.snapshot()
    }

    pub fn get(&self, id: UploadItemId) -> Option<UploadItem> {
        self.inner.store.get(id)
    }

    pub fn counts(&self) -> QueueCounts {
        self.inner.store.counts()
    }

    /// Recorded runs, newest first.
    pub fn history(&self) -> Vec<BatchRun> {
        self.inner.recorder.history()
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.inner.recorder.clear().await
    }

    pub fn categories(&self) -> Vec<String> {
        self.inner.categories.list()
    }

    pub async fn add_category(&self, label: &str) -> Result<bool> {
        self.inner.categories.add(label).await
    }

    pub async fn remove_category(&self, label: &str) -> Result<bool> {
        self.inner.categories.remove(label).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until every status watch has settled.
    pub async fn wait_for_polls(&self) {
        self.inner.poller.wait_idle().await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn drain(self, run_id: String) {
        loop {
            let slots = {
                let mut slot = self.inner.run.lock();
                match slot.as_mut() {
                    Some(run) if run.id == run_id && !run.paused => Some(Arc::clone(&run.slots)),
                    Some(run) if run.id == run_id => {
                        run.draining = false;
                        None
                    }
                    _ => return,
                }
            };
            let Some(slots) = slots else {
                self.complete_if_finished(&run_id).await;
                return;
            };

            let Ok(permit) = slots.acquire_owned().await else {
                return;
            };

            let skip_duplicates = self.inner.settings.lock().skip_duplicates;
            let step = {
                let mut slot = self.inner.run.lock();
                let step = match slot.as_mut() {
                    Some(run) if run.id == run_id => {
                        if run.paused {
                            run.draining = false;
                            Step::Stop
                        } else {
                            run.next_step(&self.inner.store, skip_duplicates)
                        }
                    }
                    _ => return,
                };
                match step {
                    Step::Stop => match take_finished(&mut slot, &run_id) {
                        Some(run) => Step::Complete(run),
                        None => Step::Stop,
                    },
                    other => other,
                }
            };

            match step {
                Step::Upload(id, request) => {
                    debug!(run_id = %run_id, item_id = %id, "Dispatching upload");
                    tokio::spawn(self.clone().upload(run_id.clone(), id, request, permit));
                    sleep(self.inner.config.dispatch_delay).await;
                }
                Step::Skipped => drop(permit),
                Step::Stop => return,
                Step::Complete(run) => {
                    drop(permit);
                    self.complete(run).await;
                    return;
                }
            }
        }
    }

    async fn upload(
        self,
        run_id: String,
        id: UploadItemId,
        request: UploadRequest,
        permit: OwnedSemaphorePermit,
    ) {
        let handle = self.inner.store.handle(id);
        let config = &self.inner.config;
        let service = Arc::clone(&self.inner.service);

        let mut call = tokio::spawn(async move { service.upload_file(request).await });
        let mut ticker = interval_at(Instant::now() + config.progress_tick, config.progress_tick);

        let result = loop {
            tokio::select! {
                joined = &mut call => {
                    break match joined {
                        Ok(result) => result.map_err(|e| IntakeError::Transport(e.to_string())),
                        Err(e) => Err(IntakeError::Transport(e.to_string())),
                    };
                }
                _ = ticker.tick() => {
                    if let Err(e) = handle.update(|item| {
                        item.advance_progress(config.progress_step, config.progress_cap);
                        Ok(())
                    }) {
                        debug!(item_id = %id, error = %e, "Progress tick not applied");
                    }
                }
            }
        };

        match result {
            Ok(ticket) => {
                let task_id = ticket.task_id;
                match handle.update(|item| item.mark_accepted(task_id.clone())) {
                    Ok(()) => {
                        debug!(item_id = %id, task_id = %task_id, "Upload accepted");
                        self.inner.poller.watch(handle, task_id);
                    }
                    Err(e) => warn!(item_id = %id, error = %e, "Could not record accepted upload"),
                }
            }
            Err(e) => {
                warn!(item_id = %id, error = %e, "Upload failed");
                let message = e.to_string();
                if let Err(e) = handle.update(|item| item.mark_rejected(message)) {
                    warn!(item_id = %id, error = %e, "Could not record failed upload");
                }
            }
        }

        drop(permit);
        self.finish_upload(&run_id).await;
    }

    async fn finish_upload(&self, run_id: &str) {
        let finished = {
            let mut slot = self.inner.run.lock();
            if let Some(run) = slot.as_mut().filter(|run| run.id == run_id) {
                run.active = run.active.saturating_sub(1);
            }
            take_finished(&mut slot, run_id)
        };

        if let Some(run) = finished {
            self.complete(run).await;
        }
    }

    async fn complete_if_finished(&self, run_id: &str) {
        let finished = take_finished(&mut self.inner.run.lock(), run_id);
        if let Some(run) = finished {
            self.complete(run).await;
        }
    }

    async fn complete(&self, mut run: ActiveRun) {
        let items: Vec<UploadItem> = run
            .members
            .iter()
            .filter_map(|id| self.inner.store.get(*id))
            .collect();

        let record = self.inner.recorder.record(&run.id, &items, run.total).await;

        info!(
            run_id = %run.id,
            succeeded = record.success_count,
            failed = record.failed_count,
            skipped = record.skipped_count,
            "Batch run completed"
        );
        self.emit(UploadEvent::RunCompleted {
            run_id: run.id.clone(),
            total: record.total as u64,
            succeeded: record.success_count as u64,
            failed: record.failed_count as u64,
            skipped: record.skipped_count as u64,
        });

        if let Some(done) = run.done.take() {
            let _ = done.send(record);
        }
    }

    fn emit(&self, event: UploadEvent) {
        let _ = self.inner.events.emit(CoreEvent::Upload(event));
    }
}
