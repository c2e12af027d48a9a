//! Shared collaborators for the batch upload integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    BridgeError, CandidateRecord, CandidateSummary, DuplicateCheck, DuplicateLookup,
    RemoteTaskStatus, ResumeParsingService, SettingsStore, SystemClock, TaskStatusReport,
    UploadRequest, UploadTicket,
};
use core_intake::{BatchUploader, IncomingFile, IntakeDependencies, UploadConfig};
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Mock Implementations
// ============================================================================

/// Parsing backend with scripted latency, failures and task outcomes.
pub struct ScriptedParser {
    upload_delay: Duration,
    failing: Mutex<HashSet<String>>,
    outcomes: Mutex<HashMap<String, TaskStatusReport>>,
    tasks: Mutex<HashMap<String, String>>,
    uploads: Mutex<Vec<UploadRequest>>,
    next_task: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    status_queries: AtomicUsize,
}

impl ScriptedParser {
    pub fn new(upload_delay: Duration) -> Self {
        Self {
            upload_delay,
            failing: Mutex::new(HashSet::new()),
            outcomes: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            uploads: Mutex::new(Vec::new()),
            next_task: AtomicUsize::new(1),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            status_queries: AtomicUsize::new(0),
        }
    }

    /// Reject uploads of `file_name` with a transport error.
    pub fn fail_uploads_of(&self, file_name: &str) {
        self.failing.lock().insert(file_name.to_string());
    }

    pub fn heal(&self, file_name: &str) {
        self.failing.lock().remove(file_name);
    }

    /// Status every query for `file_name`'s task reports. Defaults to completed.
    pub fn settle_as(&self, file_name: &str, report: TaskStatusReport) {
        self.outcomes.lock().insert(file_name.to_string(), report);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    /// File names in upload order, including failed attempts.
    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .iter()
            .map(|request| request.file_name.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<UploadRequest> {
        self.uploads.lock().clone()
    }

    fn file_for(&self, task_id: &str) -> Option<String> {
        self.tasks.lock().get(task_id).cloned()
    }
}

#[async_trait]
impl ResumeParsingService for ScriptedParser {
    async fn upload_file(&self, request: UploadRequest) -> bridge_traits::Result<UploadTicket> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.uploads.lock().push(request.clone());

        tokio::time::sleep(self.upload_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().contains(&request.file_name) {
            return Err(BridgeError::OperationFailed("connection reset".to_string()));
        }

        let task_id = format!("task-{}", self.next_task.fetch_add(1, Ordering::SeqCst));
        self.tasks
            .lock()
            .insert(task_id.clone(), request.file_name.clone());
        Ok(UploadTicket { task_id })
    }

    async fn get_task_status(&self, task_id: &str) -> bridge_traits::Result<TaskStatusReport> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        let file_name = self
            .file_for(task_id)
            .ok_or_else(|| BridgeError::Rejected {
                status: 404,
                message: format!("unknown task {}", task_id),
            })?;
        Ok(self
            .outcomes
            .lock()
            .get(&file_name)
            .cloned()
            .unwrap_or_else(|| TaskStatusReport::new(RemoteTaskStatus::Completed)))
    }

    async fn get_candidate_by_task(
        &self,
        task_id: &str,
    ) -> bridge_traits::Result<Option<CandidateRecord>> {
        Ok(self.file_for(task_id).map(|file_name| CandidateRecord {
            id: format!("c-{}", task_id),
            name: core_intake::extract_candidate_name(&file_name),
            ..Default::default()
        }))
    }
}

/// Duplicate lookup backed by a fixed set of existing candidates.
pub struct StaticLookup {
    existing: HashMap<String, String>,
    queries: AtomicUsize,
}

impl StaticLookup {
    pub fn with(candidates: &[(&str, &str)]) -> Self {
        Self {
            existing: candidates
                .iter()
                .map(|(name, id)| (name.to_string(), id.to_string()))
                .collect(),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DuplicateLookup for StaticLookup {
    async fn check_duplicate_by_name(&self, name: &str) -> bridge_traits::Result<DuplicateCheck> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(match self.existing.get(name) {
            Some(id) => DuplicateCheck {
                exists: true,
                candidates: vec![CandidateSummary {
                    id: id.clone(),
                    name: name.to_string(),
                }],
            },
            None => DuplicateCheck::default(),
        })
    }
}

#[derive(Default)]
pub struct InMemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl InMemorySettings {
    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> bridge_traits::Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> bridge_traits::Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> bridge_traits::Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> bridge_traits::Result<Vec<String>> {
        Ok(self.values.lock().keys().cloned().collect())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub struct Harness {
    pub uploader: BatchUploader,
    pub parser: Arc<ScriptedParser>,
    pub lookup: Arc<StaticLookup>,
    pub settings: Arc<InMemorySettings>,
    pub events: EventBus,
}

pub fn harness(parser: ScriptedParser, lookup: StaticLookup, config: UploadConfig) -> Harness {
    let parser = Arc::new(parser);
    let lookup = Arc::new(lookup);
    let settings = Arc::new(InMemorySettings::default());
    let events = EventBus::new(1024);

    let uploader = BatchUploader::new(
        IntakeDependencies {
            parsing_service: parser.clone(),
            duplicate_lookup: Some(lookup.clone()),
            settings_store: settings.clone(),
            clock: Arc::new(SystemClock),
            events: events.clone(),
        },
        config,
    )
    .expect("valid upload config");

    Harness {
        uploader,
        parser,
        lookup,
        settings,
        events,
    }
}

pub fn resume(name: &str) -> IncomingFile {
    IncomingFile::new(name, format!("%PDF-1.7 {}", name).into_bytes())
}
