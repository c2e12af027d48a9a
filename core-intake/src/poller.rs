//! # Task Status Poller
//!
//! Follows one accepted upload until the backend settles its parse task.
//!
//! Each watch is an independent tokio task: it waits a grace period, then
//! queries the task status on a fixed interval with a bounded attempt budget.
//! Transient query failures consume an attempt and are otherwise ignored.
//! Running out of attempts never fails the item; it only annotates the message.
//!
//! Watches are tracked by a [`TaskTracker`] so a host can wait for every
//! outstanding poll to settle (`wait_idle`).

use bridge_traits::{CandidateRecord, RemoteTaskStatus, ResumeParsingService, TaskStatusReport};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::config::PollerConfig;
use crate::duplicate_payload::parse_duplicate_error_payload;
use crate::error::{IntakeError, Result};
use crate::item::{DuplicateInfo, UploadItem, UploadStatus};
use crate::store::ItemHandle;

const UNKNOWN_CANDIDATE_MESSAGE: &str = "Parsed (candidate name unknown)";
const GENERIC_DUPLICATE_MESSAGE: &str = "Duplicate candidate detected";
const GENERIC_FAILURE_MESSAGE: &str = "Remote parsing failed";

/// How a watch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Parsing completed; the item stays `success`.
    Parsed { candidate_name: Option<String> },
    /// The backend recognised an existing candidate.
    Duplicate(Option<DuplicateInfo>),
    /// The backend failed to parse the file.
    Failed(String),
    /// Attempt budget exhausted; the item keeps its status.
    TimedOut { attempts: u32 },
    /// The item was removed or moved on to another attempt.
    Abandoned,
}

pub struct TaskPoller {
    service: Arc<dyn ResumeParsingService>,
    config: PollerConfig,
    tracker: TaskTracker,
}

impl TaskPoller {
    pub fn new(service: Arc<dyn ResumeParsingService>, config: PollerConfig) -> Self {
        Self {
            service,
            config,
            tracker: TaskTracker::new(),
        }
    }

    /// Start following `task_id` for the item behind `handle`.
    ///
    /// The returned handle may be dropped; the watch keeps running.
    pub fn watch(&self, handle: ItemHandle, task_id: String) -> JoinHandle<PollOutcome> {
        let service = Arc::clone(&self.service);
        let config = self.config.clone();
        debug!(item_id = %handle.id(), task_id = %task_id, "Starting status watch");
        self.tracker
            .spawn(async move { poll_task(service, config, handle, task_id).await })
    }

    /// Watches that have not settled yet.
    pub fn active_watches(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every outstanding watch has settled.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

#[instrument(skip(service, config, handle), fields(item_id = %handle.id()))]
async fn poll_task(
    service: Arc<dyn ResumeParsingService>,
    config: PollerConfig,
    handle: ItemHandle,
    task_id: String,
) -> PollOutcome {
    sleep(config.initial_delay).await;

    for attempt in 1..=config.max_attempts {
        if handle.get().is_none() {
            debug!(task_id = %task_id, "Item removed, stopping watch");
            return PollOutcome::Abandoned;
        }

        match service.get_task_status(&task_id).await {
            Ok(report) => {
                if let Some(outcome) = settle(service.as_ref(), &handle, &task_id, report).await {
                    return outcome;
                }
                debug!(attempt, "Task still in flight");
            }
            Err(e) => {
                warn!(attempt, task_id = %task_id, error = %e, "Status query failed");
            }
        }

        if attempt < config.max_attempts {
            sleep(config.interval).await;
        }
    }

    let attempts = config.max_attempts;
    let note = IntakeError::PollTimeout { attempts }.to_string();
    warn!(task_id = %task_id, attempts, "Giving up on status polling");
    apply(&handle, &task_id, PollOutcome::TimedOut { attempts }, |item| {
        item.annotate(&note);
        Ok(())
    })
}

async fn settle(
    service: &dyn ResumeParsingService,
    handle: &ItemHandle,
    task_id: &str,
    report: TaskStatusReport,
) -> Option<PollOutcome> {
    let outcome = match report.status {
        RemoteTaskStatus::Uploaded | RemoteTaskStatus::Parsing => return None,
        RemoteTaskStatus::Completed => {
            let fetched = match service.get_candidate_by_task(task_id).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "Candidate fetch failed");
                    None
                }
            };
            let candidate_name = fetched
                .as_ref()
                .and_then(CandidateRecord::display_name)
                .or_else(|| report.result.as_ref().and_then(CandidateRecord::display_name))
                .map(str::to_string);

            let message = match &candidate_name {
                Some(name) => format!("Parsed: {}", name),
                None => UNKNOWN_CANDIDATE_MESSAGE.to_string(),
            };
            info!(task_id = %task_id, "Parse task completed");
            apply(handle, task_id, PollOutcome::Parsed { candidate_name }, |item| {
                item.mark_parsed(message)
            })
        }
        RemoteTaskStatus::Duplicate => {
            let info = report.error.as_deref().and_then(parse_duplicate_error_payload);
            let message = match &info {
                Some(info) => IntakeError::DuplicateDetected {
                    candidate_id: info.candidate_id.clone(),
                    candidate_name: info.candidate_name.clone(),
                }
                .to_string(),
                None => GENERIC_DUPLICATE_MESSAGE.to_string(),
            };
            info!(task_id = %task_id, decoded = info.is_some(), "Parse task reported a duplicate");
            apply(handle, task_id, PollOutcome::Duplicate(info.clone()), |item| {
                item.mark_duplicate(info, message)
            })
        }
        RemoteTaskStatus::Failed => {
            let message = report
                .error
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(|text| IntakeError::RemoteProcessing(text.to_string()).to_string())
                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
            warn!(task_id = %task_id, "Parse task failed");
            apply(handle, task_id, PollOutcome::Failed(message.clone()), |item| {
                item.mark_remote_failed(message)
            })
        }
    };
    Some(outcome)
}

/// Write a settled result, unless the item has moved on since the upload.
fn apply<F>(handle: &ItemHandle, task_id: &str, outcome: PollOutcome, f: F) -> PollOutcome
where
    F: FnOnce(&mut UploadItem) -> Result<()>,
{
    let result = handle.update(|item| {
        if item.remote_task_id.as_deref() != Some(task_id) || item.status != UploadStatus::Success
        {
            return Ok(false);
        }
        f(item)?;
        Ok(true)
    });

    match result {
        Ok(true) => outcome,
        Ok(false) => {
            debug!(task_id = %task_id, "Item moved on, dropping poll result");
            PollOutcome::Abandoned
        }
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "Could not record poll result");
            PollOutcome::Abandoned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicate_payload::encode_duplicate_error_payload;
    use crate::item::{IncomingFile, UploadItemId};
    use crate::store::ItemStore;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, UploadRequest, UploadTicket};
    use core_runtime::events::EventBus;
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        pub Parser {}

        #[async_trait]
        impl ResumeParsingService for Parser {
            async fn upload_file(&self, request: UploadRequest) -> bridge_traits::Result<UploadTicket>;
            async fn get_task_status(&self, task_id: &str) -> bridge_traits::Result<TaskStatusReport>;
            async fn get_candidate_by_task(&self, task_id: &str) -> bridge_traits::Result<Option<CandidateRecord>>;
        }
    }

    fn accepted_item(task_id: &str) -> (ItemStore, UploadItemId) {
        let store = ItemStore::new(EventBus::new(64));
        let id = store.push(UploadItem::new(IncomingFile::new("张三_简历.pdf", vec![1u8; 32])));
        store
            .update(id, |item| {
                item.begin_upload()?;
                item.mark_accepted(task_id)
            })
            .unwrap();
        (store, id)
    }

    /// Reports `parsing` for the first `in_flight` queries, then `settled`.
    fn settles_after(parser: &mut MockParser, in_flight: usize, settled: TaskStatusReport) {
        let calls = AtomicUsize::new(0);
        parser.expect_get_task_status().returning(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < in_flight {
                Ok(TaskStatusReport::new(RemoteTaskStatus::Parsing))
            } else {
                Ok(settled.clone())
            }
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_exactly_sixty_queries() {
        let mut parser = MockParser::new();
        parser
            .expect_get_task_status()
            .times(60)
            .returning(|_| Ok(TaskStatusReport::new(RemoteTaskStatus::Parsing)));
        parser.expect_get_candidate_by_task().never();

        let (store, id) = accepted_item("task-1");
        let poller = TaskPoller::new(Arc::new(parser), PollerConfig::default());

        let started = tokio::time::Instant::now();
        let outcome = poller.watch(store.handle(id), "task-1".to_string()).await.unwrap();

        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 60 });
        // 2 s grace plus 59 intervals of 3 s
        assert_eq!(started.elapsed().as_secs(), 179);

        let item = store.get(id).unwrap();
        assert_eq!(item.status, UploadStatus::Success);
        assert!(item
            .message
            .unwrap()
            .ends_with("; status polling timed out after 60 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_with_candidate() {
        let mut parser = MockParser::new();
        settles_after(&mut parser, 2, TaskStatusReport::new(RemoteTaskStatus::Completed));
        parser.expect_get_candidate_by_task().times(1).returning(|_| {
            Ok(Some(CandidateRecord {
                id: "c-1".to_string(),
                name: Some("张三".to_string()),
                ..Default::default()
            }))
        });

        let (store, id) = accepted_item("task-2");
        let poller = TaskPoller::new(Arc::new(parser), PollerConfig::default());
        let outcome = poller.watch(store.handle(id), "task-2".to_string()).await.unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Parsed {
                candidate_name: Some("张三".to_string())
            }
        );
        let item = store.get(id).unwrap();
        assert_eq!(item.status, UploadStatus::Success);
        assert_eq!(item.message.as_deref(), Some("Parsed: 张三"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_falls_back_to_inline_record() {
        let mut parser = MockParser::new();
        settles_after(
            &mut parser,
            0,
            TaskStatusReport::new(RemoteTaskStatus::Completed).with_result(CandidateRecord {
                id: "c-2".to_string(),
                name: Some("李四".to_string()),
                ..Default::default()
            }),
        );
        parser
            .expect_get_candidate_by_task()
            .returning(|_| Err(BridgeError::OperationFailed("502".to_string())));

        let (store, id) = accepted_item("task-3");
        let poller = TaskPoller::new(Arc::new(parser), PollerConfig::default());
        poller.watch(store.handle(id), "task-3".to_string()).await.unwrap();

        assert_eq!(store.get(id).unwrap().message.as_deref(), Some("Parsed: 李四"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_without_any_name() {
        let mut parser = MockParser::new();
        settles_after(&mut parser, 0, TaskStatusReport::new(RemoteTaskStatus::Completed));
        parser.expect_get_candidate_by_task().returning(|_| Ok(None));

        let (store, id) = accepted_item("task-4");
        let poller = TaskPoller::new(Arc::new(parser), PollerConfig::default());
        let outcome = poller.watch(store.handle(id), "task-4".to_string()).await.unwrap();

        assert_eq!(outcome, PollOutcome::Parsed { candidate_name: None });
        assert_eq!(
            store.get(id).unwrap().message.as_deref(),
            Some("Parsed (candidate name unknown)")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_payload_is_decoded() {
        let existing = DuplicateInfo {
            candidate_id: "c-77".to_string(),
            candidate_name: "王五".to_string(),
            candidate_phone: Some("13800001234".to_string()),
            candidate_email: None,
        };
        let mut parser = MockParser::new();
        settles_after(
            &mut parser,
            1,
            TaskStatusReport::new(RemoteTaskStatus::Duplicate).with_error(format!(
                "Candidate exists: {}",
                encode_duplicate_error_payload(&existing)
            )),
        );

        let (store, id) = accepted_item("task-5");
        let poller = TaskPoller::new(Arc::new(parser), PollerConfig::default());
        let outcome = poller.watch(store.handle(id), "task-5".to_string()).await.unwrap();

        assert_eq!(outcome, PollOutcome::Duplicate(Some(existing.clone())));
        let item = store.get(id).unwrap();
        assert_eq!(item.status, UploadStatus::Duplicate);
        assert_eq!(item.duplicate_info, Some(existing));
        assert!(item.message.unwrap().contains("王五"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_duplicate_uses_generic_message() {
        let mut parser = MockParser::new();
        settles_after(
            &mut parser,
            0,
            TaskStatusReport::new(RemoteTaskStatus::Duplicate).with_error("already exists"),
        );

        let (store, id) = accepted_item("task-6");
        let poller = TaskPoller::new(Arc::new(parser), PollerConfig::default());
        poller.watch(store.handle(id), "task-6".to_string()).await.unwrap();

        let item = store.get(id).unwrap();
        assert_eq!(item.status, UploadStatus::Duplicate);
        assert_eq!(item.duplicate_info, None);
        assert_eq!(item.message.as_deref(), Some("Duplicate candidate detected"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_task_marks_error() {
        let mut parser = MockParser::new();
        settles_after(
            &mut parser,
            3,
            TaskStatusReport::new(RemoteTaskStatus::Failed).with_error("corrupt document"),
        );

        let (store, id) = accepted_item("task-7");
        let poller = TaskPoller::new(Arc::new(parser), PollerConfig::default());
        poller.watch(store.handle(id), "task-7".to_string()).await.unwrap();

        let item = store.get(id).unwrap();
        assert_eq!(item.status, UploadStatus::Error);
        assert_eq!(
            item.message.as_deref(),
            Some("Remote parsing failed: corrupt document")
        );
        assert_eq!(item.remote_task_id.as_deref(), Some("task-7"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_task_without_text() {
        let mut parser = MockParser::new();
        settles_after(&mut parser, 0, TaskStatusReport::new(RemoteTaskStatus::Failed));

        let (store, id) = accepted_item("task-8");
        let poller = TaskPoller::new(Arc::new(parser), PollerConfig::default());
        poller.watch(store.handle(id), "task-8".to_string()).await.unwrap();

        assert_eq!(
            store.get(id).unwrap().message.as_deref(),
            Some("Remote parsing failed")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_failures_consume_attempts() {
        let mut parser = MockParser::new();
        parser
            .expect_get_task_status()
            .times(3)
            .returning(|_| Err(BridgeError::OperationFailed("connection reset".to_string())));

        let (store, id) = accepted_item("task-9");
        let poller = TaskPoller::new(
            Arc::new(parser),
            PollerConfig::default().with_max_attempts(3),
        );
        let outcome = poller.watch(store.handle(id), "task-9".to_string()).await.unwrap();

        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 3 });
        assert_eq!(store.get(id).unwrap().status, UploadStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_task_result_is_dropped() {
        let mut parser = MockParser::new();
        settles_after(
            &mut parser,
            0,
            TaskStatusReport::new(RemoteTaskStatus::Failed).with_error("boom"),
        );

        let (store, id) = accepted_item("task-new");
        let poller = TaskPoller::new(Arc::new(parser), PollerConfig::default());
        let outcome = poller.watch(store.handle(id), "task-old".to_string()).await.unwrap();

        assert_eq!(outcome, PollOutcome::Abandoned);
        assert_eq!(store.get(id).unwrap().status, UploadStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_item_stops_the_watch() {
        let mut parser = MockParser::new();
        parser.expect_get_task_status().never();

        let (store, id) = accepted_item("task-10");
        let poller = TaskPoller::new(Arc::new(parser), PollerConfig::default());
        let watch = poller.watch(store.handle(id), "task-10".to_string());
        store.remove(id);

        assert_eq!(watch.await.unwrap(), PollOutcome::Abandoned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_idle_covers_detached_watches() {
        let mut parser = MockParser::new();
        settles_after(&mut parser, 4, TaskStatusReport::new(RemoteTaskStatus::Completed));
        parser.expect_get_candidate_by_task().returning(|_| Ok(None));

        let (store, id) = accepted_item("task-11");
        let poller = TaskPoller::new(Arc::new(parser), PollerConfig::default());
        drop(poller.watch(store.handle(id), "task-11".to_string()));
        assert_eq!(poller.active_watches(), 1);

        poller.wait_idle().await;
        assert_eq!(poller.active_watches(), 0);
        assert_eq!(
            store.get(id).unwrap().message.as_deref(),
            Some("Parsed (candidate name unknown)")
        );
    }
}
