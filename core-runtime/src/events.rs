//! # Event Bus System
//!
//! Event-driven notifications for the resume intake core, built on
//! `tokio::sync::broadcast`. The batch uploader and the duplicate pre-check
//! publish typed events here; the UI layer subscribes to render per-item
//! status changes and the aggregate notifications at the end of a run or a
//! pre-check pass.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   emit    ┌────────────┐   subscribe   ┌────────────┐
//! │ BatchUploader ├──────────>│            ├──────────────>│ UI layer   │
//! └───────────────┘           │  EventBus  │               └────────────┘
//! ┌───────────────┐   emit    │ (broadcast │   subscribe   ┌────────────┐
//! │ Pre-check     ├──────────>│  channel)  ├──────────────>│ Audit log  │
//! └───────────────┘           └────────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PrecheckEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Precheck(PrecheckEvent::Started { total: 3 }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Duplicate pre-check started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n` events.
//!   Non-fatal; item snapshots remain the source of truth.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Publishers ignore "no subscribers" errors: emitting never fails an operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// A 50-file batch produces roughly four status changes per file.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Batch upload lifecycle and per-item status changes
    Upload(UploadEvent),
    /// Duplicate pre-check progress
    Precheck(PrecheckEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Upload(e) => e.description(),
            CoreEvent::Precheck(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Upload(UploadEvent::RunCompleted { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Upload(UploadEvent::ItemStatusChanged { status, .. })
                if status == "error" =>
            {
                EventSeverity::Warning
            }
            CoreEvent::Upload(UploadEvent::RunCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Precheck(PrecheckEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Upload Events
// ============================================================================

/// Events emitted by the batch uploader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    /// A run began draining its backlog.
    RunStarted {
        run_id: String,
        /// Items seeded into the backlog.
        total: u64,
        /// Maximum simultaneous transfers for this run.
        concurrency_limit: u8,
    },
    /// One item changed status (including retries and phase-2 updates).
    ItemStatusChanged {
        item_id: String,
        name: String,
        /// Lowercase status name, e.g. `"uploading"`.
        status: String,
        message: Option<String>,
    },
    /// Dispatching stopped; in-flight transfers continue.
    RunPaused {
        run_id: String,
        /// Items still waiting in the backlog.
        remaining: u64,
    },
    /// Dispatching restarted against the remaining backlog.
    RunResumed { run_id: String, remaining: u64 },
    /// Backlog drained and no transfer is active.
    RunCompleted {
        run_id: String,
        total: u64,
        succeeded: u64,
        failed: u64,
        skipped: u64,
    },
}

impl UploadEvent {
    fn description(&self) -> &str {
        match self {
            UploadEvent::RunStarted { .. } => "Batch upload started",
            UploadEvent::ItemStatusChanged { .. } => "Upload item status changed",
            UploadEvent::RunPaused { .. } => "Batch upload paused",
            UploadEvent::RunResumed { .. } => "Batch upload resumed",
            UploadEvent::RunCompleted { .. } => "Batch upload completed",
        }
    }
}

// ============================================================================
// Pre-check Events
// ============================================================================

/// Events emitted by the duplicate pre-check pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PrecheckEvent {
    /// Pass started over `total` pending items.
    Started { total: u64 },
    /// Periodic progress update.
    Progress {
        checked: u64,
        total: u64,
        duplicates: u64,
    },
    /// Pass finished. Emitted exactly once per pass.
    Completed {
        checked: u64,
        duplicates: u64,
        /// Items whose filename yielded no candidate name.
        unnamed: u64,
        /// Lookups that failed and were skipped.
        lookup_failures: u64,
    },
}

impl PrecheckEvent {
    fn description(&self) -> &str {
        match self {
            PrecheckEvent::Started { .. } => "Duplicate pre-check started",
            PrecheckEvent::Progress { .. } => "Duplicate pre-check in progress",
            PrecheckEvent::Completed { .. } => "Duplicate pre-check completed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// `capacity` is the number of events buffered per subscriber before it
    /// starts receiving `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let uploads_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Upload(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. Returns `None` when nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
