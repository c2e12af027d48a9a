//! # Core Intake Module
//!
//! Batch upload orchestration for resume files.
//!
//! ## Overview
//!
//! This crate takes a list of resume files from the operator to a settled
//! outcome on the remote parsing backend:
//! - Validate files and track each one as an [`UploadItem`]
//! - Flag likely duplicates before upload ([`DuplicatePrecheck`])
//! - Drain the list with bounded concurrency, pause/resume and retry ([`BatchUploader`])
//! - Follow each accepted upload until parsing settles ([`TaskPoller`])
//! - Keep a bounded history of finished runs ([`BatchRunRecorder`])
//!
//! ## Item Lifecycle
//!
//! ```text
//! pending -> uploading -> success -> (parsed) success | duplicate | error
//!                      -> error -> (retry) pending
//! pending -> duplicate -> skipped | uploading
//! ```

pub mod categories;
pub mod config;
pub mod duplicate_payload;
pub mod error;
pub mod item;
pub mod name_extract;
pub mod poller;
pub mod precheck;
pub mod queue;
pub mod recorder;
pub mod store;

pub use categories::{CategoryLabels, CATEGORIES_KEY};
pub use config::{clamp_concurrency, PollerConfig, UploadConfig};
pub use duplicate_payload::{
    encode_duplicate_error_payload, parse_duplicate_error_payload, DUPLICATE_MARKER,
};
pub use error::{IntakeError, Result, ValidationError};
pub use item::{
    is_valid_file, validate_file, DuplicateInfo, IncomingFile, UploadItem, UploadItemId,
    UploadOutcome, UploadStatus, ALLOWED_EXTENSIONS, MAX_FILE_SIZE_BYTES,
};
pub use name_extract::extract_candidate_name;
pub use poller::{PollOutcome, TaskPoller};
pub use precheck::{DuplicatePrecheck, PrecheckSummary};
pub use queue::{AddFilesReport, BatchUploader, IntakeDependencies, RunReport};
pub use recorder::{BatchRun, BatchRunRecorder, FileOutcome, HISTORY_KEY};
pub use store::{ItemHandle, ItemStore, QueueCounts};
