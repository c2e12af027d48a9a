//! # Upload Items
//!
//! One submitted resume and its journey from selection to a settled outcome.
//!
//! ## Lifecycle
//!
//! ```text
//! pending ──dispatch──> uploading ──accepted──> success ──poller──> success | duplicate | error
//!    │                      └──────rejected──> error ──retry──> pending
//!    └──precheck──> duplicate ──skip──> skipped
//!                      │   └──dispatch──> uploading
//!                      └──force upload──> pending (force_create)
//! ```
//!
//! `success` is two-phase: it means the backend accepted the file, and the
//! poller may still move it to `duplicate` or `error` once parsing settles.
//! [`UploadOutcome`] keeps the phase-1 result so run statistics stay fixed.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

use crate::error::{IntakeError, Result, ValidationError};

/// Hard ceiling on resume size (10 MiB).
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Accepted file extensions, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt"];

/// MIME families that are never resumes, whatever the extension claims.
const REJECTED_MIME_FAMILIES: &[&str] = &["image/", "audio/", "video/"];

/// Type-safe upload item identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadItemId(Uuid);

impl UploadItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| IntakeError::InvalidItemId(e.to_string()))
    }
}

impl Default for UploadItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upload item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Waiting in the list for a run
    Pending,
    /// Transfer in flight
    Uploading,
    /// Accepted by the backend; parsing may still be settling
    Success,
    /// Rejected by the backend or failed during parsing
    Error,
    /// Likely duplicate of an existing candidate
    Duplicate,
    /// Duplicate that a run skipped
    Skipped,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Success => "success",
            Self::Error => "error",
            Self::Duplicate => "duplicate",
            Self::Skipped => "skipped",
        }
    }

    /// No further automatic transition happens without operator action.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Skipped)
    }

    /// Seeded into a run's backlog.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Pending | Self::Duplicate)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UploadStatus {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "uploading" => Ok(Self::Uploading),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "duplicate" => Ok(Self::Duplicate),
            "skipped" => Ok(Self::Skipped),
            _ => Err(IntakeError::InvalidStatus(s.to_string())),
        }
    }
}

/// Phase-1 result of the latest upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadOutcome {
    Accepted,
    Rejected,
}

/// Existing candidate an item probably duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateInfo {
    pub candidate_id: String,
    pub candidate_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_email: Option<String>,
}

impl DuplicateInfo {
    pub fn new(candidate_id: impl Into<String>, candidate_name: impl Into<String>) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            candidate_name: candidate_name.into(),
            candidate_phone: None,
            candidate_email: None,
        }
    }
}

/// A file picked by the operator, before validation.
#[derive(Clone)]
pub struct IncomingFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub payload: Bytes,
    pub category: Option<String>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            payload: payload.into(),
            category: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn size_bytes(&self) -> u64 {
        self.payload.len() as u64
    }
}

impl fmt::Debug for IncomingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.size_bytes())
            .field("category", &self.category)
            .finish()
    }
}

/// Check a file against the intake rules.
///
/// The claimed MIME type never makes a file acceptable. It can only disqualify
/// one (image, audio and video types).
pub fn validate_file(
    name: &str,
    mime_type: Option<&str>,
    size_bytes: u64,
) -> std::result::Result<(), ValidationError> {
    validate_file_with_limit(name, mime_type, size_bytes, MAX_FILE_SIZE_BYTES)
}

/// [`validate_file`] against a configured size ceiling.
pub fn validate_file_with_limit(
    name: &str,
    mime_type: Option<&str>,
    size_bytes: u64,
    limit_bytes: u64,
) -> std::result::Result<(), ValidationError> {
    let extension_ok = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false);

    let mime_rejected = mime_type
        .map(|mime| mime.trim().to_ascii_lowercase())
        .map(|mime| {
            REJECTED_MIME_FAMILIES
                .iter()
                .any(|family| mime.starts_with(family))
        })
        .unwrap_or(false);

    if !extension_ok || mime_rejected {
        return Err(ValidationError::UnsupportedFileType {
            name: name.to_string(),
        });
    }

    if size_bytes == 0 {
        return Err(ValidationError::EmptyFile {
            name: name.to_string(),
        });
    }

    if size_bytes > limit_bytes {
        return Err(ValidationError::FileTooLarge {
            name: name.to_string(),
            size_bytes,
            limit_bytes,
        });
    }

    Ok(())
}

/// Whether a file may become an upload item.
pub fn is_valid_file(name: &str, mime_type: Option<&str>, size_bytes: u64) -> bool {
    validate_file(name, mime_type, size_bytes).is_ok()
}

/// One resume in the batch.
#[derive(Clone)]
pub struct UploadItem {
    pub id: UploadItemId,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: Option<String>,
    pub payload: Bytes,
    pub category: Option<String>,
    pub status: UploadStatus,
    /// 0-100, meaningful while `uploading`
    pub progress_percent: u8,
    /// Correlation key for status polling; never cleared
    pub remote_task_id: Option<String>,
    pub message: Option<String>,
    pub duplicate_info: Option<DuplicateInfo>,
    pub upload_outcome: Option<UploadOutcome>,
    /// Ask the backend to create a record even for a suspected duplicate
    pub force_create: bool,
}

impl fmt::Debug for UploadItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadItem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size_bytes", &self.size_bytes)
            .field("status", &self.status)
            .field("progress_percent", &self.progress_percent)
            .field("remote_task_id", &self.remote_task_id)
            .field("message", &self.message)
            .field("duplicate_info", &self.duplicate_info)
            .finish()
    }
}

impl UploadItem {
    /// Create a pending item. Validation is the caller's job.
    pub fn new(file: IncomingFile) -> Self {
        Self {
            id: UploadItemId::new(),
            size_bytes: file.size_bytes(),
            name: file.name,
            mime_type: file.mime_type,
            payload: file.payload,
            category: file.category,
            status: UploadStatus::Pending,
            progress_percent: 0,
            remote_task_id: None,
            message: None,
            duplicate_info: None,
            upload_outcome: None,
            force_create: false,
        }
    }

    /// `pending | duplicate -> uploading`. Starts a fresh attempt.
    pub fn begin_upload(&mut self) -> Result<()> {
        self.validate_transition(UploadStatus::Uploading)?;
        self.status = UploadStatus::Uploading;
        self.progress_percent = 0;
        self.message = None;
        self.upload_outcome = None;
        Ok(())
    }

    /// Raise synthetic progress by `step`, never past `cap` and never backwards.
    pub fn advance_progress(&mut self, step: u8, cap: u8) {
        if self.status != UploadStatus::Uploading {
            return;
        }
        let next = self.progress_percent.saturating_add(step).min(cap);
        self.progress_percent = self.progress_percent.max(next);
    }

    /// `uploading -> success`: phase 1 accepted.
    pub fn mark_accepted(&mut self, task_id: impl Into<String>) -> Result<()> {
        self.validate_transition(UploadStatus::Success)?;
        self.status = UploadStatus::Success;
        self.progress_percent = 100;
        self.remote_task_id = Some(task_id.into());
        self.upload_outcome = Some(UploadOutcome::Accepted);
        self.message = Some("Uploaded, waiting for parsing".to_string());
        Ok(())
    }

    /// `uploading -> error`: phase 1 rejected.
    pub fn mark_rejected(&mut self, message: impl Into<String>) -> Result<()> {
        self.validate_transition(UploadStatus::Error)?;
        self.status = UploadStatus::Error;
        self.upload_outcome = Some(UploadOutcome::Rejected);
        self.message = Some(message.into());
        Ok(())
    }

    /// Parsing finished; the item stays `success` with a new message.
    pub fn mark_parsed(&mut self, message: impl Into<String>) -> Result<()> {
        self.validate_transition(UploadStatus::Success)?;
        self.message = Some(message.into());
        Ok(())
    }

    /// `success -> error`: the backend failed to parse an accepted file.
    pub fn mark_remote_failed(&mut self, message: impl Into<String>) -> Result<()> {
        self.validate_transition(UploadStatus::Error)?;
        self.status = UploadStatus::Error;
        self.message = Some(message.into());
        Ok(())
    }

    /// `pending | success -> duplicate`, from the pre-check or the poller.
    pub fn mark_duplicate(
        &mut self,
        info: Option<DuplicateInfo>,
        message: impl Into<String>,
    ) -> Result<()> {
        self.validate_transition(UploadStatus::Duplicate)?;
        self.status = UploadStatus::Duplicate;
        self.duplicate_info = info;
        self.message = Some(message.into());
        Ok(())
    }

    /// `duplicate -> skipped`.
    pub fn skip(&mut self) -> Result<()> {
        self.validate_transition(UploadStatus::Skipped)?;
        self.status = UploadStatus::Skipped;
        self.message = Some("Skipped: likely duplicate".to_string());
        Ok(())
    }

    /// `error -> pending`. The next dispatch is a fresh attempt.
    pub fn reset_for_retry(&mut self) -> Result<()> {
        if self.status != UploadStatus::Error {
            return Err(self.transition_error(UploadStatus::Pending, "only failed items can be retried"));
        }
        self.status = UploadStatus::Pending;
        self.progress_percent = 0;
        self.message = None;
        self.upload_outcome = None;
        Ok(())
    }

    /// `duplicate | skipped -> pending`, asking the backend to create the record anyway.
    pub fn force(&mut self) -> Result<()> {
        if !matches!(self.status, UploadStatus::Duplicate | UploadStatus::Skipped) {
            return Err(self.transition_error(
                UploadStatus::Pending,
                "only duplicates can be force-uploaded",
            ));
        }
        self.status = UploadStatus::Pending;
        self.force_create = true;
        self.progress_percent = 0;
        self.message = None;
        self.upload_outcome = None;
        Ok(())
    }

    /// Append a note to the current message without touching the status.
    pub fn annotate(&mut self, note: &str) {
        self.message = Some(match self.message.take() {
            Some(message) if !message.is_empty() => format!("{}; {}", message, note),
            _ => note.to_string(),
        });
    }

    /// Whether the category may still change.
    pub fn category_editable(&self) -> bool {
        !matches!(self.status, UploadStatus::Uploading | UploadStatus::Success)
    }

    fn validate_transition(&self, to: UploadStatus) -> Result<()> {
        let valid = match (self.status, to) {
            // Dispatch
            (UploadStatus::Pending, UploadStatus::Uploading) => true,
            (UploadStatus::Duplicate, UploadStatus::Uploading) => true,

            // Phase 1
            (UploadStatus::Uploading, UploadStatus::Success) => true,
            (UploadStatus::Uploading, UploadStatus::Error) => true,

            // Phase 2
            (UploadStatus::Success, UploadStatus::Success) => true,
            (UploadStatus::Success, UploadStatus::Duplicate) => true,
            (UploadStatus::Success, UploadStatus::Error) => true,

            // Pre-check and skip
            (UploadStatus::Pending, UploadStatus::Duplicate) => true,
            (UploadStatus::Duplicate, UploadStatus::Skipped) => true,

            _ => false,
        };

        if !valid {
            return Err(self.transition_error(
                to,
                &format!("Cannot transition from {} to {}", self.status, to),
            ));
        }

        Ok(())
    }

    fn transition_error(&self, to: UploadStatus, reason: &str) -> IntakeError {
        IntakeError::InvalidStateTransition {
            from: self.status.as_str().to_string(),
            to: to.as_str().to_string(),
            reason: reason.to_string(),
        }
    }
}
