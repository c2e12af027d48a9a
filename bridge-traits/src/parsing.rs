//! Resume Parsing Backend Abstractions
//!
//! The remote parsing service accepts a resume upload, hands back a task id,
//! and exposes the task's progress for polling. A separate lookup answers
//! whether a candidate with a given name already exists.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// One resume submission.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub payload: Bytes,
    pub category: Option<String>,
    /// Ask the backend to create a record even if it believes the candidate exists.
    pub force_create: bool,
}

/// Receipt for an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTicket {
    pub task_id: String,
}

/// Remote parse task state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteTaskStatus {
    Uploaded,
    Parsing,
    Completed,
    Failed,
    Duplicate,
}

impl RemoteTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteTaskStatus::Uploaded => "uploaded",
            RemoteTaskStatus::Parsing => "parsing",
            RemoteTaskStatus::Completed => "completed",
            RemoteTaskStatus::Failed => "failed",
            RemoteTaskStatus::Duplicate => "duplicate",
        }
    }

    /// Whether the backend is still working on the task.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RemoteTaskStatus::Uploaded | RemoteTaskStatus::Parsing)
    }
}

impl fmt::Display for RemoteTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured candidate produced by a successful parse.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl CandidateRecord {
    /// Non-blank candidate name, if the parser resolved one.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Snapshot of a remote parse task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusReport {
    pub status: RemoteTaskStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<CandidateRecord>,
}

impl TaskStatusReport {
    pub fn new(status: RemoteTaskStatus) -> Self {
        Self {
            status,
            error: None,
            result: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_result(mut self, result: CandidateRecord) -> Self {
        self.result = Some(result);
        self
    }
}

/// Existing candidate returned by a duplicate lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub id: String,
    pub name: String,
}

/// Answer to "does a candidate with this name exist?"
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DuplicateCheck {
    pub exists: bool,
    #[serde(default)]
    pub candidates: Vec<CandidateSummary>,
}

impl DuplicateCheck {
    /// First matching candidate, only when the backend reported a match.
    pub fn best_match(&self) -> Option<&CandidateSummary> {
        if self.exists {
            self.candidates.first()
        } else {
            None
        }
    }
}

/// Remote resume parsing backend
///
/// Uploads are fire-once: implementations must not resubmit a payload on
/// their own, since the backend may already have created a task for it.
#[async_trait]
pub trait ResumeParsingService: Send + Sync {
    /// Submit one resume for parsing.
    ///
    /// # Errors
    ///
    /// Returns an error when the transfer fails or the backend rejects the file.
    async fn upload_file(&self, request: UploadRequest) -> Result<UploadTicket>;

    /// Fetch the current state of a parse task.
    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusReport>;

    /// Fetch the candidate created by a completed task, if any.
    async fn get_candidate_by_task(&self, task_id: &str) -> Result<Option<CandidateRecord>>;
}

/// Name-based candidate lookup used before uploading.
#[async_trait]
pub trait DuplicateLookup: Send + Sync {
    async fn check_duplicate_by_name(&self, name: &str) -> Result<DuplicateCheck>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_wire_format() {
        let report: TaskStatusReport =
            serde_json::from_str(r#"{"status":"parsing"}"#).unwrap();
        assert_eq!(report.status, RemoteTaskStatus::Parsing);
        assert!(report.status.is_in_flight());
        assert!(report.error.is_none());

        let report: TaskStatusReport = serde_json::from_str(
            r#"{"status":"completed","result":{"id":"c-1","name":"李四"}}"#,
        )
        .unwrap();
        assert!(!report.status.is_in_flight());
        assert_eq!(
            report.result.as_ref().and_then(CandidateRecord::display_name),
            Some("李四")
        );
    }

    #[test]
    fn test_blank_name_is_not_displayed() {
        let record = CandidateRecord {
            id: "c-2".to_string(),
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(record.display_name(), None);
    }

    #[test]
    fn test_best_match_requires_exists_flag() {
        let candidate = CandidateSummary {
            id: "c-9".to_string(),
            name: "张三".to_string(),
        };
        let negative = DuplicateCheck {
            exists: false,
            candidates: vec![candidate.clone()],
        };
        let positive = DuplicateCheck {
            exists: true,
            candidates: vec![candidate.clone()],
        };

        assert_eq!(negative.best_match(), None);
        assert_eq!(positive.best_match(), Some(&candidate));
    }
}
