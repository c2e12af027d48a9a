//! Resume API response types
//!
//! Data structures for deserializing the parsing backend's JSON responses.
//! Identifiers may arrive as strings or numbers; both are kept as strings.

use bridge_traits::{
    CandidateRecord, CandidateSummary, DuplicateCheck, RemoteTaskStatus, TaskStatusReport,
};
use serde::{Deserialize, Deserializer};

/// `POST /api/v1/resumes/upload`
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    #[serde(alias = "taskId", deserialize_with = "string_or_number")]
    pub task_id: String,
}

/// Candidate resource
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateResource {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<CandidateResource> for CandidateRecord {
    fn from(resource: CandidateResource) -> Self {
        CandidateRecord {
            id: resource.id,
            name: resource.name,
            phone: resource.phone,
            email: resource.email,
        }
    }
}

/// `GET /api/v1/resumes/tasks/{id}`
#[derive(Debug, Deserialize)]
pub struct TaskStatusResponse {
    pub status: RemoteTaskStatus,
    #[serde(default, alias = "error_message")]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<CandidateResource>,
}

impl From<TaskStatusResponse> for TaskStatusReport {
    fn from(response: TaskStatusResponse) -> Self {
        TaskStatusReport {
            status: response.status,
            error: response.error,
            result: response.result.map(CandidateRecord::from),
        }
    }
}

/// Entry in a duplicate check response
#[derive(Debug, Deserialize)]
pub struct DuplicateCandidate {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

/// `GET /api/v1/candidates/check-duplicate`
#[derive(Debug, Deserialize)]
pub struct DuplicateCheckResponse {
    pub exists: bool,
    #[serde(default)]
    pub candidates: Vec<DuplicateCandidate>,
}

impl From<DuplicateCheckResponse> for DuplicateCheck {
    fn from(response: DuplicateCheckResponse) -> Self {
        DuplicateCheck {
            exists: response.exists,
            candidates: response
                .candidates
                .into_iter()
                .map(|candidate| CandidateSummary {
                    id: candidate.id,
                    name: candidate.name,
                })
                .collect(),
        }
    }
}

/// Error body returned with non-success statuses
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.detail.or(self.message)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ids_become_strings() {
        let response: UploadResponse = serde_json::from_str(r#"{"taskId": 981}"#).unwrap();
        assert_eq!(response.task_id, "981");

        let response: DuplicateCheckResponse = serde_json::from_str(
            r#"{"exists": true, "candidates": [{"id": 12, "name": "张三"}]}"#,
        )
        .unwrap();
        let check = DuplicateCheck::from(response);
        assert_eq!(check.best_match().map(|c| c.id.as_str()), Some("12"));
    }

    #[test]
    fn test_task_status_conversion() {
        let response: TaskStatusResponse = serde_json::from_str(
            r#"{"status": "completed", "result": {"id": "c-1", "name": "李四", "email": "li@example.com"}}"#,
        )
        .unwrap();
        let report = TaskStatusReport::from(response);

        assert_eq!(report.status, RemoteTaskStatus::Completed);
        let result = report.result.unwrap();
        assert_eq!(result.display_name(), Some("李四"));
        assert_eq!(result.email.as_deref(), Some("li@example.com"));
    }

    #[test]
    fn test_error_body_prefers_detail() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail": "unsupported", "message": "bad"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("unsupported"));
    }
}
