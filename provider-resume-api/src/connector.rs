//! Resume parsing API connector implementation
//!
//! Implements `ResumeParsingService` and `DuplicateLookup` over the parsing
//! backend's REST API.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::parsing::{
    CandidateRecord, DuplicateCheck, DuplicateLookup, ResumeParsingService, TaskStatusReport,
    UploadRequest, UploadTicket,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::ResumeApiError;
use crate::types::{
    CandidateResource, DuplicateCheckResponse, ErrorBody, TaskStatusResponse, UploadResponse,
};

const UPLOAD_PATH: &str = "/api/v1/resumes/upload";
const TASKS_PATH: &str = "/api/v1/resumes/tasks";
const DUPLICATE_CHECK_PATH: &str = "/api/v1/candidates/check-duplicate";

/// Header carrying the percent-encoded original file name
pub const FILE_NAME_HEADER: &str = "X-File-Name";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Longest error body echoed back into an error message
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Resume parsing API connector
///
/// # Example
///
/// ```ignore
/// use provider_resume_api::ResumeApiConnector;
///
/// let connector = ResumeApiConnector::new(http_client, "https://parser.example.com")?
///     .with_api_token("token");
/// let ticket = connector.upload_file(request).await?;
/// ```
pub struct ResumeApiConnector {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    api_token: Option<String>,
    request_timeout: Duration,
    upload_timeout: Duration,
    read_policy: RetryPolicy,
}

impl ResumeApiConnector {
    /// Create a connector rooted at `base_url` (scheme and host, no trailing path).
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
    ) -> std::result::Result<Self, ResumeApiError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ResumeApiError::InvalidConfig(format!(
                "base URL must be http(s): '{}'",
                base_url
            )));
        }

        Ok(Self {
            http_client,
            base_url,
            api_token: None,
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(120),
            read_policy: RetryPolicy::default(),
        })
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_timeouts(mut self, request: Duration, upload: Duration) -> Self {
        self.request_timeout = request;
        self.upload_timeout = upload;
        self
    }

    /// Retry policy for idempotent reads (status, candidate, duplicate lookups).
    pub fn with_read_policy(mut self, policy: RetryPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: HttpRequest) -> HttpRequest {
        let request = request.header("Accept", "application/json");
        match &self.api_token {
            Some(token) => request.bearer_token(token.clone()),
            None => request,
        }
    }

    async fn get(&self, url: String) -> Result<HttpResponse> {
        let request = self.authorize(
            HttpRequest::new(HttpMethod::Get, url).timeout(self.request_timeout),
        );
        self.http_client
            .execute_with_retry(request, self.read_policy.clone())
            .await
    }

    fn parse<T: DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            ResumeApiError::ParseError(format!("Failed to parse {}: {}", what, e)).into()
        })
    }

    /// Convert a non-2xx response into an API error with the most useful message available.
    fn api_error(response: &HttpResponse) -> ResumeApiError {
        let message = serde_json::from_slice::<ErrorBody>(&response.body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| {
                let text = String::from_utf8_lossy(&response.body);
                let text = text.trim();
                if text.is_empty() {
                    format!("HTTP {}", response.status)
                } else {
                    text.chars().take(MAX_ERROR_BODY_CHARS).collect()
                }
            });

        ResumeApiError::ApiError {
            status_code: response.status,
            message,
        }
    }
}

#[async_trait]
impl ResumeParsingService for ResumeApiConnector {
    #[instrument(skip(self, request), fields(file_name = %request.file_name, size = request.payload.len()))]
    async fn upload_file(&self, request: UploadRequest) -> Result<UploadTicket> {
        info!("Uploading resume");

        let content_type = request
            .mime_type
            .as_deref()
            .filter(|mime| !mime.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let mut http_request = HttpRequest::new(HttpMethod::Post, self.endpoint(UPLOAD_PATH))
            .header(
                FILE_NAME_HEADER,
                urlencoding::encode(&request.file_name).into_owned(),
            )
            .query("force_create", request.force_create.to_string())
            .binary(request.payload, content_type)
            .timeout(self.upload_timeout);

        if let Some(category) = request
            .category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty())
        {
            http_request = http_request.query("category", category);
        }

        let response = self
            .http_client
            .execute_with_retry(self.authorize(http_request), RetryPolicy::no_retry())
            .await?;

        if !response.is_success() {
            let error = Self::api_error(&response);
            warn!("Upload rejected: {}", error);
            return Err(error.into());
        }

        let upload: UploadResponse = Self::parse(&response, "upload response")?;
        debug!(task_id = %upload.task_id, "Upload accepted");

        Ok(UploadTicket {
            task_id: upload.task_id,
        })
    }

    #[instrument(skip(self))]
    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusReport> {
        let url = self.endpoint(&format!(
            "{}/{}",
            TASKS_PATH,
            urlencoding::encode(task_id)
        ));
        let response = self.get(url).await?;

        if response.status == 404 {
            return Err(ResumeApiError::TaskNotFound {
                task_id: task_id.to_string(),
            }
            .into());
        }
        if !response.is_success() {
            return Err(Self::api_error(&response).into());
        }

        let status: TaskStatusResponse = Self::parse(&response, "task status")?;
        debug!(status = %status.status, "Task status fetched");
        Ok(status.into())
    }

    #[instrument(skip(self))]
    async fn get_candidate_by_task(&self, task_id: &str) -> Result<Option<CandidateRecord>> {
        let url = self.endpoint(&format!(
            "{}/{}/candidate",
            TASKS_PATH,
            urlencoding::encode(task_id)
        ));
        let response = self.get(url).await?;

        if response.status == 404 {
            debug!("No candidate recorded for task");
            return Ok(None);
        }
        if !response.is_success() {
            return Err(Self::api_error(&response).into());
        }

        let candidate: Option<CandidateResource> = Self::parse(&response, "candidate")?;
        Ok(candidate.map(CandidateRecord::from))
    }
}

#[async_trait]
impl DuplicateLookup for ResumeApiConnector {
    #[instrument(skip(self))]
    async fn check_duplicate_by_name(&self, name: &str) -> Result<DuplicateCheck> {
        let request = self.authorize(
            HttpRequest::new(HttpMethod::Get, self.endpoint(DUPLICATE_CHECK_PATH))
                .query("name", name)
                .timeout(self.request_timeout),
        );
        let response = self
            .http_client
            .execute_with_retry(request, self.read_policy.clone())
            .await?;

        if !response.is_success() {
            return Err(Self::api_error(&response).into());
        }

        let check: DuplicateCheckResponse = Self::parse(&response, "duplicate check")?;
        Ok(check.into())
    }
}
