//! # Host Bridge Traits
//!
//! Capability traits the resume intake core depends on but does not implement.
//!
//! ## Overview
//!
//! This crate defines the contract between the intake core and the concrete
//! adapters that talk to the outside world. Each trait represents a capability
//! the core requires; adapters live in `bridge-desktop` (HTTP transport,
//! settings persistence) and `provider-resume-api` (the parsing backend).
//!
//! ## Traits
//!
//! ### Remote Services
//! - [`ResumeParsingService`](parsing::ResumeParsingService) - Upload resumes and poll parse tasks
//! - [`DuplicateLookup`](parsing::DuplicateLookup) - Look up existing candidates by name
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Whole-value key-value persistence
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let parsing = config.parsing_service
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "ResumeParsingService".to_string(),
//!         message: "No parsing backend provided. \
//!                  Inject a provider-resume-api connector.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations
//! convert transport-specific errors to `BridgeError` and keep messages actionable,
//! because the intake core shows them to the operator verbatim.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so that upload tasks and
//! poll loops can share one adapter instance across spawned tasks.

pub mod error;
pub mod http;
pub mod parsing;
pub mod storage;
pub mod time;

pub use error::{BridgeError, Result};

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use parsing::{
    CandidateRecord, CandidateSummary, DuplicateCheck, DuplicateLookup, RemoteTaskStatus,
    ResumeParsingService, TaskStatusReport, UploadRequest, UploadTicket,
};
pub use storage::SettingsStore;
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
