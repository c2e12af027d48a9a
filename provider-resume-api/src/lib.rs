//! # Resume API Provider
//!
//! Implements `ResumeParsingService` and `DuplicateLookup` for the resume
//! parsing backend's REST API.
//!
//! ## Overview
//!
//! This module provides:
//! - Binary resume uploads with percent-encoded file names
//! - Parse task status and candidate lookups
//! - Name-based duplicate checks
//! - Retries for idempotent reads only; uploads are sent once

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{ResumeApiConnector, FILE_NAME_HEADER};
pub use error::{ResumeApiError, Result};
