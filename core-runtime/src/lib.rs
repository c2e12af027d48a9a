//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the resume intake core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus for upload and pre-check notifications
//!
//! Every other core crate depends on this one for its logging conventions and
//! for the [`EventBus`](events::EventBus) it publishes into.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
