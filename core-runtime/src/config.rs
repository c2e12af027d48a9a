//! # Core Configuration Module
//!
//! Builder-based configuration for the resume intake core.
//!
//! ## Overview
//!
//! [`CoreConfig`] holds every bridge the intake core needs plus the operator
//! defaults for batch uploads. The builder enforces fail-fast validation so a
//! missing capability is reported at startup rather than on the first upload.
//!
//! ## Required Dependencies
//!
//! - `ResumeParsingService` - the remote parsing backend
//! - `SettingsStore` - batch history and category labels
//!
//! ## Optional Dependencies
//!
//! - `DuplicateLookup` - required only while the duplicate pre-check is enabled
//! - `Clock` - defaults to [`SystemClock`]
//!
//! When the `desktop-shims` feature is enabled, a SQLite-backed `SettingsStore`
//! is created under the data directory if none is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let connector = Arc::new(ResumeApiConnector::new(http, "https://parser.internal"));
//! let config = CoreConfig::builder()
//!     .data_dir("/var/lib/resume-intake")
//!     .parsing_service(connector.clone())
//!     .duplicate_lookup(connector)
//!     .concurrency_limit(4)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, DuplicateLookup, ResumeParsingService, SettingsStore, SystemClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Smallest accepted number of simultaneous uploads.
pub const MIN_CONCURRENCY: u8 = 1;
/// Largest accepted number of simultaneous uploads.
pub const MAX_CONCURRENCY: u8 = 10;
/// Simultaneous uploads when the operator has not chosen a value.
pub const DEFAULT_CONCURRENCY: u8 = 3;

/// Core configuration for the resume intake core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory for local state (default settings database)
    pub data_dir: PathBuf,

    /// Remote parsing backend (required)
    pub parsing_service: Arc<dyn ResumeParsingService>,

    /// Candidate lookup for the duplicate pre-check (optional)
    pub duplicate_lookup: Option<Arc<dyn DuplicateLookup>>,

    /// Batch history and category label storage (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Time source for history timestamps
    pub clock: Arc<dyn Clock>,

    /// Initial number of simultaneous uploads (1-10)
    pub concurrency_limit: u8,

    /// Whether items flagged as duplicates are skipped by default
    pub skip_duplicates: bool,

    /// Event bus buffer per subscriber
    pub event_buffer_size: usize,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("data_dir", &self.data_dir)
            .field("parsing_service", &"ResumeParsingService { ... }")
            .field(
                "duplicate_lookup",
                &self.duplicate_lookup.as_ref().map(|_| "DuplicateLookup { ... }"),
            )
            .field("settings_store", &"SettingsStore { ... }")
            .field("concurrency_limit", &self.concurrency_limit)
            .field("skip_duplicates", &self.skip_duplicates)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Optional behaviours of the intake core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Allow the filename-based duplicate pre-check pass
    pub enable_duplicate_precheck: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_duplicate_precheck: true,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Data directory is not empty
    /// - Concurrency limit is within 1-10
    /// - Event buffer can hold at least one event
    /// - The pre-check has a lookup to call when enabled
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }

        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency_limit) {
            return Err(Error::Config(format!(
                "Concurrency limit must be between {} and {}, got {}",
                MIN_CONCURRENCY, MAX_CONCURRENCY, self.concurrency_limit
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.features.enable_duplicate_precheck && self.duplicate_lookup.is_none() {
            return Err(Error::Config(
                "Duplicate pre-check enabled but no DuplicateLookup provided. \
                 Disable the feature or inject a DuplicateLookup implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn parsing_service_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "ResumeParsingService".to_string(),
        message: "A parsing backend is required to upload resumes. \
                 Inject a provider-resume-api connector or a custom implementation."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for batch history and category labels. \
                 Desktop: enable the 'desktop-shims' feature to use the default SqliteSettingsStore. \
                 Otherwise inject a host key-value store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(data_dir: &Path) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    let path = data_dir.join("intake-settings.db");

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // A nested runtime cannot be driven from inside a Tokio worker.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_data_dir: &Path) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    data_dir: Option<PathBuf>,
    parsing_service: Option<Arc<dyn ResumeParsingService>>,
    duplicate_lookup: Option<Arc<dyn DuplicateLookup>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
    concurrency_limit: Option<u8>,
    skip_duplicates: bool,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the parsing backend (required).
    pub fn parsing_service(mut self, service: Arc<dyn ResumeParsingService>) -> Self {
        self.parsing_service = Some(service);
        self
    }

    pub fn duplicate_lookup(mut self, lookup: Arc<dyn DuplicateLookup>) -> Self {
        self.duplicate_lookup = Some(lookup);
        self
    }

    /// Sets the key-value store (required unless `desktop-shims` is enabled).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn concurrency_limit(mut self, limit: u8) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }

    pub fn skip_duplicates(mut self, skip: bool) -> Self {
        self.skip_duplicates = skip;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn enable_duplicate_precheck(mut self, enabled: bool) -> Self {
        self.features.enable_duplicate_precheck = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the data directory is missing or a value is out of range
    /// - [`Error::CapabilityMissing`] when a required bridge is absent
    pub fn build(self) -> Result<CoreConfig> {
        let data_dir = self.data_dir.ok_or_else(|| {
            Error::Config("Data directory is required. Use .data_dir() to set it.".to_string())
        })?;

        let parsing_service = self
            .parsing_service
            .ok_or_else(parsing_service_missing_error)?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(&data_dir)?,
        };

        let config = CoreConfig {
            data_dir,
            parsing_service,
            duplicate_lookup: self.duplicate_lookup,
            settings_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            concurrency_limit: self.concurrency_limit.unwrap_or(DEFAULT_CONCURRENCY),
            skip_duplicates: self.skip_duplicates,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        CandidateRecord, DuplicateCheck, RemoteTaskStatus, TaskStatusReport, UploadRequest,
        UploadTicket,
    };

    struct StubParser;

    #[async_trait]
    impl ResumeParsingService for StubParser {
        async fn upload_file(&self, _request: UploadRequest) -> BridgeResult<UploadTicket> {
            Ok(UploadTicket {
                task_id: "task-1".to_string(),
            })
        }

        async fn get_task_status(&self, _task_id: &str) -> BridgeResult<TaskStatusReport> {
            Ok(TaskStatusReport::new(RemoteTaskStatus::Parsing))
        }

        async fn get_candidate_by_task(
            &self,
            _task_id: &str,
        ) -> BridgeResult<Option<CandidateRecord>> {
            Ok(None)
        }
    }

    struct StubLookup;

    #[async_trait]
    impl DuplicateLookup for StubLookup {
        async fn check_duplicate_by_name(&self, _name: &str) -> BridgeResult<DuplicateCheck> {
            Ok(DuplicateCheck::default())
        }
    }

    struct StubSettings;

    #[async_trait]
    impl SettingsStore for StubSettings {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .data_dir("/tmp/resume-intake")
            .parsing_service(Arc::new(StubParser))
            .duplicate_lookup(Arc::new(StubLookup))
            .settings_store(Arc::new(StubSettings))
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/resume-intake"));
        assert_eq!(config.concurrency_limit, DEFAULT_CONCURRENCY);
        assert!(!config.skip_duplicates);
        assert!(config.features.enable_duplicate_precheck);
    }

    #[test]
    fn test_builder_requires_data_dir() {
        let result = CoreConfig::builder()
            .parsing_service(Arc::new(StubParser))
            .settings_store(Arc::new(StubSettings))
            .build();

        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("data_dir")));
    }

    #[test]
    fn test_builder_requires_parsing_service() {
        let result = CoreConfig::builder()
            .data_dir("/tmp/resume-intake")
            .settings_store(Arc::new(StubSettings))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { capability, .. }) if capability == "ResumeParsingService"
        ));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_settings_store() {
        let result = CoreConfig::builder()
            .data_dir("/tmp/resume-intake")
            .parsing_service(Arc::new(StubParser))
            .enable_duplicate_precheck(false)
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { capability, .. }) if capability == "SettingsStore"
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_concurrency() {
        for limit in [0u8, 11, 255] {
            let result = complete_builder().concurrency_limit(limit).build();
            assert!(matches!(result, Err(Error::Config(_))), "limit {limit}");
        }
        for limit in MIN_CONCURRENCY..=MAX_CONCURRENCY {
            assert!(complete_builder().concurrency_limit(limit).build().is_ok());
        }
    }

    #[test]
    fn test_validate_precheck_requires_lookup() {
        let result = CoreConfig::builder()
            .data_dir("/tmp/resume-intake")
            .parsing_service(Arc::new(StubParser))
            .settings_store(Arc::new(StubSettings))
            .build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("DuplicateLookup")));

        let config = CoreConfig::builder()
            .data_dir("/tmp/resume-intake")
            .parsing_service(Arc::new(StubParser))
            .settings_store(Arc::new(StubSettings))
            .enable_duplicate_precheck(false)
            .build()
            .unwrap();
        assert!(config.duplicate_lookup.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_event_buffer() {
        let result = complete_builder().event_buffer_size(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_debug_hides_bridges() {
        let config = complete_builder().skip_duplicates(true).build().unwrap();
        let rendered = format!("{:?}", config);

        assert!(rendered.contains("skip_duplicates: true"));
        assert!(rendered.contains("ResumeParsingService { ... }"));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_settings_default() {
        let base = std::env::temp_dir().join(format!(
            "core-runtime-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&base).unwrap();

        let config = CoreConfig::builder()
            .data_dir(&base)
            .parsing_service(Arc::new(StubParser))
            .enable_duplicate_precheck(false)
            .build()
            .expect("desktop defaults should succeed");

        let settings = config.settings_store.clone();
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            settings.set_string("resume_upload.smoke", "ok").await.unwrap();
            assert_eq!(settings.get_string("resume_upload.smoke").await.unwrap().as_deref(), Some("ok"));
        });

        drop(config);
        let _ = std::fs::remove_dir_all(&base);
    }
}
