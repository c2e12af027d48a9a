//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (parsing backend,
//! duplicate lookup, settings, clock) into the intake core. Desktop apps
//! typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop` and `provider-resume-api`) and call [`bootstrap_desktop`].

pub mod error;

pub use error::{CoreError, Result};

use core_intake::{BatchUploader, IntakeDependencies, UploadConfig};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "desktop-shims")]
pub use desktop::{bootstrap_desktop, DesktopOptions};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    events: EventBus,
    uploader: BatchUploader,
}

impl CoreService {
    /// Create a new service from a validated configuration.
    ///
    /// Persisted history and category labels are not loaded; use
    /// [`CoreService::bootstrap`] for that.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let upload_config = UploadConfig::builder()
            .with_concurrency_limit(config.concurrency_limit)
            .with_skip_duplicates(config.skip_duplicates);

        let duplicate_lookup = if config.features.enable_duplicate_precheck {
            config.duplicate_lookup.clone()
        } else {
            None
        };

        let uploader = BatchUploader::new(
            IntakeDependencies {
                parsing_service: Arc::clone(&config.parsing_service),
                duplicate_lookup,
                settings_store: Arc::clone(&config.settings_store),
                clock: Arc::clone(&config.clock),
                events: events.clone(),
            },
            upload_config,
        )?;

        Ok(Self {
            config: Arc::new(config),
            events,
            uploader,
        })
    }

    /// Create the service and restore batch history and category labels.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let service = Self::new(config)?;
        service.uploader.load_persisted().await?;

        info!(
            concurrency_limit = service.uploader.concurrency_limit(),
            history = service.uploader.history().len(),
            "Core service ready"
        );
        Ok(service)
    }

    /// Batch upload orchestrator.
    pub fn uploader(&self) -> &BatchUploader {
        &self.uploader
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to upload and pre-check events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(feature = "desktop-shims")]
mod desktop {
    use super::{CoreError, CoreService, Result};
    use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
    use core_runtime::config::CoreConfig;
    use provider_resume_api::ResumeApiConnector;
    use std::path::PathBuf;
    use std::sync::Arc;

    /// Inputs for [`bootstrap_desktop`].
    #[derive(Debug, Clone)]
    pub struct DesktopOptions {
        /// Parsing backend root, e.g. `https://parser.example.com`
        pub base_url: String,
        pub api_token: Option<String>,
        pub data_dir: PathBuf,
        pub concurrency_limit: Option<u8>,
        pub skip_duplicates: bool,
    }

    impl DesktopOptions {
        pub fn new(base_url: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
            Self {
                base_url: base_url.into(),
                api_token: None,
                data_dir: data_dir.into(),
                concurrency_limit: None,
                skip_duplicates: false,
            }
        }

        pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
            self.api_token = Some(token.into());
            self
        }

        pub fn with_concurrency_limit(mut self, limit: u8) -> Self {
            self.concurrency_limit = Some(limit);
            self
        }

        pub fn with_skip_duplicates(mut self, skip: bool) -> Self {
            self.skip_duplicates = skip;
            self
        }
    }

    /// Build a service on the reqwest client, the REST connector and a
    /// SQLite settings database under `data_dir`.
    pub async fn bootstrap_desktop(options: DesktopOptions) -> Result<CoreService> {
        let http_client = Arc::new(ReqwestHttpClient::new()?);

        let mut connector = ResumeApiConnector::new(http_client, options.base_url)
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
        if let Some(token) = options.api_token {
            connector = connector.with_api_token(token);
        }
        let connector = Arc::new(connector);

        let settings =
            SqliteSettingsStore::new(options.data_dir.join("intake-settings.db")).await?;

        let mut builder = CoreConfig::builder()
            .data_dir(options.data_dir)
            .parsing_service(connector.clone())
            .duplicate_lookup(connector)
            .settings_store(Arc::new(settings))
            .skip_duplicates(options.skip_duplicates);
        if let Some(limit) = options.concurrency_limit {
            builder = builder.concurrency_limit(limit);
        }

        CoreService::bootstrap(builder.build()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        CandidateRecord, DuplicateCheck, DuplicateLookup, ResumeParsingService, SettingsStore,
        TaskStatusReport, UploadRequest, UploadTicket,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct IdleParser;

    #[async_trait]
    impl ResumeParsingService for IdleParser {
        async fn upload_file(&self, _request: UploadRequest) -> bridge_traits::Result<UploadTicket> {
            Err(bridge_traits::BridgeError::NotAvailable("offline".to_string()))
        }

        async fn get_task_status(&self, _task_id: &str) -> bridge_traits::Result<TaskStatusReport> {
            Err(bridge_traits::BridgeError::NotAvailable("offline".to_string()))
        }

        async fn get_candidate_by_task(
            &self,
            _task_id: &str,
        ) -> bridge_traits::Result<Option<CandidateRecord>> {
            Ok(None)
        }
    }

    struct NoDuplicates;

    #[async_trait]
    impl DuplicateLookup for NoDuplicates {
        async fn check_duplicate_by_name(&self, _name: &str) -> bridge_traits::Result<DuplicateCheck> {
            Ok(DuplicateCheck::default())
        }
    }

    #[derive(Default)]
    struct MemorySettings(Mutex<HashMap<String, String>>);

    #[async_trait]
    impl SettingsStore for MemorySettings {
        async fn set_string(&self, key: &str, value: &str) -> bridge_traits::Result<()> {
            self.0.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get_string(&self, key: &str) -> bridge_traits::Result<Option<String>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        async fn delete(&self, key: &str) -> bridge_traits::Result<()> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> bridge_traits::Result<Vec<String>> {
            Ok(self.0.lock().unwrap().keys().cloned().collect())
        }
    }

    fn config(settings: Arc<MemorySettings>, precheck: bool) -> CoreConfig {
        CoreConfig::builder()
            .data_dir("/tmp/resume-intake")
            .parsing_service(Arc::new(IdleParser))
            .duplicate_lookup(Arc::new(NoDuplicates))
            .settings_store(settings)
            .concurrency_limit(5)
            .skip_duplicates(true)
            .enable_duplicate_precheck(precheck)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_applies_operator_defaults() {
        let settings = Arc::new(MemorySettings::default());
        settings
            .set_string(core_intake::CATEGORIES_KEY, r#"["社招","校招"]"#)
            .await
            .unwrap();

        let service = CoreService::bootstrap(config(settings, true)).await.unwrap();

        assert_eq!(service.uploader().concurrency_limit(), 5);
        assert!(service.uploader().skip_duplicates());
        assert_eq!(service.uploader().categories(), vec!["社招", "校招"]);
    }

    #[tokio::test]
    async fn test_disabled_precheck_has_no_lookup() {
        let service = CoreService::new(config(Arc::new(MemorySettings::default()), false)).unwrap();

        let result = service.uploader().run_precheck().await;
        assert!(matches!(
            result,
            Err(core_intake::IntakeError::CapabilityMissing { .. })
        ));
    }
}
