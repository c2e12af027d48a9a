//! User-defined category labels.
//!
//! Labels are free text. They are trimmed, kept unique in insertion order and
//! persisted as one JSON array.

use bridge_traits::SettingsStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{IntakeError, Result};

/// Settings key holding the serialized labels.
pub const CATEGORIES_KEY: &str = "resume_upload.categories";

pub struct CategoryLabels {
    store: Arc<dyn SettingsStore>,
    labels: Mutex<Vec<String>>,
}

impl CategoryLabels {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            labels: Mutex::new(Vec::new()),
        }
    }

    /// Restore labels from the settings store. An unreadable or corrupt value
    /// loads as empty.
    pub async fn load(&self) -> usize {
        let stored = match self.store.get_string(CATEGORIES_KEY).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read category labels");
                None
            }
        };

        let labels = match stored {
            Some(json) => serde_json::from_str::<Vec<String>>(&json).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding corrupt category labels");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let mut unique: Vec<String> = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label.trim().to_string();
            if !label.is_empty() && !unique.contains(&label) {
                unique.push(label);
            }
        }

        let count = unique.len();
        *self.labels.lock() = unique;
        debug!(count, "Category labels loaded");
        count
    }

    pub fn list(&self) -> Vec<String> {
        self.labels.lock().clone()
    }

    /// Add a label. Returns `false` when it already exists.
    pub async fn add(&self, label: &str) -> Result<bool> {
        let label = label.trim();
        if label.is_empty() {
            return Err(IntakeError::InvalidCategory(
                "label must not be blank".to_string(),
            ));
        }

        let json = {
            let mut labels = self.labels.lock();
            if labels.iter().any(|existing| existing == label) {
                return Ok(false);
            }
            labels.push(label.to_string());
            serde_json::to_string(&*labels)
        }
        .map_err(|e| IntakeError::InvalidCategory(e.to_string()))?;

        self.store.set_string(CATEGORIES_KEY, &json).await?;
        Ok(true)
    }

    /// Remove a label. Returns `false` when it was not present.
    pub async fn remove(&self, label: &str) -> Result<bool> {
        let label = label.trim();
        let json = {
            let mut labels = self.labels.lock();
            let Some(index) = labels.iter().position(|existing| existing == label) else {
                return Ok(false);
            };
            labels.remove(index);
            serde_json::to_string(&*labels)
        }
        .map_err(|e| IntakeError::InvalidCategory(e.to_string()))?;

        self.store.set_string(CATEGORIES_KEY, &json).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::BridgeError;
    use mockall::mock;

    mock! {
        Store {}

        #[async_trait]
        impl SettingsStore for Store {
            async fn set_string(&self, key: &str, value: &str) -> bridge_traits::Result<()>;
            async fn get_string(&self, key: &str) -> bridge_traits::Result<Option<String>>;
            async fn delete(&self, key: &str) -> bridge_traits::Result<()>;
            async fn list_keys(&self) -> bridge_traits::Result<Vec<String>>;
        }
    }

    #[tokio::test]
    async fn test_load_trims_and_dedupes() {
        let mut store = MockStore::new();
        store
            .expect_get_string()
            .withf(|key| key == CATEGORIES_KEY)
            .returning(|_| Ok(Some(r#"[" 前端 ","后端","前端",""]"#.to_string())));

        let labels = CategoryLabels::new(Arc::new(store));
        assert_eq!(labels.load().await, 2);
        assert_eq!(labels.list(), vec!["前端", "后端"]);
    }

    #[tokio::test]
    async fn test_unreadable_store_loads_empty() {
        let mut store = MockStore::new();
        store
            .expect_get_string()
            .withf(|key| key == CATEGORIES_KEY)
            .times(1)
            .returning(|_| Err(BridgeError::DatabaseError("disk I/O error".to_string())));

        let labels = CategoryLabels::new(Arc::new(store));
        assert_eq!(labels.load().await, 0);
        assert!(labels.list().is_empty());
    }

    #[tokio::test]
    async fn test_add_persists_whole_list() {
        let mut store = MockStore::new();
        store
            .expect_set_string()
            .withf(|key, value| key == CATEGORIES_KEY && value == r#"["Backend","QA"]"#)
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_set_string()
            .withf(|key, value| key == CATEGORIES_KEY && value == r#"["Backend"]"#)
            .times(1)
            .returning(|_, _| Ok(()));

        let labels = CategoryLabels::new(Arc::new(store));
        assert!(labels.add(" Backend ").await.unwrap());
        assert!(!labels.add("Backend").await.unwrap());
        assert!(labels.add("QA").await.unwrap());
        assert_eq!(labels.list(), vec!["Backend", "QA"]);
    }

    #[tokio::test]
    async fn test_blank_label_is_rejected() {
        let labels = CategoryLabels::new(Arc::new(MockStore::new()));
        assert!(matches!(
            labels.add("   ").await,
            Err(IntakeError::InvalidCategory(_))
        ));
    }

    #[tokio::test]
    async fn test_remove() {
        let mut store = MockStore::new();
        store.expect_set_string().returning(|_, _| Ok(()));

        let labels = CategoryLabels::new(Arc::new(store));
        labels.add("Design").await.unwrap();
        assert!(labels.remove("Design").await.unwrap());
        assert!(!labels.remove("Design").await.unwrap());
        assert!(labels.list().is_empty());
    }
}
