//! # Item Store
//!
//! Single owner of the live upload list. Other components never hold an
//! `UploadItem`; they mutate one through [`ItemStore::update`] or an
//! id-scoped [`ItemHandle`]. Every status or message change is published as
//! an [`UploadEvent::ItemStatusChanged`].

use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::error::{IntakeError, Result};
use crate::item::{UploadItem, UploadItemId, UploadStatus};

/// Per-status item counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub success: usize,
    pub error: usize,
    pub duplicate: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct ItemStore {
    items: Arc<Mutex<Vec<UploadItem>>>,
    events: EventBus,
}

impl ItemStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    /// Clone of every item, in list order.
    pub fn snapshot(&self) -> Vec<UploadItem> {
        self.items.lock().clone()
    }

    pub fn get(&self, id: UploadItemId) -> Option<UploadItem> {
        self.items.lock().iter().find(|item| item.id == id).cloned()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.items.lock().iter().any(|item| item.name == name)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn push(&self, item: UploadItem) -> UploadItemId {
        let id = item.id;
        self.items.lock().push(item);
        id
    }

    pub fn remove(&self, id: UploadItemId) -> Option<UploadItem> {
        let mut items = self.items.lock();
        let index = items.iter().position(|item| item.id == id)?;
        Some(items.remove(index))
    }

    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let removed = items.len();
        items.clear();
        removed
    }

    /// Ids of matching items, in list order.
    pub fn ids_where<F>(&self, predicate: F) -> Vec<UploadItemId>
    where
        F: Fn(&UploadItem) -> bool,
    {
        self.items
            .lock()
            .iter()
            .filter(|item| predicate(item))
            .map(|item| item.id)
            .collect()
    }

    pub fn counts(&self) -> QueueCounts {
        let items = self.items.lock();
        let mut counts = QueueCounts {
            total: items.len(),
            ..Default::default()
        };
        for item in items.iter() {
            match item.status {
                UploadStatus::Pending => counts.pending += 1,
                UploadStatus::Uploading => counts.uploading += 1,
                UploadStatus::Success => counts.success += 1,
                UploadStatus::Error => counts.error += 1,
                UploadStatus::Duplicate => counts.duplicate += 1,
                UploadStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    /// Mutate one item under the store lock.
    ///
    /// The closure must not block. A status or message change is published
    /// after the lock is released. When the closure fails the item is left as
    /// the closure left it, so closures validate before they write.
    pub fn update<R, F>(&self, id: UploadItemId, f: F) -> Result<R>
    where
        F: FnOnce(&mut UploadItem) -> Result<R>,
    {
        let (result, change) = {
            let mut items = self.items.lock();
            let item = items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or_else(|| IntakeError::ItemNotFound(id.to_string()))?;

            let before = (item.status, item.message.clone());
            let result = f(item);
            let change = (before != (item.status, item.message.clone())).then(|| {
                (
                    item.name.clone(),
                    item.status,
                    item.message.clone(),
                    before.0,
                )
            });
            (result, change)
        };

        if let Some((name, status, message, previous)) = change {
            debug!(
                item_id = %id,
                from = %previous,
                to = %status,
                "Upload item updated"
            );
            let _ = self
                .events
                .emit(CoreEvent::Upload(UploadEvent::ItemStatusChanged {
                    item_id: id.to_string(),
                    name,
                    status: status.as_str().to_string(),
                    message,
                }));
        }

        result
    }

    /// Id-scoped handle for one item.
    pub fn handle(&self, id: UploadItemId) -> ItemHandle {
        ItemHandle {
            id,
            store: self.clone(),
        }
    }
}

/// Narrow write access to a single item.
#[derive(Clone)]
pub struct ItemHandle {
    id: UploadItemId,
    store: ItemStore,
}

impl ItemHandle {
    pub fn id(&self) -> UploadItemId {
        self.id
    }

    pub fn get(&self) -> Option<UploadItem> {
        self.store.get(self.id)
    }

    pub fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut UploadItem) -> Result<R>,
    {
        self.store.update(self.id, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::IncomingFile;

    fn store_with(names: &[&str]) -> (ItemStore, Vec<UploadItemId>) {
        let store = ItemStore::new(EventBus::new(16));
        let ids = names
            .iter()
            .map(|name| store.push(UploadItem::new(IncomingFile::new(*name, vec![1u8; 8]))))
            .collect();
        (store, ids)
    }

    #[test]
    fn test_counts_and_lookup() {
        let (store, ids) = store_with(&["a.pdf", "b.pdf", "c.pdf"]);
        store
            .update(ids[1], |item| item.begin_upload())
            .unwrap();

        let counts = store.counts();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.uploading, 1);
        assert!(store.contains_name("b.pdf"));
        assert!(!store.contains_name("d.pdf"));
        assert_eq!(
            store.ids_where(|item| item.status == UploadStatus::Pending),
            vec![ids[0], ids[2]]
        );
    }

    #[test]
    fn test_update_missing_item() {
        let (store, ids) = store_with(&["a.pdf"]);
        store.remove(ids[0]).unwrap();
        let result = store.update(ids[0], |item| item.begin_upload());
        assert!(matches!(result, Err(IntakeError::ItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_status_change_is_published() {
        let (store, ids) = store_with(&["张三_简历.pdf"]);
        let mut rx = store.events.subscribe();

        store.handle(ids[0]).update(|item| item.begin_upload()).unwrap();

        match rx.recv().await.unwrap() {
            CoreEvent::Upload(UploadEvent::ItemStatusChanged {
                item_id,
                name,
                status,
                ..
            }) => {
                assert_eq!(item_id, ids[0].to_string());
                assert_eq!(name, "张三_简历.pdf");
                assert_eq!(status, "uploading");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_progress_only_update_is_silent() {
        let (store, ids) = store_with(&["a.pdf"]);
        store.update(ids[0], |item| item.begin_upload()).unwrap();
        let mut rx = store.events.subscribe();

        store
            .update(ids[0], |item| {
                item.advance_progress(10, 90);
                Ok(())
            })
            .unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(store.get(ids[0]).unwrap().progress_percent, 10);
    }
}
