use super::quota::{CatalogEntry, EvictionReport, QuotaManager};
use super::{audio_key, meta_key, KvStore};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Stored audio with JSON metadata, bounded by a [`QuotaManager`].
pub struct AudioLibrary {
    quota: QuotaManager,
    // Serializes manifest read-modify-write cycles within this process.
    manifest_gate: Mutex<()>,
}

impl AudioLibrary {
    pub fn new(store: Arc<dyn KvStore>, budget_bytes: u64) -> Self {
        Self::with_quota(QuotaManager::new(store, budget_bytes))
    }

    pub fn with_quota(quota: QuotaManager) -> Self {
        Self {
            quota,
            manifest_gate: Mutex::new(()),
        }
    }

    pub fn quota(&self) -> &QuotaManager {
        &self.quota
    }

    /// Store `audio` and `metadata` under `id`, evicting older items first
    /// when the budget requires it.
    pub async fn save(
        &self,
        id: &str,
        audio: Bytes,
        metadata: serde_json::Value,
    ) -> Result<EvictionReport> {
        if id.trim().is_empty() {
            return Err(Error::validation_with_context(
                "audio id must not be empty",
                ErrorContext::new().with_field_path("id").with_source("storage"),
            ));
        }
        let size = audio.len() as u64;
        let store = self.quota.store();

        let _gate = self.manifest_gate.lock().await;
        self.release_existing(id).await?;
        let report = self.quota.enforce(size).await?;

        store.put(&audio_key(id), audio).await?;
        store
            .put(&meta_key(id), Bytes::from(serde_json::to_vec(&metadata)?))
            .await?;

        let mut catalog = self.quota.load_catalog().await?;
        catalog.retain(|e| e.id != id);
        let next_order = catalog
            .iter()
            .map(|e| e.insertion_order + 1)
            .max()
            .unwrap_or(0);
        catalog.push(CatalogEntry::new(id, size, next_order));
        self.quota.save_catalog(&catalog).await?;

        debug!(id, bytes = size, evicted = report.evicted.len(), "audio stored");
        Ok(report)
    }

    /// Drop a previous entry for `id` so its bytes do not count against the
    /// replacement.
    async fn release_existing(&self, id: &str) -> Result<()> {
        let mut catalog = self.quota.load_catalog().await?;
        let before = catalog.len();
        catalog.retain(|e| e.id != id);
        if catalog.len() == before {
            return Ok(());
        }
        self.quota.save_catalog(&catalog).await?;

        let store = self.quota.store();
        store.delete(&audio_key(id)).await?;
        store.delete(&meta_key(id)).await?;
        debug!(id, "replacing stored audio");
        Ok(())
    }

    pub async fn load_audio(&self, id: &str) -> Result<Option<Bytes>> {
        self.quota.store().get(&audio_key(id)).await
    }

    pub async fn load_metadata(&self, id: &str) -> Result<Option<serde_json::Value>> {
        match self.quota.store().get(&meta_key(id)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Manifest entries, oldest first.
    pub async fn entries(&self) -> Result<Vec<CatalogEntry>> {
        self.quota.load_catalog().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_load() {
        let library = AudioLibrary::new(Arc::new(MemoryStore::new()), 1024);
        library
            .save("a1", Bytes::from_static(b"mp3"), json!({"voice": "v"}))
            .await
            .unwrap();
        assert_eq!(
            library.load_audio("a1").await.unwrap(),
            Some(Bytes::from_static(b"mp3"))
        );
        assert_eq!(
            library.load_metadata("a1").await.unwrap(),
            Some(json!({"voice": "v"}))
        );
        let entries = library.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size_bytes, 3);
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let library = AudioLibrary::new(Arc::new(MemoryStore::new()), 1024);
        let err = library
            .save(" ", Bytes::from_static(b"x"), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_resaving_same_id_replaces_entry() {
        let library = AudioLibrary::new(Arc::new(MemoryStore::new()), 1024);
        library.save("a", Bytes::from_static(b"12"), json!({})).await.unwrap();
        library.save("b", Bytes::from_static(b"34"), json!({})).await.unwrap();
        library.save("a", Bytes::from_static(b"5678"), json!({})).await.unwrap();
        let entries = library.entries().await.unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(entries[1].size_bytes, 4);
    }

    #[tokio::test]
    async fn test_resaving_does_not_count_replaced_bytes() {
        let store = Arc::new(MemoryStore::new());
        let library = AudioLibrary::new(store.clone(), 10);
        library.save("old", Bytes::from_static(b"11111"), json!({})).await.unwrap();
        library.save("a", Bytes::from_static(b"22222"), json!({})).await.unwrap();

        let report = library
            .save("a", Bytes::from_static(b"33333"), json!({"v": 2}))
            .await
            .unwrap();
        assert!(report.evicted.is_empty());

        let ids: Vec<_> = library.entries().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["old", "a"]);
        assert!(store.contains("audio_old"));
        assert_eq!(
            library.load_audio("a").await.unwrap(),
            Some(Bytes::from_static(b"33333"))
        );
        assert_eq!(library.load_metadata("a").await.unwrap(), Some(json!({"v": 2})));
    }
}
