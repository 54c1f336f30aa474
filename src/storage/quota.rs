use super::{audio_key, meta_key, KvStore};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const MANIFEST_KEY: &str = "history_index";

/// One stored item as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(rename = "size", default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub insertion_order: u64,
    /// Descriptive fields owned by other components; carried through untouched.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, size_bytes: u64, insertion_order: u64) -> Self {
        Self {
            id: id.into(),
            size_bytes,
            insertion_order,
            extra: HashMap::new(),
        }
    }
}

/// Remove entries from the front of the oldest-first `catalog` until
/// `sum + incoming <= budget` or nothing is left.
///
/// Returns the evicted entries, oldest first. An `incoming` larger than the
/// whole budget empties the catalog and still leaves the budget exceeded.
pub fn evict_oldest(catalog: &mut Vec<CatalogEntry>, incoming: u64, budget: u64) -> Vec<CatalogEntry> {
    let mut total: u64 = catalog.iter().map(|e| e.size_bytes).sum();
    let mut count = 0;
    while count < catalog.len() && total.saturating_add(incoming) > budget {
        total = total.saturating_sub(catalog[count].size_bytes);
        count += 1;
    }
    catalog.drain(..count).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: Vec<String>,
    pub freed_bytes: u64,
    /// Catalog size after eviction, excluding the incoming item.
    pub retained_bytes: u64,
}

/// Keeps the manifest within a byte budget.
///
/// Reads and rewrites the manifest without cross-key atomicity; callers that
/// insert concurrently must serialize around it.
#[derive(Clone)]
pub struct QuotaManager {
    store: Arc<dyn KvStore>,
    budget_bytes: u64,
}

impl QuotaManager {
    pub fn new(store: Arc<dyn KvStore>, budget_bytes: u64) -> Self {
        Self {
            store,
            budget_bytes,
        }
    }

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Manifest entries, oldest first.
    pub async fn load_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let Some(raw) = self.store.get(MANIFEST_KEY).await? else {
            return Ok(Vec::new());
        };
        let mut catalog: Vec<CatalogEntry> = serde_json::from_slice(&raw).map_err(|e| {
            Error::storage_with_context(
                format!("manifest is not valid JSON: {}", e),
                ErrorContext::new()
                    .with_field_path(MANIFEST_KEY)
                    .with_source("quota"),
            )
        })?;
        catalog.sort_by_key(|e| e.insertion_order);
        Ok(catalog)
    }

    pub async fn save_catalog(&self, catalog: &[CatalogEntry]) -> Result<()> {
        let raw = serde_json::to_vec(catalog)?;
        self.store.put(MANIFEST_KEY, Bytes::from(raw)).await
    }

    /// Make room for an item of `incoming_bytes`, deleting evicted payloads.
    pub async fn enforce(&self, incoming_bytes: u64) -> Result<EvictionReport> {
        let mut catalog = self.load_catalog().await?;
        let evicted = evict_oldest(&mut catalog, incoming_bytes, self.budget_bytes);
        let retained_bytes = catalog.iter().map(|e| e.size_bytes).sum();

        if evicted.is_empty() {
            return Ok(EvictionReport {
                evicted: Vec::new(),
                freed_bytes: 0,
                retained_bytes,
            });
        }

        let mut report = EvictionReport {
            retained_bytes,
            ..Default::default()
        };
        for entry in evicted {
            for key in [audio_key(&entry.id), meta_key(&entry.id)] {
                if let Err(e) = self.store.delete(&key).await {
                    warn!(key = %key, error = %e, "failed to delete evicted payload");
                }
            }
            report.freed_bytes += entry.size_bytes;
            report.evicted.push(entry.id);
        }
        self.save_catalog(&catalog).await?;

        info!(
            evicted = report.evicted.len(),
            freed_bytes = report.freed_bytes,
            retained_bytes = report.retained_bytes,
            incoming_bytes,
            budget_bytes = self.budget_bytes,
            "storage quota enforced"
        );
        if retained_bytes.saturating_add(incoming_bytes) > self.budget_bytes {
            warn!(
                incoming_bytes,
                budget_bytes = self.budget_bytes,
                "incoming item alone exceeds the storage budget"
            );
        }
        Ok(report)
    }
}
