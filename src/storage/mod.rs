//! 存储模块：键值存储端口、配额淘汰与音频库。
//!
//! # Storage
//!
//! The relay never owns durable storage. It talks to an injected [`KvStore`]
//! (string keys, byte values, no cross-key atomicity) and layers two things
//! on top:
//!
//! - [`QuotaManager`]: byte-budgeted, strictly oldest-first eviction over the
//!   `history_index` manifest.
//! - [`AudioLibrary`]: stores `audio_{id}` / `meta_{id}` pairs, enforcing the
//!   quota before each insertion.

mod archive;
mod quota;

pub use archive::AudioLibrary;
pub use quota::{evict_oldest, CatalogEntry, EvictionReport, QuotaManager, MANIFEST_KEY};

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;

pub fn audio_key(id: &str) -> String {
    format!("audio_{id}")
}

pub fn meta_key(id: &str) -> String {
    format!("meta_{id}")
}

/// Best-effort key-value store port.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;
    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;
    fn name(&self) -> &'static str;
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(key)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key)
            .is_some())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
