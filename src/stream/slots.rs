//! Per-request result slots filled by concurrent synthesis tasks.

use bytes::Bytes;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

/// Outcome of one segment in the concurrent phase.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSlot {
    Pending,
    Ready(Bytes),
    Failed(String),
}

/// Fixed-length slot array with one wake-up signal per index.
///
/// Each index is written by at most one task and read by the ordered writer.
pub struct ResultSlots {
    slots: Mutex<Vec<ChunkSlot>>,
    signals: Vec<Notify>,
}

impl ResultSlots {
    pub fn new(len: usize) -> Self {
        Self {
            slots: Mutex::new(vec![ChunkSlot::Pending; len]),
            signals: (0..len).map(|_| Notify::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChunkSlot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Settle slot `index`. Later fills of an already settled slot are ignored.
    pub fn fill(&self, index: usize, outcome: ChunkSlot) {
        {
            let mut slots = self.lock();
            match slots.get_mut(index) {
                Some(slot) if matches!(slot, ChunkSlot::Pending) => *slot = outcome,
                _ => return,
            }
        }
        // notify_one keeps a permit if the writer is not waiting yet
        self.signals[index].notify_one();
    }

    pub fn peek(&self, index: usize) -> Option<ChunkSlot> {
        self.lock().get(index).cloned()
    }

    /// Wait until slot `index` is settled and return its outcome.
    pub async fn wait(&self, index: usize) -> ChunkSlot {
        loop {
            match self.peek(index) {
                Some(ChunkSlot::Pending) => {}
                Some(settled) => return settled,
                None => return ChunkSlot::Failed(format!("slot {index} out of range")),
            }
            self.signals[index].notified().await;
        }
    }
}
