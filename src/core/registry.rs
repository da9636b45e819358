//! Concurrent indexed registry of DataNode records
//!
//! Behaves as a map from identity key to record plus a positional index, so a
//! selection strategy can address members by integer offset. Each registry
//! owns the strategy that picks where its sweeps start.
//!
//! # Invariant
//!
//! The key map and the index table always hold the same keys, in bijection:
//! no key appears twice and no index is skipped. Both structures live behind
//! one reader-writer lock; `add` and `remove` restore the invariant before the
//! write section ends. A violation marks the registry corrupted and every
//! later mutation is refused.
//!
//! # Scan consistency
//!
//! [`IndexedRegistry::scan`] holds a single read section for the whole sweep,
//! so a sweep sees one consistent membership snapshot and a concurrent removal
//! waits until it finishes. The single-call accessors (`size`, `get_by_index`)
//! are only consistent per call.

use crate::error::{BlockStoreError, Result};
use crate::holder::DataNodeBlocks;
use crate::selection::{BlockSelection, SelectionPolicy};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Default)]
struct Members {
    by_key: AHashMap<u64, Arc<DataNodeBlocks>>,
    /// Keys in insertion order; position = selection index
    index: Vec<u64>,
}

impl Members {
    fn get_by_index(&self, i: usize) -> Option<&Arc<DataNodeBlocks>> {
        self.index.get(i).and_then(|key| self.by_key.get(key))
    }
}

/// Thread-safe key map with positional lookup
#[derive(Debug)]
pub struct IndexedRegistry {
    /// Storage class this registry belongs to (diagnostics only)
    class: u32,
    members: RwLock<Members>,
    selection: BlockSelection,
    corrupted: AtomicBool,
}

impl IndexedRegistry {
    /// Empty registry with round-robin sweeps
    pub fn new(class: u32) -> Self {
        Self::with_selection(class, BlockSelection::new(SelectionPolicy::RoundRobin))
    }

    pub fn with_selection(class: u32, selection: BlockSelection) -> Self {
        IndexedRegistry {
            class,
            members: RwLock::new(Members::default()),
            selection,
            corrupted: AtomicBool::new(false),
        }
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        self.selection.policy()
    }

    pub fn size(&self) -> usize {
        self.members.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Insert `record` unless its key is already present
    ///
    /// Returns the resident record: `record` itself when it was inserted, or
    /// the record that won an earlier insert. A losing record is dropped.
    pub fn add(&self, record: Arc<DataNodeBlocks>) -> Result<Arc<DataNodeBlocks>> {
        self.ensure_healthy()?;
        let mut members = self.members.write();

        let key = record.key();
        if let Some(existing) = members.by_key.get(&key) {
            return Ok(Arc::clone(existing));
        }

        members.by_key.insert(key, Arc::clone(&record));
        members.index.push(key);
        self.check_sizes(&members)?;

        Ok(record)
    }

    /// Remove `key` from both the map and the index table
    pub fn remove(&self, key: u64) -> Result<Option<Arc<DataNodeBlocks>>> {
        self.ensure_healthy()?;
        let mut members = self.members.write();

        let removed = match members.by_key.remove(&key) {
            Some(record) => record,
            None => return Ok(None),
        };
        // Order-preserving compaction; later members shift down by one
        if let Some(pos) = members.index.iter().position(|&k| k == key) {
            members.index.remove(pos);
        }
        self.check_sizes(&members)?;

        Ok(Some(removed))
    }

    /// Positional lookup; `None` if `i` is past the current size
    pub fn get_by_index(&self, i: usize) -> Option<Arc<DataNodeBlocks>> {
        self.members.read().get_by_index(i).cloned()
    }

    pub fn get_by_key(&self, key: u64) -> Option<Arc<DataNodeBlocks>> {
        self.members.read().by_key.get(&key).cloned()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.members.read().by_key.contains_key(&key)
    }

    /// Visit members in ring order from a strategy-chosen start
    ///
    /// Stops at the first member for which `visit` returns `Some`. The read
    /// section is held for the whole sweep, so `visit` must not call back into
    /// this registry's mutators.
    pub fn scan<T>(&self, mut visit: impl FnMut(&DataNodeBlocks) -> Option<T>) -> Option<T> {
        let members = self.members.read();
        let size = members.index.len();
        if size == 0 {
            return None;
        }

        let start = self.selection.get_next(size);
        for i in 0..size {
            let index = (start + i) % size;
            if let Some(record) = members.get_by_index(index) {
                if let Some(found) = visit(record) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Snapshot of all records in index order
    pub fn records(&self) -> Vec<Arc<DataNodeBlocks>> {
        let members = self.members.read();
        members
            .index
            .iter()
            .filter_map(|key| members.by_key.get(key).cloned())
            .collect()
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted.load(Ordering::Acquire)
    }

    /// Full bijection check between the key map and the index table
    pub fn validate(&self) -> Result<()> {
        let members = self.members.read();
        self.check_sizes(&members)?;

        let mut seen = HashSet::with_capacity(members.index.len());
        for key in &members.index {
            if !seen.insert(*key) || !members.by_key.contains_key(key) {
                return Err(self.mark_corrupted(&members));
            }
        }
        Ok(())
    }

    fn ensure_healthy(&self) -> Result<()> {
        if self.is_corrupted() {
            let members = self.members.read();
            return Err(BlockStoreError::RegistryCorrupted {
                class: self.class,
                map_len: members.by_key.len(),
                index_len: members.index.len(),
            });
        }
        Ok(())
    }

    fn check_sizes(&self, members: &Members) -> Result<()> {
        if members.by_key.len() != members.index.len() {
            return Err(self.mark_corrupted(members));
        }
        Ok(())
    }

    fn mark_corrupted(&self, members: &Members) -> BlockStoreError {
        self.corrupted.store(true, Ordering::Release);
        error!(
            storage_class = self.class,
            map_len = members.by_key.len(),
            index_len = members.index.len(),
            "DataNode registry lost map/index consistency; refusing further mutations"
        );
        BlockStoreError::RegistryCorrupted {
            class: self.class,
            map_len: members.by_key.len(),
            index_len: members.index.len(),
        }
    }

    #[cfg(test)]
    pub(crate) fn inject_stray_index_key(&self, key: u64) {
        self.members.write().index.push(key);
    }
}
