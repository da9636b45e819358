//! DataNode pool for one storage class
//!
//! Every pool keeps an "any" registry holding all of its DataNodes and one
//! registry per locality class for affinity-driven allocation. Each registry
//! rotates its own sweep start, so affinity misses never skew the rotation of
//! the "any" registry.

use crate::block::BlockInfo;
use crate::datanode::DataNodeInfo;
use crate::error::{BlockStoreError, Result};
use crate::holder::DataNodeBlocks;
use crate::registry::IndexedRegistry;
use crate::selection::{BlockSelection, SelectionPolicy};
use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Block counters of one storage class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassStat {
    /// Blocks contributed by the current members
    pub all_blocks: u64,
    /// Contributed blocks no longer in a free queue
    pub consumed_blocks: u64,
}

/// Allocation pool of one storage class
#[derive(Debug)]
pub struct DataNodePool {
    storage_class: u32,
    any_set: IndexedRegistry,
    affinity_sets: RwLock<AHashMap<u32, Arc<IndexedRegistry>>>,
    /// Policy given to affinity registries created later
    policy: SelectionPolicy,
    affinity_lookup: bool,
    /// Serializes membership changes across the any and affinity registries
    membership: Mutex<()>,
}

impl DataNodePool {
    pub fn new(storage_class: u32, policy: SelectionPolicy, affinity_lookup: bool) -> Self {
        Self::with_selection(storage_class, BlockSelection::new(policy), affinity_lookup)
    }

    pub fn with_selection(
        storage_class: u32,
        selection: BlockSelection,
        affinity_lookup: bool,
    ) -> Self {
        let policy = selection.policy();
        info!("storage class {} uses {} block selection", storage_class, policy);
        DataNodePool {
            storage_class,
            any_set: IndexedRegistry::with_selection(storage_class, selection),
            affinity_sets: RwLock::new(AHashMap::new()),
            policy,
            affinity_lookup,
            membership: Mutex::new(()),
        }
    }

    pub fn storage_class(&self) -> u32 {
        self.storage_class
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Number of registered DataNodes
    pub fn size(&self) -> usize {
        self.any_set.size()
    }

    /// Queue a free block, registering its DataNode on first contribution
    pub fn add_block(&self, block: Arc<BlockInfo>) -> Result<()> {
        if block.storage_class() != self.storage_class {
            return Err(BlockStoreError::AddBlockFailed(format!(
                "block of DataNode {} declares storage class {}, pool serves {}",
                block.datanode(),
                block.storage_class(),
                self.storage_class
            )));
        }

        let key = block.datanode().key();
        let record = match self.any_set.get_by_key(key) {
            Some(record) => record,
            None => self.add_datanode(*block.datanode())?,
        };

        record.touch();
        record.add_free_block(block);
        Ok(())
    }

    /// Register a DataNode, or return the record that is already registered
    pub fn add_datanode(&self, info: DataNodeInfo) -> Result<Arc<DataNodeBlocks>> {
        let _membership = self.membership.lock();

        let candidate = Arc::new(DataNodeBlocks::from_datanode_info(info));
        let resident = self.any_set.add(Arc::clone(&candidate))?;
        if !Arc::ptr_eq(&resident, &candidate) {
            // Lost the race to another contributor; its record is the member
            return Ok(resident);
        }

        info!(
            "adding datanode {} of type {} to storage class {}",
            info, info.storage_type, self.storage_class
        );
        self.affinity_set(info.location_class)
            .add(Arc::clone(&resident))?;
        Ok(resident)
    }

    /// Deregister a DataNode
    ///
    /// Blocks already handed out stay valid; queued blocks are dropped with
    /// the record.
    pub fn remove_datanode(&self, info: &DataNodeInfo) -> Result<Arc<DataNodeBlocks>> {
        match self.remove_key(info.key())? {
            Some(record) => Ok(record),
            None => {
                info!("DataNode {} not found in storage class {}", info, self.storage_class);
                Err(BlockStoreError::DataNodeNotRegistered { key: info.key() })
            }
        }
    }

    /// Deregister by identity key; `None` if the key is not a member
    pub fn remove_key(&self, key: u64) -> Result<Option<Arc<DataNodeBlocks>>> {
        let _membership = self.membership.lock();

        let record = match self.any_set.remove(key)? {
            Some(record) => record,
            None => return Ok(None),
        };
        let affinity_set = self.affinity_sets.read().get(&record.location_class()).cloned();
        if let Some(set) = affinity_set {
            set.remove(key)?;
        }
        record.set_online(false);

        info!(
            "DataNode {} scheduled for removal from storage class {}",
            record.info(),
            self.storage_class
        );
        Ok(Some(record))
    }

    /// Take one free block, preferring DataNodes of locality class `affinity`
    ///
    /// Never blocks: returns `None` after one sweep of the affinity set (if
    /// any) and one sweep of the whole pool.
    pub fn get_block(&self, affinity: u32) -> Option<Arc<BlockInfo>> {
        if affinity != 0 && self.affinity_lookup {
            let affinity_set = self.affinity_sets.read().get(&affinity).cloned();
            if let Some(set) = affinity_set {
                if let Some(block) = self.sweep(&set) {
                    return Some(block);
                }
                debug!(
                    "no free block with affinity {} in storage class {}",
                    affinity, self.storage_class
                );
            }
        }
        self.sweep(&self.any_set)
    }

    pub fn get_datanode(&self, key: u64) -> Option<Arc<DataNodeBlocks>> {
        self.any_set.get_by_key(key)
    }

    /// Registered DataNodes in selection order
    pub fn datanodes(&self) -> Vec<Arc<DataNodeBlocks>> {
        self.any_set.records()
    }

    pub fn class_stat(&self) -> ClassStat {
        let (all_blocks, free_blocks) = self
            .any_set
            .records()
            .iter()
            .fold((0u64, 0u64), |(all, free), record| {
                (all + record.total_blocks(), free + record.free_block_count())
            });
        ClassStat {
            all_blocks,
            consumed_blocks: all_blocks.saturating_sub(free_blocks),
        }
    }

    /// Check map/index consistency of every registry in the pool
    pub fn validate(&self) -> Result<()> {
        self.any_set.validate()?;
        for set in self.affinity_sets.read().values() {
            set.validate()?;
        }
        Ok(())
    }

    fn sweep(&self, registry: &IndexedRegistry) -> Option<Arc<BlockInfo>> {
        registry.scan(|datanode| {
            if datanode.is_online() {
                datanode.get_free_block()
            } else {
                None
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn any_set(&self) -> &IndexedRegistry {
        &self.any_set
    }

    fn affinity_set(&self, location_class: u32) -> Arc<IndexedRegistry> {
        if let Some(set) = self.affinity_sets.read().get(&location_class) {
            return Arc::clone(set);
        }
        let mut sets = self.affinity_sets.write();
        Arc::clone(
            sets.entry(location_class)
                .or_insert_with(|| {
                    Arc::new(IndexedRegistry::with_selection(
                        self.storage_class,
                        BlockSelection::new(self.policy),
                    ))
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn datanode(last_octet: u8, location_class: u32) -> DataNodeInfo {
        DataNodeInfo::new(Ipv4Addr::new(10, 0, 0, last_octet), 50020, 0, 0, location_class)
    }

    fn contribute(pool: &DataNodePool, dn: DataNodeInfo, addr: u64) -> Arc<BlockInfo> {
        let block = Arc::new(BlockInfo::new(dn, addr, 4096, 0));
        pool.add_block(Arc::clone(&block)).unwrap();
        block
    }

    fn round_robin_pool() -> DataNodePool {
        DataNodePool::new(0, SelectionPolicy::RoundRobin, true)
    }

    #[test]
    fn test_first_block_registers_datanode() {
        let pool = round_robin_pool();
        let dn = datanode(1, 0);

        contribute(&pool, dn, 0);
        contribute(&pool, dn, 1);

        assert_eq!(pool.size(), 1);
        let record = pool.get_datanode(dn.key()).unwrap();
        assert!(record.is_online());
        assert_eq!(record.free_block_count(), 2);
    }

    #[test]
    fn test_wrong_class_rejected() {
        let pool = DataNodePool::new(1, SelectionPolicy::RoundRobin, true);
        let block = Arc::new(BlockInfo::new(datanode(1, 0), 0, 4096, 0));
        assert!(matches!(
            pool.add_block(block),
            Err(BlockStoreError::AddBlockFailed(_))
        ));
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn test_get_block_empty_pool() {
        let pool = round_robin_pool();
        assert!(pool.get_block(0).is_none());
    }

    #[test]
    fn test_get_block_rotates_start() {
        let pool = round_robin_pool();
        for i in 1..=3 {
            for addr in 0..2 {
                contribute(&pool, datanode(i, 0), addr);
            }
        }

        let owners: Vec<u8> = (0..3)
            .map(|_| pool.get_block(0).unwrap().datanode().ip_address[3])
            .collect();
        assert_eq!(owners, vec![1, 2, 3]);
    }

    #[test]
    fn test_skips_offline_and_empty() {
        let pool = round_robin_pool();
        let a = datanode(1, 0);
        let b = datanode(2, 0);
        let c = datanode(3, 0);

        for addr in 0..10 {
            contribute(&pool, a, addr);
        }
        contribute(&pool, b, 100);
        pool.get_datanode(b.key()).unwrap().set_online(false);
        // c registers and drains its only block
        contribute(&pool, c, 200);
        pool.get_datanode(c.key())
            .unwrap()
            .get_free_block()
            .unwrap();

        for _ in 0..10 {
            let block = pool.get_block(0).unwrap();
            assert_eq!(block.datanode().key(), a.key());
        }
        assert!(pool.get_block(0).is_none());
    }

    #[test]
    fn test_affinity_preferred_then_fallback() {
        let pool = round_robin_pool();
        let near = datanode(1, 7);
        let far = datanode(2, 0);

        contribute(&pool, near, 1);
        contribute(&pool, far, 2);
        contribute(&pool, far, 3);

        let block = pool.get_block(7).unwrap();
        assert_eq!(block.datanode().key(), near.key());

        // affinity set drained, falls back to the whole pool
        let block = pool.get_block(7).unwrap();
        assert_eq!(block.datanode().key(), far.key());

        // unknown affinity behaves like no affinity
        assert!(pool.get_block(42).is_some());
    }

    #[test]
    fn test_affinity_misses_keep_any_rotation() {
        let pool = round_robin_pool();
        let near = datanode(1, 7);
        contribute(&pool, near, 0);
        pool.get_datanode(near.key())
            .unwrap()
            .get_free_block()
            .unwrap();
        for i in 2..=4 {
            for addr in 0..100 {
                contribute(&pool, datanode(i, 0), addr);
            }
        }

        // every call misses the drained affinity set and sweeps the whole pool
        let mut owners = AHashMap::new();
        for _ in 0..90 {
            let block = pool.get_block(7).unwrap();
            *owners.entry(block.datanode().ip_address[3]).or_insert(0) += 1;
        }

        // start index 0 is the drained node, so its successor also takes that turn
        assert_eq!(owners.get(&2), Some(&46));
        assert_eq!(owners.get(&3), Some(&22));
        assert_eq!(owners.get(&4), Some(&22));
    }

    #[test]
    fn test_affinity_sets_rotate_independently() {
        let pool = round_robin_pool();
        for i in 1..=3 {
            for addr in 0..10 {
                contribute(&pool, datanode(i, 5), addr);
            }
        }
        for i in 4..=5 {
            for addr in 0..10 {
                contribute(&pool, datanode(i, 0), addr);
            }
        }

        let mut owners = Vec::new();
        for _ in 0..3 {
            owners.push(pool.get_block(5).unwrap().datanode().ip_address[3]);
            // interleaved sweeps of the whole pool do not shift the affinity rotation
            pool.get_block(0).unwrap();
        }
        assert_eq!(owners, vec![1, 2, 3]);
    }

    #[test]
    fn test_affinity_lookup_disabled() {
        let pool = DataNodePool::with_selection(0, BlockSelection::round_robin_from(0), false);
        let far = datanode(1, 0);
        let near = datanode(2, 7);
        contribute(&pool, far, 1);
        contribute(&pool, near, 2);

        // start index 0 is the far node; the hint is ignored
        let block = pool.get_block(7).unwrap();
        assert_eq!(block.datanode().key(), far.key());
    }

    #[test]
    fn test_remove_datanode() {
        let pool = round_robin_pool();
        let dn = datanode(1, 3);
        contribute(&pool, dn, 0);

        let record = pool.remove_datanode(&dn).unwrap();
        assert!(!record.is_online());
        assert_eq!(pool.size(), 0);
        assert!(pool.get_block(3).is_none());
        pool.validate().unwrap();

        assert!(matches!(
            pool.remove_datanode(&dn),
            Err(BlockStoreError::DataNodeNotRegistered { .. })
        ));
    }

    #[test]
    fn test_readd_after_removal() {
        let pool = round_robin_pool();
        let dn = datanode(1, 0);
        contribute(&pool, dn, 0);
        pool.remove_datanode(&dn).unwrap();

        contribute(&pool, dn, 1);
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.get_block(0).unwrap().addr(), 1);
    }

    #[test]
    fn test_class_stat() {
        let pool = round_robin_pool();
        for addr in 0..4 {
            contribute(&pool, datanode(1, 0), addr);
        }
        for addr in 0..2 {
            contribute(&pool, datanode(2, 0), addr);
        }
        pool.get_block(0).unwrap();
        pool.get_block(0).unwrap();
        pool.get_block(0).unwrap();

        let stat = pool.class_stat();
        assert_eq!(stat.all_blocks, 6);
        assert_eq!(stat.consumed_blocks, 3);
    }
}
