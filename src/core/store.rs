//! Block store: dispatcher over the storage class pools
//!
//! Routes registration, removal and lookups to the pool of the storage class a
//! DataNode declares, and implements cross-class fallback for allocation.
//!
//! # Storage class validation
//!
//! Allocation tolerates an out-of-range class by sweeping every pool. Every
//! other class-targeted operation rejects it: `add_block` with
//! `AddBlockFailed`, the rest with `InvalidStorageClass`.

use crate::block::BlockInfo;
use crate::cancel::CancellationToken;
use crate::config::BlockStoreConfig;
use crate::datanode::{identity_key, DataNodeInfo};
use crate::error::{BlockStoreError, Result, RpcStatus};
use crate::holder::DataNodeBlocks;
use crate::ioctl::{IoctlCommand, IoctlReply, IoctlResponse};
use crate::pool::{ClassStat, DataNodePool};
use crate::selection::SelectionPolicy;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry of all storage classes
#[derive(Debug)]
pub struct BlockStore {
    pools: Vec<DataNodePool>,
}

impl BlockStore {
    pub fn new(config: &BlockStoreConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Creating block store with {} storage classes, {} block selection",
            config.storage_classes, config.block_selection
        );
        let pools = (0..config.storage_classes as u32)
            .map(|class| {
                DataNodePool::new(class, config.block_selection, config.affinity_lookup)
            })
            .collect();
        Ok(BlockStore { pools })
    }

    /// Assemble a store from pre-built pools; pool `i` must serve class `i`
    pub fn from_pools(pools: Vec<DataNodePool>) -> Result<Self> {
        if pools.is_empty() {
            return Err(BlockStoreError::InvalidConfig(
                "block store needs at least one storage class".to_string(),
            ));
        }
        if let Some((i, pool)) = pools
            .iter()
            .enumerate()
            .find(|(i, pool)| pool.storage_class() != *i as u32)
        {
            return Err(BlockStoreError::InvalidConfig(format!(
                "pool at position {} serves storage class {}",
                i,
                pool.storage_class()
            )));
        }
        Ok(BlockStore { pools })
    }

    pub fn storage_classes(&self) -> usize {
        self.pools.len()
    }

    pub fn pool(&self, storage_class: u32) -> Result<&DataNodePool> {
        self.pools
            .get(storage_class as usize)
            .ok_or(BlockStoreError::InvalidStorageClass {
                class: storage_class,
                configured: self.pools.len(),
            })
    }

    /// Queue a free block in the pool of its DataNode's storage class
    pub fn add_block(&self, block: Arc<BlockInfo>) -> Result<()> {
        let class = block.storage_class();
        let pool = self.pool(class).map_err(|_| {
            BlockStoreError::AddBlockFailed(format!(
                "DataNode {} declares storage class {}, only {} configured",
                block.datanode(),
                class,
                self.pools.len()
            ))
        })?;
        pool.add_block(block)
    }

    /// Stop offering a DataNode's blocks
    ///
    /// Blocks already handed out are not revoked.
    pub fn remove_datanode(&self, info: &DataNodeInfo) -> Result<()> {
        self.pool(info.storage_class)?.remove_datanode(info)?;
        Ok(())
    }

    /// Remove a DataNode known only by address and port
    ///
    /// The DataNode is removed from every class it is registered in.
    pub fn remove_datanode_by_address(&self, address: Ipv4Addr, port: u32) -> Result<()> {
        let key = identity_key(address.octets(), port);
        let mut removed = false;
        let mut first_error = None;
        // A failing class must not keep the node registered in the others
        for pool in &self.pools {
            match pool.remove_key(key) {
                Ok(record) => removed |= record.is_some(),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        if removed {
            Ok(())
        } else {
            info!("DataNode {}:{} not found", address, port);
            Err(BlockStoreError::DataNodeNotRegistered { key })
        }
    }

    pub fn get_datanode(&self, info: &DataNodeInfo) -> Result<Option<Arc<DataNodeBlocks>>> {
        Ok(self.pool(info.storage_class)?.get_datanode(info.key()))
    }

    /// One allocation sweep, no retry
    ///
    /// Tries `storage_class` first when it is non-zero and configured, then
    /// every class in ascending order. May return a deleted block; the caller
    /// decides what to do with it.
    pub fn try_get_block(&self, storage_class: u32, affinity: u32) -> Option<Arc<BlockInfo>> {
        if storage_class as usize >= self.pools.len() {
            warn!(
                "requested storage class {} is not configured ({} classes), falling back",
                storage_class,
                self.pools.len()
            );
        }
        self.sweep(storage_class, affinity)
    }

    /// Allocate a non-deleted block, retrying until one is found
    ///
    /// Spins without backoff while no pool offers a usable block. The token is
    /// checked before every sweep; cancellation returns `Cancelled` without
    /// having taken a block.
    pub fn get_block(
        &self,
        storage_class: u32,
        affinity: u32,
        cancel: &CancellationToken,
    ) -> Result<Arc<BlockInfo>> {
        if storage_class as usize >= self.pools.len() {
            warn!(
                "requested storage class {} is not configured ({} classes), falling back",
                storage_class,
                self.pools.len()
            );
        }

        loop {
            if cancel.is_cancelled() {
                debug!("allocation from storage class {} cancelled", storage_class);
                return Err(BlockStoreError::Cancelled);
            }
            match self.sweep(storage_class, affinity) {
                Some(block) if !block.is_deleted() => return Ok(block),
                Some(block) => {
                    debug!(
                        "discarding deleted block {:#x} of DataNode {}",
                        block.addr(),
                        block.datanode()
                    );
                }
                None => std::hint::spin_loop(),
            }
        }
    }

    pub fn class_stat(&self, storage_class: u32) -> Result<ClassStat> {
        Ok(self.pool(storage_class)?.class_stat())
    }

    /// Execute a management command
    pub fn ioctl(&self, command: &IoctlCommand) -> IoctlResponse {
        debug!("ioctl {:?}", command);
        match *command {
            IoctlCommand::Nop => IoctlResponse::ok(IoctlReply::Nop),
            IoctlCommand::RemoveDataNode { address, port } => {
                let result = self.remove_datanode_by_address(address, port);
                IoctlResponse::with_status(RpcStatus::from(&result), IoctlReply::DataNodeRemoved)
            }
            IoctlCommand::GetClassStat { storage_class } => match self.class_stat(storage_class) {
                Ok(stat) => IoctlResponse::ok(IoctlReply::ClassStat(stat)),
                Err(e) => IoctlResponse::with_status(
                    RpcStatus::from(&e),
                    IoctlReply::ClassStat(ClassStat::default()),
                ),
            },
        }
    }

    /// Check map/index consistency of every pool
    pub fn validate(&self) -> Result<()> {
        self.pools.iter().try_for_each(DataNodePool::validate)
    }

    fn sweep(&self, storage_class: u32, affinity: u32) -> Option<Arc<BlockInfo>> {
        let requested = match self.pools.get(storage_class as usize) {
            Some(pool) if storage_class > 0 => pool.get_block(affinity),
            _ => None,
        };
        requested.or_else(|| self.pools.iter().find_map(|pool| pool.get_block(affinity)))
    }
}

/// Builder for [`BlockStore`]
///
/// ```
/// use namenode_blockstore::{BlockStoreBuilder, SelectionPolicy};
///
/// let store = BlockStoreBuilder::new()
///     .storage_classes(3)
///     .block_selection(SelectionPolicy::Random)
///     .build()
///     .unwrap();
/// assert_eq!(store.storage_classes(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BlockStoreBuilder {
    config: BlockStoreConfig,
}

impl BlockStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: BlockStoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn storage_classes(mut self, storage_classes: usize) -> Self {
        self.config.storage_classes = storage_classes;
        self
    }

    pub fn block_selection(mut self, policy: SelectionPolicy) -> Self {
        self.config.block_selection = policy;
        self
    }

    pub fn affinity_lookup(mut self, enabled: bool) -> Self {
        self.config.affinity_lookup = enabled;
        self
    }

    pub fn build(self) -> Result<BlockStore> {
        BlockStore::new(&self.config)
    }
}
