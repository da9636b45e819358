//! # namenode-blockstore - Block Allocation and DataNode Registry
//!
//! The metadata side of a tiered distributed storage cluster keeps track of
//! which DataNodes exist, which free blocks they currently offer, and hands
//! those blocks out to clients. This crate is that registry:
//!
//! - **Storage classes**: the cluster is split into static tiers (memory,
//!   NVMe, ...), each with its own pool and selection policy
//! - **Concurrent membership**: DataNodes register lazily on their first
//!   contributed block and can be removed at any time
//! - **Fair allocation**: sweeps start at a rotating (or random) index so no
//!   DataNode is drained first on every call
//! - **Locality affinity**: allocation prefers DataNodes of a requested
//!   locality class and falls back to the whole pool
//!
//! ## Quick Start
//!
//! ```rust
//! use namenode_blockstore::{BlockInfo, BlockStoreBuilder, CancellationToken, DataNodeInfo};
//! use std::net::Ipv4Addr;
//! use std::sync::Arc;
//!
//! # fn main() -> namenode_blockstore::Result<()> {
//! let store = BlockStoreBuilder::new().storage_classes(2).build()?;
//!
//! // A DataNode of storage class 1 contributes a free block
//! let dn = DataNodeInfo::new(Ipv4Addr::new(10, 0, 0, 1), 50020, 1, 0, 0);
//! store.add_block(Arc::new(BlockInfo::new(dn, 0x1000, 1 << 20, 7)))?;
//!
//! // A client asks for a block of class 1, no locality preference
//! let block = store.get_block(1, 0, &CancellationToken::new())?;
//! assert_eq!(block.datanode(), &dn);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────── BlockStore ────────────────────────┐
//! │  pools[0]          pools[1]            ...   pools[N-1]    │
//! │  ┌──────────────┐  ┌──────────────┐                        │
//! │  │ DataNodePool │  │ DataNodePool │   one per class        │
//! │  │  selection   │  │  selection   │                        │
//! │  │  any set     │  │  any set     │   IndexedRegistry      │
//! │  │  affinity    │  │  affinity    │   per locality class   │
//! │  └──────┬───────┘  └──────────────┘                        │
//! │         │                                                  │
//! │   DataNodeBlocks (online flag, lock-free free block queue) │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core resolve
#[allow(unused_imports)]
pub(crate) use self::core::{
    block, cancel, config, datanode, error, holder, ioctl, pool, registry, selection, store, wire,
};

pub use crate::core::{
    block::{BlockInfo, BLOCK_INFO_SIZE},
    cancel::CancellationToken,
    config::{BlockStoreConfig, MAX_STORAGE_CLASSES},
    datanode::{identity_key, DataNodeInfo, DATANODE_INFO_SIZE},
    error::{BlockStoreError, Result, RpcStatus},
    holder::{DataNodeBlocks, DataNodeStatistics},
    ioctl::{IoctlCommand, IoctlReply, IoctlResponse},
    pool::{ClassStat, DataNodePool},
    registry::IndexedRegistry,
    selection::{BlockSelection, SelectionPolicy},
    store::{BlockStore, BlockStoreBuilder},
};
