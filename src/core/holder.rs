//! Per-DataNode free block holder
//!
//! The registry lock only protects membership. Everything a record exposes to
//! the allocation path (liveness, the free block queue, counters) is safe for
//! concurrent use on its own, so taking or returning a block never serializes
//! on the structural lock.

use crate::block::BlockInfo;
use crate::datanode::DataNodeInfo;
use chrono::{DateTime, TimeZone, Utc};
use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot reported to a "get DataNode" request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataNodeStatistics {
    /// Identity key of the DataNode
    pub service_id: u64,
    /// Blocks currently available for allocation
    pub free_block_count: u64,
}

/// Registry record for one DataNode
#[derive(Debug)]
pub struct DataNodeBlocks {
    info: DataNodeInfo,
    online: AtomicBool,
    /// Milliseconds since the UNIX epoch, 0 = never touched
    last_touched_ms: AtomicI64,
    free_blocks: SegQueue<Arc<BlockInfo>>,
    /// Every block ever contributed by this DataNode
    total_blocks: AtomicU64,
}

impl DataNodeBlocks {
    /// Create an empty, offline record; the first `touch` brings it online
    pub fn from_datanode_info(info: DataNodeInfo) -> Self {
        DataNodeBlocks {
            info,
            online: AtomicBool::new(false),
            last_touched_ms: AtomicI64::new(0),
            free_blocks: SegQueue::new(),
            total_blocks: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> u64 {
        self.info.key()
    }

    pub fn info(&self) -> &DataNodeInfo {
        &self.info
    }

    pub fn location_class(&self) -> u32 {
        self.info.location_class
    }

    pub fn storage_type(&self) -> u32 {
        self.info.storage_type
    }

    /// Refresh liveness
    pub fn touch(&self) {
        self.last_touched_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        self.online.store(true, Ordering::Release);
    }

    pub fn last_touched(&self) -> Option<DateTime<Utc>> {
        match self.last_touched_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Fence or unfence the node without touching its membership
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn add_free_block(&self, block: Arc<BlockInfo>) {
        self.total_blocks.fetch_add(1, Ordering::Relaxed);
        self.free_blocks.push(block);
    }

    /// Take one free block, if any is queued
    pub fn get_free_block(&self) -> Option<Arc<BlockInfo>> {
        self.free_blocks.pop()
    }

    pub fn free_block_count(&self) -> u64 {
        self.free_blocks.len() as u64
    }

    pub fn total_blocks(&self) -> u64 {
        self.total_blocks.load(Ordering::Relaxed)
    }

    pub fn statistics(&self) -> DataNodeStatistics {
        DataNodeStatistics {
            service_id: self.key(),
            free_block_count: self.free_block_count(),
        }
    }
}
