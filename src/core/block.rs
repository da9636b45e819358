//! Free block descriptors
//!
//! A DataNode contributes capacity as a stream of free blocks. Each block is
//! handed out exactly once. Blocks may be invalidated after they were queued
//! (for example when the contributing DataNode is removed); the `deleted` flag
//! is checked lazily at allocation time instead of revoking queued blocks.

use crate::datanode::{DataNodeInfo, DATANODE_INFO_SIZE};
use crate::error::Result;
use crate::wire::WireReader;
use std::sync::atomic::{AtomicBool, Ordering};

/// Encoded size of a [`BlockInfo`] record
pub const BLOCK_INFO_SIZE: usize = DATANODE_INFO_SIZE + 16;

/// One allocatable unit of storage on a DataNode
#[derive(Debug)]
pub struct BlockInfo {
    datanode: DataNodeInfo,
    /// Remote address of the block on the DataNode
    addr: u64,
    /// Block length in bytes
    length: u32,
    /// Access key the client presents to the DataNode
    lkey: u32,
    deleted: AtomicBool,
}

impl BlockInfo {
    pub fn new(datanode: DataNodeInfo, addr: u64, length: u32, lkey: u32) -> Self {
        BlockInfo {
            datanode,
            addr,
            length,
            lkey,
            deleted: AtomicBool::new(false),
        }
    }

    pub fn datanode(&self) -> &DataNodeInfo {
        &self.datanode
    }

    pub fn addr(&self) -> u64 {
        self.addr
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn lkey(&self) -> u32 {
        self.lkey
    }

    pub fn storage_class(&self) -> u32 {
        self.datanode.storage_class
    }

    /// Invalidate the block; allocation skips it from now on
    pub fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Append the 36-byte wire record to `buf`
    ///
    /// The deleted flag is registry-local state and is not encoded.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        self.datanode.write_to(buf);
        buf.extend_from_slice(&self.addr.to_be_bytes());
        buf.extend_from_slice(&self.length.to_be_bytes());
        buf.extend_from_slice(&self.lkey.to_be_bytes());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BLOCK_INFO_SIZE);
        self.write_to(&mut bytes);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(bytes);
        reader.ensure(BLOCK_INFO_SIZE)?;
        let datanode = DataNodeInfo::read_from(&mut reader)?;
        Ok(BlockInfo::new(
            datanode,
            reader.get_u64()?,
            reader.get_u32()?,
            reader.get_u32()?,
        ))
    }
}
