//! Block allocation and DataNode membership core
//!
//! Leaves first:
//!
//! - [`selection`] - start-index strategies (round-robin, random)
//! - [`registry`] - concurrent indexed registry of DataNode records
//! - [`holder`] - per-DataNode free block holder
//! - [`pool`] - allocation pool of one storage class
//! - [`store`] - dispatcher over all storage classes
//! - [`ioctl`] - management command codec and replies

pub mod block;
pub mod cancel;
pub mod config;
pub mod datanode;
pub mod error;
pub mod holder;
pub mod ioctl;
pub mod pool;
pub mod registry;
pub mod selection;
pub mod store;
pub(crate) mod wire;
