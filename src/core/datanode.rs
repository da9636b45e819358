//! DataNode identity
//!
//! A DataNode is identified on the wire by its IPv4 address and port plus the
//! storage class, storage type and locality class it serves. Only address and
//! port take part in the identity key; the class fields route the node to its
//! partition and affinity set.

use crate::error::Result;
use crate::wire::WireReader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Encoded size of a [`DataNodeInfo`] record
pub const DATANODE_INFO_SIZE: usize = 20;

/// Derive the 64-bit identity key of an address/port pair
///
/// The address occupies the upper 32 bits and the port the lower 32 bits, so
/// distinct pairs never collide.
pub fn identity_key(ip_address: [u8; 4], port: u32) -> u64 {
    ((u32::from_be_bytes(ip_address) as u64) << 32) | port as u64
}

/// Immutable DataNode identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataNodeInfo {
    /// Storage technology of the node (opaque to the registry)
    pub storage_type: u32,

    /// Storage class partition this node contributes to
    pub storage_class: u32,

    /// Locality class used for affinity-driven allocation (0 = none)
    pub location_class: u32,

    /// IPv4 address in network byte order
    pub ip_address: [u8; 4],

    /// Service port
    pub port: u32,
}

impl DataNodeInfo {
    pub fn new(
        ip: Ipv4Addr,
        port: u32,
        storage_class: u32,
        storage_type: u32,
        location_class: u32,
    ) -> Self {
        DataNodeInfo {
            storage_type,
            storage_class,
            location_class,
            ip_address: ip.octets(),
            port,
        }
    }

    /// Identity key, stable for the lifetime of the registration
    pub fn key(&self) -> u64 {
        identity_key(self.ip_address, self.port)
    }

    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ip_address)
    }

    /// Append the 20-byte wire record to `buf`
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.storage_type.to_be_bytes());
        buf.extend_from_slice(&self.storage_class.to_be_bytes());
        buf.extend_from_slice(&self.location_class.to_be_bytes());
        buf.extend_from_slice(&self.ip_address);
        buf.extend_from_slice(&self.port.to_be_bytes());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(DATANODE_INFO_SIZE);
        self.write_to(&mut bytes);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut WireReader::new(bytes))
    }

    pub(crate) fn read_from(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.ensure(DATANODE_INFO_SIZE)?;
        Ok(DataNodeInfo {
            storage_type: reader.get_u32()?,
            storage_class: reader.get_u32()?,
            location_class: reader.get_u32()?,
            ip_address: reader.get_array::<4>()?,
            port: reader.get_u32()?,
        })
    }
}

impl fmt::Display for DataNodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip(), self.port)
    }
}
