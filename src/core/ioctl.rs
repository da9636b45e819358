//! Out-of-band management commands ("IOCtl")
//!
//! Every command and reply is a one-byte opcode followed by a fixed-size
//! payload:
//!
//! ```text
//! NOP               (1)  command: -                  reply: -
//! DN_REMOVE         (2)  command: ipv4[4] port[4]    reply: -
//! NN_GET_CLASS_STAT (3)  command: class[4]           reply: all[8] consumed[8]
//! ```

use crate::error::{BlockStoreError, Result, RpcStatus};
use crate::pool::ClassStat;
use crate::wire::WireReader;
use std::net::Ipv4Addr;

pub const NOP: u8 = 1;
pub const DN_REMOVE: u8 = 2;
pub const NN_GET_CLASS_STAT: u8 = 3;

const OPCODE_SIZE: usize = 1;

/// Management command sent to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlCommand {
    Nop,
    /// Remove a DataNode from whichever storage class it belongs to
    RemoveDataNode { address: Ipv4Addr, port: u32 },
    /// Block counters of one storage class
    GetClassStat { storage_class: u32 },
}

impl IoctlCommand {
    pub fn opcode(&self) -> u8 {
        match self {
            IoctlCommand::Nop => NOP,
            IoctlCommand::RemoveDataNode { .. } => DN_REMOVE,
            IoctlCommand::GetClassStat { .. } => NN_GET_CLASS_STAT,
        }
    }

    fn payload_size(opcode: u8) -> Result<usize> {
        match opcode {
            NOP => Ok(0),
            DN_REMOVE => Ok(8),
            NN_GET_CLASS_STAT => Ok(4),
            other => Err(BlockStoreError::UnknownOpcode(other)),
        }
    }

    /// Encoded size including the opcode byte
    pub fn size(&self) -> usize {
        OPCODE_SIZE + Self::payload_size(self.opcode()).unwrap_or(0)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        bytes.push(self.opcode());
        match self {
            IoctlCommand::Nop => {}
            IoctlCommand::RemoveDataNode { address, port } => {
                bytes.extend_from_slice(&address.octets());
                bytes.extend_from_slice(&port.to_be_bytes());
            }
            IoctlCommand::GetClassStat { storage_class } => {
                bytes.extend_from_slice(&storage_class.to_be_bytes());
            }
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(bytes);
        let opcode = reader.get_u8()?;
        reader.ensure(Self::payload_size(opcode)?)?;

        match opcode {
            NOP => Ok(IoctlCommand::Nop),
            DN_REMOVE => Ok(IoctlCommand::RemoveDataNode {
                address: Ipv4Addr::from(reader.get_array::<4>()?),
                port: reader.get_u32()?,
            }),
            NN_GET_CLASS_STAT => Ok(IoctlCommand::GetClassStat {
                storage_class: reader.get_u32()?,
            }),
            other => Err(BlockStoreError::UnknownOpcode(other)),
        }
    }
}

/// Reply payload, tagged with the opcode it answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlReply {
    Nop,
    DataNodeRemoved,
    ClassStat(ClassStat),
}

impl IoctlReply {
    pub fn opcode(&self) -> u8 {
        match self {
            IoctlReply::Nop => NOP,
            IoctlReply::DataNodeRemoved => DN_REMOVE,
            IoctlReply::ClassStat(_) => NN_GET_CLASS_STAT,
        }
    }

    fn payload_size(opcode: u8) -> Result<usize> {
        match opcode {
            NOP | DN_REMOVE => Ok(0),
            NN_GET_CLASS_STAT => Ok(16),
            other => Err(BlockStoreError::UnknownOpcode(other)),
        }
    }

    pub fn size(&self) -> usize {
        OPCODE_SIZE + Self::payload_size(self.opcode()).unwrap_or(0)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        bytes.push(self.opcode());
        if let IoctlReply::ClassStat(stat) = self {
            bytes.extend_from_slice(&stat.all_blocks.to_be_bytes());
            bytes.extend_from_slice(&stat.consumed_blocks.to_be_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(bytes);
        let opcode = reader.get_u8()?;
        reader.ensure(Self::payload_size(opcode)?)?;

        match opcode {
            NOP => Ok(IoctlReply::Nop),
            DN_REMOVE => Ok(IoctlReply::DataNodeRemoved),
            NN_GET_CLASS_STAT => Ok(IoctlReply::ClassStat(ClassStat {
                all_blocks: reader.get_u64()?,
                consumed_blocks: reader.get_u64()?,
            })),
            other => Err(BlockStoreError::UnknownOpcode(other)),
        }
    }
}

/// Handler outcome: the reply plus the status for the RPC envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoctlResponse {
    pub status: RpcStatus,
    pub reply: IoctlReply,
}

impl IoctlResponse {
    pub fn ok(reply: IoctlReply) -> Self {
        IoctlResponse {
            status: RpcStatus::Ok,
            reply,
        }
    }

    pub fn with_status(status: RpcStatus, reply: IoctlReply) -> Self {
        IoctlResponse { status, reply }
    }
}
