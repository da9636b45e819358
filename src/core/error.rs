use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockStoreError {
    #[error("DataNode not registered: key {key:#018x}")]
    DataNodeNotRegistered { key: u64 },

    #[error("Add block failed: {0}")]
    AddBlockFailed(String),

    #[error("Invalid storage class {class} (configured classes: {configured})")]
    InvalidStorageClass { class: u32, configured: usize },

    #[error("Registry of storage class {class} is corrupted: map holds {map_len} entries, index holds {index_len}")]
    RegistryCorrupted {
        class: u32,
        map_len: usize,
        index_len: usize,
    },

    #[error("Block allocation cancelled")]
    Cancelled,

    #[error("Buffer too small: remaining {remaining} bytes, expected {needed} bytes")]
    BufferTooSmall { needed: usize, remaining: usize },

    #[error("Unknown IOCtl opcode: {0}")]
    UnknownOpcode(u8),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, BlockStoreError>;

/// Status codes reported to the RPC layer
///
/// Recoverable conditions travel as one of these codes in the response
/// envelope; the RPC layer never sees a Rust error type.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcStatus {
    Ok = 0,
    AddBlockFailed = 1,
    DataNodeNotRegistered = 2,
    InvalidStorageClass = 3,
    Internal = 4,
}

impl RpcStatus {
    /// Parse a status code read off the wire
    ///
    /// Unknown values map to `Internal`.
    pub fn from_i16(value: i16) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::AddBlockFailed,
            2 => Self::DataNodeNotRegistered,
            3 => Self::InvalidStorageClass,
            _ => Self::Internal,
        }
    }

    pub fn is_ok(self) -> bool {
        self == RpcStatus::Ok
    }
}

impl From<&BlockStoreError> for RpcStatus {
    fn from(err: &BlockStoreError) -> Self {
        match err {
            BlockStoreError::DataNodeNotRegistered { .. } => RpcStatus::DataNodeNotRegistered,
            BlockStoreError::AddBlockFailed(_) => RpcStatus::AddBlockFailed,
            BlockStoreError::InvalidStorageClass { .. } => RpcStatus::InvalidStorageClass,
            _ => RpcStatus::Internal,
        }
    }
}

impl<T> From<&Result<T>> for RpcStatus {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => RpcStatus::Ok,
            Err(e) => RpcStatus::from(e),
        }
    }
}
