//! Fixed-size big-endian record helpers
//!
//! Records exchanged with the RPC layer use network byte order with no
//! padding and no length prefix.

use crate::error::{BlockStoreError, Result};

/// Forward-only cursor over a received buffer
pub(crate) struct WireReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        WireReader { bytes, offset: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Fail with `BufferTooSmall` unless `needed` bytes are left
    pub(crate) fn ensure(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(BlockStoreError::BufferTooSmall {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    pub(crate) fn get_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let value = self.bytes[self.offset];
        self.offset += 1;
        Ok(value)
    }

    pub(crate) fn get_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.offset..self.offset + N]);
        self.offset += N;
        Ok(out)
    }

    pub(crate) fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.get_array::<4>()?))
    }

    pub(crate) fn get_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.get_array::<8>()?))
    }
}
