//! Bucket selection.
//!
//! Values are mapped to buckets with CRC-32/IEEE (the reflected `0x04C11DB7` polynomial)
//! over their encoded bytes. The function is fully specified, so an index built by one
//! process can be queried by another (on another machine, built by another compiler).
//! The algorithm in use is recorded in the index header by its [Algorithm::id].

use crate::Error;

/// Hash algorithms understood by this crate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Algorithm {
    /// CRC-32/IEEE.
    #[default]
    Crc32,
}

impl Algorithm {
    /// Identifier persisted in the index header.
    pub fn id(&self) -> u32 {
        match self {
            Algorithm::Crc32 => 1,
        }
    }

    /// Resolve a persisted identifier.
    pub fn from_id(id: u32) -> Result<Self, Error> {
        match id {
            1 => Ok(Algorithm::Crc32),
            other => Err(Error::UnsupportedHash(other)),
        }
    }

    /// Hash `data`.
    #[inline]
    pub fn checksum(&self, data: &[u8]) -> u32 {
        match self {
            Algorithm::Crc32 => crc32fast::hash(data),
        }
    }

    /// Map `data` to a bucket in `[0, buckets)`.
    ///
    /// `buckets` must be non-zero.
    #[inline]
    pub fn bucket(&self, data: &[u8], buckets: u32) -> u32 {
        self.checksum(data) % buckets
    }
}
