//! A fixed-size array of chain heads persisted in its own file.
//!
//! # Format
//!
//! The file has no header. It holds `buckets` consecutive slots:
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! |        Slot 0 (u64)           |        Slot 1 (u64)           |  ...  |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! ```
//!
//! Each slot is the offset of the first record of the bucket's chain in the
//! [crate::store::Store], or `0` if the bucket is empty. The number of buckets is fixed at
//! creation and must be supplied again when opening.

use crate::{binary, Error};
use std::{
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::Path,
};
use tracing::debug;

/// Size of a single slot.
pub const SLOT_SIZE: u64 = 8;

/// Slot value of an empty bucket.
pub const EMPTY: u64 = 0;

/// Implementation of the bucket table.
pub struct Table {
    file: File,
    buckets: u32,
}

impl Table {
    /// Create a new table at `path` with every bucket empty, replacing any existing file.
    pub fn create(path: &Path, buckets: u32) -> Result<Self, Error> {
        if buckets == 0 {
            return Err(Error::InvalidArgument("bucket count must be positive".into()));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(Self::size(buckets))?;
        debug!(path = %path.display(), buckets, "created bucket table");
        Ok(Self { file, buckets })
    }

    /// Open an existing table at `path` holding exactly `buckets` slots.
    pub fn open(path: &Path, buckets: u32, writable: bool) -> Result<Self, Error> {
        let file = OpenOptions::new().read(true).write(writable).open(path)?;
        let expected = Self::size(buckets);
        let found = file.metadata()?.len();
        if found != expected {
            return Err(Error::InvalidBucketFile { expected, found });
        }
        debug!(path = %path.display(), buckets, writable, "opened bucket table");
        Ok(Self { file, buckets })
    }

    fn size(buckets: u32) -> u64 {
        buckets as u64 * SLOT_SIZE
    }

    fn seek(&mut self, bucket: u32) -> Result<(), Error> {
        if bucket >= self.buckets {
            return Err(Error::InvalidArgument(format!(
                "bucket {bucket} out of range (buckets={})",
                self.buckets
            )));
        }
        self.file.seek(SeekFrom::Start(bucket as u64 * SLOT_SIZE))?;
        Ok(())
    }

    /// Number of buckets.
    pub fn buckets(&self) -> u32 {
        self.buckets
    }

    /// Get the head offset stored for `bucket`.
    pub fn get(&mut self, bucket: u32) -> Result<u64, Error> {
        self.seek(bucket)?;
        let raw = binary::read_exact(&mut self.file, SLOT_SIZE as usize)?;
        Ok(binary::read_u64(&mut raw.as_slice())?)
    }

    /// Set the head offset of `bucket`.
    pub fn set(&mut self, bucket: u32, offset: u64) -> Result<(), Error> {
        let mut buf = Vec::with_capacity(SLOT_SIZE as usize);
        binary::write_u64(&mut buf, offset);
        self.seek(bucket)?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    /// Flush pending writes to disk.
    pub fn sync(&mut self) -> Result<(), Error> {
        self.file.sync_all()?;
        Ok(())
    }
}
