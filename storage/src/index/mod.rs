//! A persistent hash index from field values to offsets in a data file.
//!
//! [Index] maps a value (typically one field of a line in a delimited text file) to the
//! byte offsets of every line carrying that value, so lookups avoid scanning the data file.
//!
//! # Layout
//!
//! An index is made of two files:
//!
//! - The index file ([crate::store::Store]), holding a header (bucket count and hash
//!   algorithm) and every added entry as a node of a singly linked chain.
//! - The bucket file ([crate::table::Table]), holding the offset of the first node of each
//!   bucket's chain.
//!
//! A value is assigned to bucket `crc32(value) mod buckets` (see [crate::hash]). Adding a value
//! appends a node to the index file and links it at the tail of its bucket's chain; querying
//! walks the chain from the head and yields the payload of every node whose value matches.
//!
//! # Naming
//!
//! For a data file `dir/<name>.<ext>` indexed on field `n`, the index file is
//! `dir/<name>.<n>.idx` ([index_path]) and the bucket file is `dir/<name>.<n>.idx.off`
//! ([table_path]). Tools building and querying the same index rely on this convention.
//!
//! # Concurrency
//!
//! There is no locking. At most one process may add to an index at a time, and readers must
//! not run concurrently with a writer.
//!
//! # Example
//!
//! ```rust
//! use bigsearch_storage::index::{Config, Index};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("people.1.idx");
//!
//! // Build the index
//! let mut index = Index::create(&path, Config { bucket_count: 4, ..Default::default() }).unwrap();
//! index.add("apple", 100).unwrap();
//! index.add("banana", 250).unwrap();
//! index.add("apple", 400).unwrap();
//! index.close().unwrap();
//!
//! // Query it later (the bucket count is read back from the index file)
//! let mut index = Index::open(&path, Default::default()).unwrap();
//! let offsets = index.query("apple").unwrap().collect::<Result<Vec<_>, _>>().unwrap();
//! assert_eq!(offsets, vec![100, 400]);
//! ```

mod storage;
pub use storage::{Index, Query};

use crate::binary::Encoding;
use std::path::{Path, PathBuf};

/// Default number of buckets.
pub const DEFAULT_BUCKET_COUNT: u32 = 1024 * 1024;

/// Extension of the index file.
pub const INDEX_EXTENSION: &str = "idx";

/// Suffix appended to the index file name to name the bucket file.
pub const TABLE_SUFFIX: &str = ".off";

/// Configuration for creating an [Index].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Number of buckets, fixed for the lifetime of the index.
    pub bucket_count: u32,

    /// Encoding used to store (and compare) values.
    pub encoding: Encoding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_count: DEFAULT_BUCKET_COUNT,
            encoding: Encoding::default(),
        }
    }
}

/// Path of the index file for field `field` of the data file at `data`.
pub fn index_path(data: &Path, field: usize) -> PathBuf {
    let mut name = data.file_stem().unwrap_or_default().to_os_string();
    name.push(format!(".{field}.{INDEX_EXTENSION}"));
    data.with_file_name(name)
}

/// Path of the bucket file belonging to the index file at `index`.
pub fn table_path(index: &Path) -> PathBuf {
    let mut name = index.as_os_str().to_os_string();
    name.push(TABLE_SUFFIX);
    PathBuf::from(name)
}
