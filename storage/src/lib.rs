//! Persist and query a single-field hash index over a delimited text file.
//!
//! An index maps the value of one field to the byte offsets of every line in the
//! data file carrying that value. It is made of two files that live next to the data
//! file (see [index::index_path] and [index::table_path]):
//!
//! - A [table::Table] of fixed-size bucket slots, each pointing at the head of a chain.
//! - A [store::Store] of append-only records, each linking to the next record in its chain.
//!
//! [index::Index] composes both and is the only type most callers need.
//!
//! # Status
//!
//! `bigsearch-storage` assumes a single writer. Concurrent readers are safe as long as no
//! writer is active.

use thiserror::Error;

pub mod binary;
pub mod hash;
pub mod index;
pub mod store;
pub mod table;

/// Errors that can occur when interacting with an index.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] commonware_codec::Error),
    #[error("invalid index file: {0}")]
    InvalidIndexFile(String),
    #[error("invalid bucket file: expected {expected} bytes, found {found}")]
    InvalidBucketFile { expected: u64, found: u64 },
    #[error("unexpected end of stream: wanted {0} bytes")]
    UnexpectedEndOfStream(usize),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedHash(u32),
    #[error("value cannot be represented in {0}")]
    Unencodable(binary::Encoding),
    #[error("index opened read-only")]
    ReadOnly,
}
