//! An append-only file of chained records.
//!
//! # Format
//!
//! The file starts with a fixed [HEADER_SIZE] byte header, followed by records appended
//! one after another:
//!
//! ```text
//! Header (HEADER_SIZE bytes):
//! +---+---+---+---+---+---+---+---+---+---+---+
//! | Buckets (u32) |   Hash (u32)  | 0 ... 0   |
//! +---+---+---+---+---+---+---+---+---+---+---+
//!
//! Record:
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! |    Len (i32)  |  Value ...    |   Payload (u64)   |      Next (u64)       |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! ```
//!
//! `Next` is the offset of the following record in the same chain. Any offset below
//! [HEADER_SIZE] can never address a record, so `0` ([END]) terminates a chain.
//!
//! Records are never removed. The only mutation ever applied to a written record is
//! [Store::patch_next], which overwrites the 8 bytes of `Next` in place (once, when the
//! chain is extended). Because the value and its length never change, the patch never
//! shifts or truncates neighbouring records.

use crate::{binary, hash::Algorithm, Error};
use bytes::{Buf, BufMut, BytesMut};
use commonware_codec::{
    DecodeExt, Encode, EncodeSize, Error as CodecError, FixedSize, Read, Write,
};
use std::{
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom, Write as _},
    path::Path,
};
use tracing::{debug, trace};

/// Size of the reserved header region.
pub const HEADER_SIZE: u64 = 1024;

/// Offset terminating a chain.
pub const END: u64 = 0;

/// Bytes following the value in a record (payload and next).
const TRAILER_SIZE: usize = 16;

/// Fields stored at the start of the header region (the rest is reserved).
#[derive(Debug, Clone, PartialEq)]
struct Header {
    buckets: u32,
    hash: u32,
}

impl FixedSize for Header {
    const SIZE: usize = 8;
}

impl Write for Header {
    fn write(&self, buf: &mut impl BufMut) {
        binary::write_u32(buf, self.buckets);
        binary::write_u32(buf, self.hash);
    }
}

impl Read for Header {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &Self::Cfg) -> Result<Self, CodecError> {
        let buckets = binary::read_u32(buf)?;
        let hash = binary::read_u32(buf)?;
        Ok(Self { buckets, hash })
    }
}

/// Encoded form of a single record.
#[derive(Debug, Clone, PartialEq)]
struct Record {
    value: Vec<u8>,
    payload: u64,
    next: u64,
}

impl Record {
    fn new(value: &[u8], payload: u64) -> Result<Self, Error> {
        binary::string_size(value)?;
        Ok(Self {
            value: value.to_vec(),
            payload,
            next: END,
        })
    }
}

impl Write for Record {
    fn write(&self, buf: &mut impl BufMut) {
        binary::write_string(buf, &self.value);
        binary::write_u64(buf, self.payload);
        binary::write_u64(buf, self.next);
    }
}

impl EncodeSize for Record {
    fn encode_size(&self) -> usize {
        4 + self.value.len() + TRAILER_SIZE
    }
}

impl Read for Record {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &Self::Cfg) -> Result<Self, CodecError> {
        let len = binary::read_len(buf)?;
        let value = binary::read_string(buf, len)?;
        let payload = binary::read_u64(buf)?;
        let next = binary::read_u64(buf)?;
        Ok(Self {
            value,
            payload,
            next,
        })
    }
}

/// A record together with the position it was read from (or written to).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    offset: u64,
    record: Record,
}

impl Node {
    /// Position of the node in the store.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Encoded value bytes.
    pub fn value_bytes(&self) -> &[u8] {
        &self.record.value
    }

    /// Decode the value with `encoding`.
    pub fn value(&self, encoding: binary::Encoding) -> String {
        encoding.decode(&self.record.value)
    }

    /// Offset in the data file carried by this node.
    pub fn payload(&self) -> u64 {
        self.record.payload
    }

    /// Offset of the next node in the chain (or [END]).
    pub fn next(&self) -> u64 {
        self.record.next
    }

    /// Whether the node terminates its chain.
    pub fn is_last(&self) -> bool {
        self.record.next < HEADER_SIZE
    }

    /// Position of the `Next` field.
    fn next_position(&self) -> u64 {
        self.offset + 4 + self.record.value.len() as u64 + 8
    }
}

/// Implementation of the record store.
pub struct Store {
    file: File,
    len: u64,
    buckets: u32,
    hash: Algorithm,
    writable: bool,
}

impl Store {
    /// Create a new store at `path` (replacing any existing file) for an index of `buckets`
    /// buckets hashed with `hash`.
    pub fn create(path: &Path, buckets: u32, hash: Algorithm) -> Result<Self, Error> {
        if buckets == 0 {
            return Err(Error::InvalidArgument("bucket count must be positive".into()));
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        // Reserve the header region and write the leading fields
        let mut buf = BytesMut::zeroed(HEADER_SIZE as usize);
        let header = Header {
            buckets,
            hash: hash.id(),
        }
        .encode();
        buf[..header.len()].copy_from_slice(&header);
        file.write_all(&buf)?;
        debug!(path = %path.display(), buckets, "created record store");

        Ok(Self {
            file,
            len: HEADER_SIZE,
            buckets,
            hash,
            writable: true,
        })
    }

    /// Open an existing store at `path`, recovering the bucket count and hash algorithm
    /// from its header.
    pub fn open(path: &Path, writable: bool) -> Result<Self, Error> {
        let mut file = OpenOptions::new().read(true).write(writable).open(path)?;
        let len = file.metadata()?.len();
        if len < HEADER_SIZE {
            return Err(Error::InvalidIndexFile(format!(
                "{len} bytes is shorter than the {HEADER_SIZE} byte header"
            )));
        }
        let raw = binary::read_exact(&mut file, Header::SIZE)?;
        let header = Header::decode(raw.as_slice())?;
        if header.buckets == 0 {
            return Err(Error::InvalidIndexFile("zero buckets".into()));
        }
        let hash = Algorithm::from_id(header.hash)?;
        debug!(path = %path.display(), buckets = header.buckets, len, writable, "opened record store");

        Ok(Self {
            file,
            len,
            buckets: header.buckets,
            hash,
            writable,
        })
    }

    /// Bucket count recorded in the header.
    pub fn buckets(&self) -> u32 {
        self.buckets
    }

    /// Hash algorithm recorded in the header.
    pub fn hash(&self) -> Algorithm {
        self.hash
    }

    /// Current size of the store (the offset the next node will be written at).
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == HEADER_SIZE
    }

    /// Read the node at `offset`.
    pub fn read(&mut self, offset: u64) -> Result<Node, Error> {
        if offset < HEADER_SIZE {
            return Err(Error::InvalidArgument(format!(
                "offset {offset} is inside the header"
            )));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        let prefix = binary::read_exact(&mut self.file, 4)?;
        let len = binary::read_i32(&mut prefix.as_slice())?;
        let len = usize::try_from(len).map_err(|_| {
            Error::InvalidArgument(format!("negative length {len} in node at {offset}"))
        })?;

        // Refuse to allocate for a length the file cannot hold
        let needed = len + TRAILER_SIZE;
        if offset + 4 + needed as u64 > self.len {
            return Err(Error::UnexpectedEndOfStream(needed));
        }
        let rest = binary::read_exact(&mut self.file, needed)?;
        let record = Record::decode(prefix.as_slice().chain(rest.as_slice()))?;
        trace!(offset, next = record.next, "read node");

        Ok(Node { offset, record })
    }

    /// Append a node holding `value` and `payload` at the end of the store.
    ///
    /// The new node terminates its chain.
    pub fn append(&mut self, value: &[u8], payload: u64) -> Result<Node, Error> {
        if !self.writable {
            return Err(Error::ReadOnly);
        }
        let record = Record::new(value, payload)?;
        let offset = self.len;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&record.encode())?;
        self.len += record.encode_size() as u64;
        trace!(offset, payload, "appended node");

        Ok(Node { offset, record })
    }

    /// Link `node` to the node at `next`, overwriting only its `Next` field.
    ///
    /// A node can only be linked once.
    pub fn patch_next(&mut self, node: &mut Node, next: u64) -> Result<(), Error> {
        if !self.writable {
            return Err(Error::ReadOnly);
        }
        if !node.is_last() {
            return Err(Error::InvalidArgument(format!(
                "node at {} is already linked to {}",
                node.offset,
                node.next()
            )));
        }
        if next < HEADER_SIZE || next >= self.len {
            return Err(Error::InvalidArgument(format!(
                "offset {next} does not address a node"
            )));
        }
        let mut buf = Vec::with_capacity(8);
        binary::write_u64(&mut buf, next);
        self.file.seek(SeekFrom::Start(node.next_position()))?;
        self.file.write_all(&buf)?;
        node.record.next = next;
        trace!(offset = node.offset, next, "linked node");
        Ok(())
    }

    /// Flush pending writes to disk.
    pub fn sync(&mut self) -> Result<(), Error> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::Encoding;
    use commonware_macros::test_traced;
    use std::fs;
    use tempfile::tempdir;

    #[test_traced]
    fn test_header_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        let store = Store::create(&path, 7, Algorithm::Crc32).unwrap();
        assert!(store.is_empty());
        drop(store);

        let raw = fs::read(&path).unwrap();
        assert_eq!(raw.len() as u64, HEADER_SIZE);
        assert_eq!(i32::from_le_bytes(raw[..4].try_into().unwrap()), 7);
        assert_eq!(u32::from_le_bytes(raw[4..8].try_into().unwrap()), 1);
        assert!(raw[8..].iter().all(|&b| b == 0));

        let store = Store::open(&path, false).unwrap();
        assert_eq!(store.buckets(), 7);
        assert_eq!(store.hash(), Algorithm::Crc32);
        assert_eq!(store.len(), HEADER_SIZE);
    }

    #[test_traced]
    fn test_header_codec() {
        let header = Header {
            buckets: 7,
            hash: Algorithm::Crc32.id(),
        };
        let encoded = header.encode();
        assert_eq!(encoded.len(), Header::SIZE);
        assert_eq!(&encoded[..], &[7, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(Header::decode(encoded).unwrap(), header);

        assert!(matches!(
            Header::decode(&[7u8, 0, 0, 0, 1, 0, 0][..]),
            Err(CodecError::EndOfBuffer)
        ));
    }

    #[test_traced]
    fn test_open_short_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        fs::write(&path, vec![0u8; HEADER_SIZE as usize - 1]).unwrap();
        assert!(matches!(
            Store::open(&path, false),
            Err(Error::InvalidIndexFile(_))
        ));
    }

    #[test_traced]
    fn test_open_bad_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        // Zero buckets
        fs::write(&path, vec![0u8; HEADER_SIZE as usize]).unwrap();
        assert!(matches!(
            Store::open(&path, false),
            Err(Error::InvalidIndexFile(_))
        ));

        // Unknown hash algorithm
        let mut raw = vec![0u8; HEADER_SIZE as usize];
        raw[..4].copy_from_slice(&4u32.to_le_bytes());
        raw[4..8].copy_from_slice(&42u32.to_le_bytes());
        fs::write(&path, raw).unwrap();
        assert!(matches!(
            Store::open(&path, false),
            Err(Error::UnsupportedHash(42))
        ));
    }

    #[test_traced]
    fn test_append_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        let mut store = Store::create(&path, 4, Algorithm::Crc32).unwrap();

        let first = store.append(b"apple", 100).unwrap();
        assert_eq!(first.offset(), HEADER_SIZE);
        assert!(first.is_last());
        let second = store.append(b"", 250).unwrap();
        assert_eq!(second.offset(), HEADER_SIZE + 4 + 5 + 16);
        assert_eq!(store.len(), second.offset() + 4 + 16);

        let read = store.read(first.offset()).unwrap();
        assert_eq!(read, first);
        assert_eq!(read.value(Encoding::Utf8), "apple");
        assert_eq!(read.payload(), 100);
        assert_eq!(read.next(), END);

        let read = store.read(second.offset()).unwrap();
        assert_eq!(read.value_bytes(), b"");
        assert_eq!(read.payload(), 250);

        // Layout on disk
        drop(store);
        let raw = fs::read(&path).unwrap();
        let node = &raw[HEADER_SIZE as usize..];
        assert_eq!(&node[..4], &5i32.to_le_bytes());
        assert_eq!(&node[4..9], b"apple");
        assert_eq!(&node[9..17], &100u64.to_le_bytes());
        assert_eq!(&node[17..25], &0u64.to_le_bytes());
    }

    #[test_traced]
    fn test_patch_next_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        let mut store = Store::create(&path, 4, Algorithm::Crc32).unwrap();
        let mut first = store.append(b"apple", 100).unwrap();
        let second = store.append(b"banana", 250).unwrap();
        store.sync().unwrap();
        let before = fs::read(&path).unwrap();

        store.patch_next(&mut first, second.offset()).unwrap();
        assert_eq!(first.next(), second.offset());
        assert!(!first.is_last());
        store.sync().unwrap();
        let after = fs::read(&path).unwrap();

        // Only the 8 bytes of the next field changed
        assert_eq!(before.len(), after.len());
        let next_at = (HEADER_SIZE + 4 + 5 + 8) as usize;
        assert_eq!(&before[..next_at], &after[..next_at]);
        assert_eq!(&before[next_at + 8..], &after[next_at + 8..]);
        assert_eq!(&after[next_at..next_at + 8], &second.offset().to_le_bytes());

        // Linking twice is rejected
        assert!(matches!(
            store.patch_next(&mut first, second.offset()),
            Err(Error::InvalidArgument(_))
        ));

        // Linking to something that is not a node is rejected
        let mut second = store.read(second.offset()).unwrap();
        assert!(matches!(
            store.patch_next(&mut second, 10),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            store.patch_next(&mut second, store.len()),
            Err(Error::InvalidArgument(_))
        ));

        // Persisted
        drop(store);
        let mut store = Store::open(&path, false).unwrap();
        assert_eq!(store.read(HEADER_SIZE).unwrap().next(), first.next());
    }

    #[test_traced]
    fn test_read_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        let mut store = Store::create(&path, 4, Algorithm::Crc32).unwrap();
        let node = store.append(b"apple", 100).unwrap();
        drop(store);

        // Chop off the last byte of the node
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(HEADER_SIZE + 4 + 5 + 16 - 1).unwrap();
        drop(file);

        let mut store = Store::open(&path, false).unwrap();
        assert!(matches!(
            store.read(node.offset()),
            Err(Error::UnexpectedEndOfStream(_))
        ));

        // Chop inside the length prefix
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(HEADER_SIZE + 2).unwrap();
        drop(file);
        let mut store = Store::open(&path, false).unwrap();
        assert!(matches!(
            store.read(node.offset()),
            Err(Error::UnexpectedEndOfStream(4))
        ));
    }

    #[test_traced]
    fn test_read_negative_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        drop(Store::create(&path, 4, Algorithm::Crc32).unwrap());
        let mut raw = fs::read(&path).unwrap();
        raw.extend_from_slice(&(-5i32).to_le_bytes());
        raw.extend_from_slice(&[0u8; 16]);
        fs::write(&path, raw).unwrap();

        let mut store = Store::open(&path, false).unwrap();
        assert!(matches!(
            store.read(HEADER_SIZE),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test_traced]
    fn test_read_inside_header() {
        let dir = tempdir().unwrap();
        let mut store = Store::create(&dir.path().join("store"), 4, Algorithm::Crc32).unwrap();
        assert!(matches!(store.read(END), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            store.read(HEADER_SIZE - 1),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test_traced]
    fn test_read_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        let mut store = Store::create(&path, 4, Algorithm::Crc32).unwrap();
        let mut node = store.append(b"apple", 100).unwrap();
        drop(store);

        let mut store = Store::open(&path, false).unwrap();
        assert!(matches!(store.append(b"banana", 1), Err(Error::ReadOnly)));
        assert!(matches!(
            store.patch_next(&mut node, HEADER_SIZE),
            Err(Error::ReadOnly)
        ));

        // Reopen for writing and keep appending
        let mut store = Store::open(&path, true).unwrap();
        let next = store.append(b"banana", 250).unwrap();
        assert_eq!(next.offset(), HEADER_SIZE + 4 + 5 + 16);
    }
}
