use super::{table_path, Config};
use crate::{
    binary::Encoding,
    hash::Algorithm,
    store::{Store, END, HEADER_SIZE},
    table::Table,
    Error,
};
use prometheus_client::{metrics::counter::Counter, registry::Registry};
use std::{iter::FusedIterator, path::Path};
use tracing::{debug, trace};

/// Implementation of `Index` storage.
pub struct Index {
    // Append-only chained records (opened first, it carries the bucket count)
    store: Store,

    // Chain heads, one per bucket
    table: Table,

    encoding: Encoding,
    hash: Algorithm,
    writable: bool,

    // Metrics
    adds: Counter,
    queries: Counter,
    nodes_read: Counter,
}

impl Index {
    /// Create a new `Index` at `path`, replacing any index already there.
    ///
    /// The bucket table is created alongside at [table_path].
    pub fn create(path: impl AsRef<Path>, cfg: Config) -> Result<Self, Error> {
        let path = path.as_ref();
        let hash = Algorithm::default();
        let store = Store::create(path, cfg.bucket_count, hash)?;

        // If the table cannot be created, `store` is dropped (and closed) on return
        let table = Table::create(&table_path(path), cfg.bucket_count)?;
        debug!(path = %path.display(), buckets = cfg.bucket_count, encoding = %cfg.encoding, "created index");

        Ok(Self::new(store, table, cfg.encoding, true))
    }

    /// Open an existing `Index` at `path` for querying.
    ///
    /// The bucket count is recovered from the index header. `encoding` must match the one
    /// the index was created with.
    pub fn open(path: impl AsRef<Path>, encoding: Encoding) -> Result<Self, Error> {
        Self::init(path.as_ref(), encoding, false)
    }

    /// Open an existing `Index` at `path` for querying and adding more values.
    pub fn append(path: impl AsRef<Path>, encoding: Encoding) -> Result<Self, Error> {
        Self::init(path.as_ref(), encoding, true)
    }

    fn init(path: &Path, encoding: Encoding, writable: bool) -> Result<Self, Error> {
        let store = Store::open(path, writable)?;

        // If the table cannot be opened, `store` is dropped (and closed) on return
        let table = Table::open(&table_path(path), store.buckets(), writable)?;
        debug!(
            path = %path.display(),
            buckets = store.buckets(),
            len = store.len(),
            writable,
            "opened index"
        );

        Ok(Self::new(store, table, encoding, writable))
    }

    fn new(store: Store, table: Table, encoding: Encoding, writable: bool) -> Self {
        let hash = store.hash();
        Self {
            store,
            table,
            encoding,
            hash,
            writable,
            adds: Counter::default(),
            queries: Counter::default(),
            nodes_read: Counter::default(),
        }
    }

    /// Register the metrics of this `Index` with `registry`.
    pub fn register(&self, registry: &mut Registry) {
        registry.register("adds", "Number of values added", self.adds.clone());
        registry.register("queries", "Number of queries started", self.queries.clone());
        registry.register(
            "nodes_read",
            "Number of nodes read while walking chains",
            self.nodes_read.clone(),
        );
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> u32 {
        self.table.buckets()
    }

    /// Encoding used for values.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Bucket `value` maps to.
    pub fn bucket(&self, value: &str) -> Result<u32, Error> {
        let bytes = self.encoding.encode(value)?;
        Ok(self.hash.bucket(&bytes, self.table.buckets()))
    }

    /// Add `value`, found at `payload` in the data file.
    ///
    /// The new entry is placed at the end of its bucket's chain, so entries of a chain are
    /// always returned in insertion order. Adding requires walking the entire chain.
    pub fn add(&mut self, value: &str, payload: u64) -> Result<(), Error> {
        if !self.writable {
            return Err(Error::ReadOnly);
        }
        let bytes = self.encoding.encode(value)?;
        let bucket = self.hash.bucket(&bytes, self.table.buckets());
        let head = self.table.get(bucket)?;

        // Empty bucket: the new node becomes the head
        if head < HEADER_SIZE {
            let node = self.store.append(&bytes, payload)?;
            self.table.set(bucket, node.offset())?;
            self.adds.inc();
            trace!(bucket, offset = node.offset(), payload, "started chain");
            return Ok(());
        }

        // Find the tail of the chain
        let mut tail = self.store.read(head)?;
        let mut hops = 1u64;
        while !tail.is_last() {
            tail = self.store.read(tail.next())?;
            hops += 1;
        }
        self.nodes_read.inc_by(hops);

        // Append and link
        let node = self.store.append(&bytes, payload)?;
        self.store.patch_next(&mut tail, node.offset())?;
        self.adds.inc();
        trace!(bucket, offset = node.offset(), payload, hops, "extended chain");
        Ok(())
    }

    /// Lazily find the payloads of every entry whose value equals `value`, in insertion
    /// order.
    ///
    /// Nodes are only read as the returned [Query] is advanced, so stopping early only pays
    /// for a prefix of the chain. Each call walks the chain again from its head. A value the
    /// index encoding cannot represent matches nothing.
    pub fn query(&mut self, value: &str) -> Result<Query<'_>, Error> {
        self.queries.inc();
        let (target, head) = match self.encoding.encode(value) {
            Ok(target) => {
                let target = target.into_owned();
                let bucket = self.hash.bucket(&target, self.table.buckets());
                let head = self.table.get(bucket)?;
                trace!(bucket, head, "started query");
                (target, head)
            }

            // A value the encoding cannot represent was never added
            Err(Error::Unencodable(encoding)) => {
                trace!(%encoding, "query value not encodable");
                (Vec::new(), END)
            }
            Err(err) => return Err(err),
        };

        Ok(Query {
            store: &mut self.store,
            target,
            next: head,
            nodes_read: &self.nodes_read,
        })
    }

    /// Flush pending writes of both files to disk.
    pub fn sync(&mut self) -> Result<(), Error> {
        if !self.writable {
            return Ok(());
        }
        self.store.sync()?;
        self.table.sync()
    }

    /// Close the `Index`, syncing any pending writes.
    ///
    /// Dropping an `Index` also releases its files but discards sync errors.
    pub fn close(mut self) -> Result<(), Error> {
        self.sync()
    }
}

/// Payloads matching a value, produced by [Index::query].
///
/// Yields `Err` at most once: the walk stops after the first failure.
pub struct Query<'a> {
    store: &'a mut Store,
    target: Vec<u8>,
    next: u64,
    nodes_read: &'a Counter,
}

impl Iterator for Query<'_> {
    type Item = Result<u64, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next >= HEADER_SIZE {
            let node = match self.store.read(self.next) {
                Ok(node) => node,
                Err(err) => {
                    self.next = END;
                    return Some(Err(err));
                }
            };
            self.nodes_read.inc();
            self.next = node.next();
            if node.value_bytes() == self.target.as_slice() {
                return Some(Ok(node.payload()));
            }
        }
        None
    }
}

impl FusedIterator for Query<'_> {}
