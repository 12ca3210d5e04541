//! Build an index over one field of a delimited text file.

use crate::Error;
use bigsearch_storage::{
    binary::Encoding,
    index::{index_path, Config, Index},
};
use prometheus_client::registry::Registry;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};
use tracing::{debug, info, warn};

/// Options for [build].
#[derive(Clone, Debug)]
pub struct Options {
    /// Data file to index.
    pub data: PathBuf,
    /// Zero-based field to index.
    pub field: usize,
    /// Field separator.
    pub delimiter: char,
    /// Index configuration.
    pub config: Config,
}

/// Outcome of [build].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    /// Path of the index file created.
    pub index: PathBuf,
    /// Lines added to the index.
    pub indexed: u64,
    /// Lines without the requested field.
    pub skipped: u64,
}

/// Strip the line terminator (`\n` or `\r\n`) from `line`.
pub(crate) fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Value of field `field` of `line` normalized for indexing (lowercased), if present.
fn extract(line: &str, field: usize, delimiter: char) -> Option<String> {
    line.split(delimiter).nth(field).map(str::to_lowercase)
}

/// Create a new index for `options.field` of `options.data`, replacing any existing one.
///
/// Every line is indexed under the byte offset at which it starts. Metrics of the index are
/// registered with `registry`.
pub fn build(options: &Options, registry: &mut Registry) -> Result<Summary, Error> {
    let reader = BufReader::new(File::open(&options.data)?);
    let path = index_path(&options.data, options.field);
    let mut index = Index::create(&path, options.config)?;
    index.register(registry);
    let (indexed, skipped) = scan(
        reader,
        options.field,
        options.delimiter,
        options.config.encoding,
        &mut index,
    )?;
    index.close()?;
    info!(index = %path.display(), indexed, skipped, "built index");

    Ok(Summary {
        index: path,
        indexed,
        skipped,
    })
}

fn scan(
    mut reader: impl BufRead,
    field: usize,
    delimiter: char,
    encoding: Encoding,
    index: &mut Index,
) -> Result<(u64, u64), Error> {
    let mut line = Vec::new();
    let mut offset = 0u64;
    let mut indexed = 0u64;
    let mut skipped = 0u64;
    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        let text = encoding.decode(trim_line(&line));
        match extract(&text, field, delimiter) {
            Some(value) => {
                index.add(&value, offset)?;
                indexed += 1;
            }
            None => {
                warn!(offset, field, "line is missing field, skipping");
                skipped += 1;
            }
        }
        offset += read as u64;
        if indexed > 0 && indexed % 1_000_000 == 0 {
            debug!(indexed, offset, "indexing");
        }
    }
    Ok((indexed, skipped))
}
