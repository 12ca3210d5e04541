//! Build and query field indexes over delimited text files.
//!
//! Two binaries wrap this library:
//!
//! - `bigsearch-build <data> <field>` scans the data file once and indexes the (lowercased)
//!   value of field `field` of every line, keyed to the byte offset the line starts at.
//! - `bigsearch-query <data> <field> [term]` looks `term` up and prints every matching line
//!   of the data file. Without a term, it prompts for terms until an empty line is entered.
//!
//! Both locate the index next to the data file with
//! [bigsearch_storage::index::index_path].

use std::str::FromStr;
use thiserror::Error;
use tracing::Level;

pub mod builder;
pub mod search;

/// Errors that can occur when building or querying an index.
#[derive(Debug, Error)]
pub enum Error {
    #[error("index error: {0}")]
    Index(#[from] bigsearch_storage::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unable to encode metrics")]
    Metrics(#[from] std::fmt::Error),
}

/// Install a `fmt` subscriber writing to stderr (stdout carries results).
pub fn init_logging(level: &str) -> Result<(), Error> {
    let level = Level::from_str(level)
        .map_err(|_| Error::InvalidArgument(format!("unknown log level: {level}")))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Render the metrics in `registry` in the prometheus text format.
pub fn render_metrics(registry: &prometheus_client::registry::Registry) -> Result<String, Error> {
    let mut buffer = String::new();
    prometheus_client::encoding::text::encode(&mut buffer, registry)?;
    Ok(buffer)
}
