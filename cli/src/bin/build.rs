//! Build an index over one field of a delimited text file.

use bigsearch_cli::{
    builder::{build, Options},
    init_logging, render_metrics, Error,
};
use bigsearch_storage::{binary::Encoding, index::Config};
use clap::{value_parser, Arg, ArgAction, Command};
use prometheus_client::registry::Registry;
use std::path::PathBuf;
use tracing::error;

fn main() {
    // Parse arguments
    let matches = Command::new("bigsearch-build")
        .about("index one field of a delimited text file")
        .arg(
            Arg::new("data")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Data file to index"),
        )
        .arg(
            Arg::new("field")
                .required(true)
                .value_parser(value_parser!(usize))
                .help("Zero-based index of the field to index"),
        )
        .arg(
            Arg::new("delimiter")
                .long("delimiter")
                .default_value(",")
                .value_parser(value_parser!(char))
                .help("Field separator"),
        )
        .arg(
            Arg::new("buckets")
                .long("buckets")
                // index::DEFAULT_BUCKET_COUNT
                .default_value("1048576")
                .value_parser(value_parser!(u32).range(1..))
                .help("Number of hash buckets"),
        )
        .arg(
            Arg::new("encoding")
                .long("encoding")
                .default_value("utf8")
                .help("Text encoding of the data file (utf8 or latin1)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .default_value("info")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("metrics")
                .long("metrics")
                .action(ArgAction::SetTrue)
                .help("Print index metrics to stderr when done"),
        )
        .get_matches();

    let log_level = matches.get_one::<String>("log-level").unwrap();
    if let Err(err) = init_logging(log_level) {
        eprintln!("{err}");
        std::process::exit(2);
    }

    if let Err(err) = run(&matches) {
        error!(?err, "build failed");
        std::process::exit(1);
    }
}

fn run(matches: &clap::ArgMatches) -> Result<(), Error> {
    let encoding = matches
        .get_one::<String>("encoding")
        .unwrap()
        .parse::<Encoding>()?;
    let options = Options {
        data: matches.get_one::<PathBuf>("data").unwrap().clone(),
        field: *matches.get_one::<usize>("field").unwrap(),
        delimiter: *matches.get_one::<char>("delimiter").unwrap(),
        config: Config {
            bucket_count: *matches.get_one::<u32>("buckets").unwrap(),
            encoding,
        },
    };

    let mut registry = Registry::default();
    let summary = build(&options, &mut registry)?;
    println!(
        "indexed {} lines into {} ({} skipped)",
        summary.indexed,
        summary.index.display(),
        summary.skipped
    );
    if matches.get_flag("metrics") {
        eprint!("{}", render_metrics(&registry)?);
    }
    Ok(())
}
