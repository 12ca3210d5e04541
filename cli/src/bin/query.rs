//! Print the lines of a delimited text file whose indexed field matches a term.

use bigsearch_cli::{init_logging, render_metrics, search::Searcher, Error};
use bigsearch_storage::binary::Encoding;
use clap::{value_parser, Arg, ArgAction, Command};
use prometheus_client::registry::Registry;
use std::{io, path::PathBuf};
use tracing::error;

fn main() {
    // Parse arguments
    let matches = Command::new("bigsearch-query")
        .about("look up lines of a delimited text file by an indexed field")
        .arg(
            Arg::new("data")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Data file the index was built over"),
        )
        .arg(
            Arg::new("field")
                .required(true)
                .value_parser(value_parser!(usize))
                .help("Zero-based index of the indexed field"),
        )
        .arg(
            Arg::new("term")
                .required(false)
                .help("Term to look up (prompts repeatedly if omitted)"),
        )
        .arg(
            Arg::new("encoding")
                .long("encoding")
                .default_value("utf8")
                .help("Text encoding the index was built with (utf8 or latin1)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .default_value("warn")
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
        error!(?err, "query failed");
        std::process::exit(1);
    }
}

fn run(matches: &clap::ArgMatches) -> Result<(), Error> {
    let encoding = matches
        .get_one::<String>("encoding")
        .unwrap()
        .parse::<Encoding>()?;
    let data = matches.get_one::<PathBuf>("data").unwrap();
    let field = *matches.get_one::<usize>("field").unwrap();

    let mut searcher = Searcher::open(data, field, encoding)?;
    let mut registry = Registry::default();
    searcher.register(&mut registry);

    let mut stdout = io::stdout().lock();
    match matches.get_one::<String>("term") {
        Some(term) => searcher.print(term, &mut stdout)?,
        None => searcher.interact(&mut io::stdin().lock(), &mut stdout)?,
    }
    if matches.get_flag("metrics") {
        eprint!("{}", render_metrics(&registry)?);
    }
    Ok(())
}
