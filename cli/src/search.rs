//! Look terms up in an index and print the matching lines of the data file.

use crate::{builder::trim_line, Error};
use bigsearch_storage::{
    binary::Encoding,
    index::{index_path, Index},
};
use prometheus_client::registry::Registry;
use std::{
    fs::File,
    io::{BufRead, BufReader, Seek, SeekFrom, Write},
    path::Path,
};
use tracing::debug;

/// Prompt shown before reading a term interactively.
pub const PROMPT: &str = "Enter search term: ";

/// Line printed when a term has no matches.
pub const NO_RESULTS: &str = "No results found";

/// An index opened together with the data file it points into.
pub struct Searcher {
    index: Index,
    data: BufReader<File>,
    encoding: Encoding,
}

impl Searcher {
    /// Open the index for `field` of the data file at `data`.
    pub fn open(data: &Path, field: usize, encoding: Encoding) -> Result<Self, Error> {
        let index = Index::open(index_path(data, field), encoding)?;
        let data = BufReader::new(File::open(data)?);
        Ok(Self {
            index,
            data,
            encoding,
        })
    }

    /// Register the metrics of the underlying index with `registry`.
    pub fn register(&self, registry: &mut Registry) {
        self.index.register(registry);
    }

    /// Lines of the data file whose indexed field equals `term` (ignoring case), in the
    /// order they were indexed.
    pub fn search(&mut self, term: &str) -> Result<Vec<String>, Error> {
        let term = term.to_lowercase();
        let mut lines = Vec::new();
        for offset in self.index.query(&term)? {
            let offset = offset?;
            self.data.seek(SeekFrom::Start(offset))?;
            let mut line = Vec::new();
            self.data.read_until(b'\n', &mut line)?;
            lines.push(self.encoding.decode(trim_line(&line)));
        }
        debug!(term = %term, matches = lines.len(), "searched");
        Ok(lines)
    }

    /// Search for `term` and write the results to `output`.
    pub fn print(&mut self, term: &str, output: &mut impl Write) -> Result<(), Error> {
        let lines = self.search(term)?;
        if lines.is_empty() {
            writeln!(output, "{NO_RESULTS}")?;
        }
        for line in lines {
            writeln!(output, "{line}")?;
        }
        Ok(())
    }

    /// Prompt for terms on `input` until an empty line (or end of input), printing the
    /// results of each to `output`.
    pub fn interact(
        &mut self,
        input: &mut impl BufRead,
        output: &mut impl Write,
    ) -> Result<(), Error> {
        loop {
            write!(output, "{PROMPT}")?;
            output.flush()?;
            let mut term = String::new();
            if input.read_line(&mut term)? == 0 {
                return Ok(());
            }
            let term = term.trim_end_matches(['\r', '\n']);
            if term.is_empty() {
                return Ok(());
            }
            self.print(term, output)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build, Options};
    use bigsearch_storage::index::Config;
    use commonware_macros::test_traced;
    use std::{fs, io::Cursor, path::PathBuf};
    use tempfile::{tempdir, TempDir};

    const DATA: &str = "id,name,colour\n1,Apple,red\n2,Banana,yellow\r\n3,apple,green\n";

    fn setup(encoding: Encoding, contents: &[u8]) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let data = dir.path().join("fruit.csv");
        fs::write(&data, contents).unwrap();
        let options = Options {
            data: data.clone(),
            field: 1,
            delimiter: ',',
            config: Config {
                bucket_count: 8,
                encoding,
            },
        };
        build(&options, &mut Registry::default()).unwrap();
        (dir, data)
    }

    #[test_traced]
    fn test_search() {
        let (_dir, data) = setup(Encoding::Utf8, DATA.as_bytes());
        let mut searcher = Searcher::open(&data, 1, Encoding::Utf8).unwrap();
        assert_eq!(
            searcher.search("APPLE").unwrap(),
            vec!["1,Apple,red".to_string(), "3,apple,green".to_string()]
        );
        assert_eq!(
            searcher.search("banana").unwrap(),
            vec!["2,Banana,yellow".to_string()]
        );
        assert_eq!(searcher.search("name").unwrap(), vec!["id,name,colour"]);
        assert!(searcher.search("cherry").unwrap().is_empty());
    }

    #[test_traced]
    fn test_print() {
        let (_dir, data) = setup(Encoding::Utf8, DATA.as_bytes());
        let mut searcher = Searcher::open(&data, 1, Encoding::Utf8).unwrap();
        let mut output = Vec::new();
        searcher.print("apple", &mut output).unwrap();
        searcher.print("cherry", &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "1,Apple,red\n3,apple,green\nNo results found\n"
        );
    }

    #[test_traced]
    fn test_interact() {
        let (_dir, data) = setup(Encoding::Utf8, DATA.as_bytes());
        let mut searcher = Searcher::open(&data, 1, Encoding::Utf8).unwrap();
        let mut input = Cursor::new("Banana\ncherry\n\napple\n");
        let mut output = Vec::new();
        searcher.interact(&mut input, &mut output).unwrap();

        // Stops at the empty line
        assert_eq!(
            String::from_utf8(output).unwrap(),
            format!("{PROMPT}2,Banana,yellow\n{PROMPT}{NO_RESULTS}\n{PROMPT}")
        );

        // Stops at end of input
        let mut input = Cursor::new("apple");
        let mut output = Vec::new();
        searcher.interact(&mut input, &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            format!("{PROMPT}1,Apple,red\n3,apple,green\n{PROMPT}")
        );
    }

    #[test_traced]
    fn test_search_latin1() {
        let contents = b"1,Caf\xC9,hot\n2,caf\xE9,cold\n";
        let (_dir, data) = setup(Encoding::Latin1, contents);
        let mut searcher = Searcher::open(&data, 1, Encoding::Latin1).unwrap();
        assert_eq!(
            searcher.search("CAFÉ").unwrap(),
            vec!["1,CafÉ,hot".to_string(), "2,café,cold".to_string()]
        );
    }

    #[test_traced]
    fn test_interact_unencodable_term() {
        let contents = b"1,Caf\xC9,hot\n2,caf\xE9,cold\n";
        let (_dir, data) = setup(Encoding::Latin1, contents);
        let mut searcher = Searcher::open(&data, 1, Encoding::Latin1).unwrap();
        let mut input = Cursor::new("€\ncafé\n");
        let mut output = Vec::new();
        searcher.interact(&mut input, &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            format!("{PROMPT}{NO_RESULTS}\n{PROMPT}1,CafÉ,hot\n2,café,cold\n{PROMPT}")
        );
    }

    #[test_traced]
    fn test_open_without_index() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("fruit.csv");
        fs::write(&data, DATA).unwrap();
        assert!(matches!(
            Searcher::open(&data, 1, Encoding::Utf8),
            Err(Error::Index(_))
        ));
    }
}
