//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over commands from a CSV file. Rows are
//! read one at a time and handed to a `CommandAssembler`, so memory stays
//! bounded by the largest single order rather than by the file size.
//!
//! ```no_run
//! use loyalty_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("commands.csv")).unwrap();
//! for command in reader {
//!     println!("{:?}", command);
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found) are returned from `new()`
//! - Malformed rows are logged with their line number and skipped; an order
//!   containing one is dropped as a whole

use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use tracing::warn;

use crate::io::csv_format::{convert_csv_record, Command, CommandAssembler, CsvRecord};

/// Synchronous CSV command reader
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    assembler: CommandAssembler,
    ready: VecDeque<Command>,
    line_num: usize,
    exhausted: bool,
}

impl SyncReader {
    /// Open the CSV file and prepare it for streaming iteration
    ///
    /// The reader trims whitespace from all fields and allows rows with
    /// fewer columns than the header.
    ///
    /// # Arguments
    ///
    /// * `path` - CSV file with a header row
    ///
    /// # Returns
    ///
    /// * `Ok(SyncReader)` - Ready to iterate
    /// * `Err(String)` - The file could not be opened
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            assembler: CommandAssembler::new(),
            ready: VecDeque::new(),
            line_num: 1,
            exhausted: false,
        })
    }

    /// Read rows until at least one command is complete or the file ends
    fn fill(&mut self) {
        while self.ready.is_empty() && !self.exhausted {
            let mut deserializer = self.reader.deserialize::<CsvRecord>();

            match deserializer.next() {
                Some(Ok(csv_record)) => {
                    self.line_num += 1;
                    let converted = convert_csv_record(csv_record).map_err(|mut e| {
                        e.message = format!("Line {}: {}", self.line_num, e.message);
                        e
                    });
                    self.ready.extend(self.assembler.feed(converted));
                }
                Some(Err(e)) => {
                    self.line_num += 1;
                    warn!(line = self.line_num, error = %e, "CSV parse error");
                }
                None => {
                    self.exhausted = true;
                    self.ready.extend(self.assembler.finish());
                }
            }
        }
    }
}

impl Iterator for SyncReader {
    type Item = Command;

    fn next(&mut self) -> Option<Self::Item> {
        self.fill();
        self.ready.pop_front()
    }
}
