//! Asynchronous CSV reader with batch interface
//!
//! Streams rows with csv-async and assembles them into commands through the
//! same `CommandAssembler` the sync reader uses, so both strategies see an
//! identical command sequence.
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of Commands
//!                  ↓
//!           csv_format module
//!           (convert_csv_record, CommandAssembler)
//! ```

use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

use crate::io::csv_format::{convert_csv_record, Command, CommandAssembler, CsvRecord};

/// Asynchronous CSV command reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    assembler: CommandAssembler,
    line_num: usize,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            assembler: CommandAssembler::new(),
            line_num: 1,
            exhausted: false,
        }
    }

    /// Read a batch of commands
    ///
    /// Reads rows until at least `batch_size` commands are complete or the
    /// file ends. A batch may exceed `batch_size` by one when a row completes
    /// two commands at once. Malformed rows are logged and skipped.
    ///
    /// Returns an empty vector once the file is exhausted.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<Command> {
        let mut batch = Vec::with_capacity(batch_size);
        if self.exhausted {
            return batch;
        }

        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(csv_record)) => {
                    self.line_num += 1;
                    let line_num = self.line_num;
                    let converted = convert_csv_record(csv_record).map_err(|mut e| {
                        e.message = format!("Line {}: {}", line_num, e.message);
                        e
                    });
                    batch.extend(self.assembler.feed(converted));
                }
                Some(Err(e)) => {
                    self.line_num += 1;
                    warn!(line = self.line_num, error = %e, "CSV parse error");
                }
                None => {
                    self.exhausted = true;
                    batch.extend(self.assembler.finish());
                    break;
                }
            }
        }

        batch
    }
}
