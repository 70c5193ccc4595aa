//! I/O module
//!
//! Handles the CSV command stream and balance output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (row conversion, order assembly, output)
//! - `sync_reader` - Synchronous CSV reader with iterator interface
//! - `async_reader` - Asynchronous CSV reader with batch reading interface

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    convert_csv_record, write_balances_csv, Command, CommandAssembler, CsvRecord, Row, RowError,
};
pub use sync_reader::SyncReader;
