//! I/O module
//!
//! Handles CSV parsing and output for the replay pipeline.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)

pub mod csv_format;

pub use csv_format::{convert_csv_record, write_balances_csv, write_settlements_csv, CsvRecord};
