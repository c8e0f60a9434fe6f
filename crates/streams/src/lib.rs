//! Byte-level sources for treeprice.
//!
//! - [`JsonTokenStream`] — incremental JSON tokenizer implementing
//!   [`TokenSource`](treeprice_core::TokenSource)
//! - [`CsvRecordStream`] — RFC 4180 record reader implementing
//!   [`RecordSource`](treeprice_core::RecordSource)
//!
//! Both read through a buffered async reader one byte at a time and never
//! hold more than the current token or record in memory.

pub mod csv;
pub mod json;
mod reader;

pub use csv::CsvRecordStream;
pub use json::JsonTokenStream;
