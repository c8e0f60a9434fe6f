//! Attribute parsing for treeprice.
//!
//! Turns a tabular [`RecordSource`](treeprice_core::RecordSource) into a
//! stream of [`EntityValue`](treeprice_core::EntityValue) pairs, resolving
//! the entity and value columns once at construction.

pub mod attribute;
pub mod options;

pub use attribute::{AttributeParser, ParseSummary};
pub use options::{ColumnRef, ParserOptions};
