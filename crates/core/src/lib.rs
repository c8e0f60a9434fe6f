//! # treeprice Core
//!
//! Domain types, traits, and error definitions for the treeprice pipeline,
//! which joins a hierarchical grouping document with a flat stream of
//! entity/value records and averages the values per group.
//!
//! ## Design Philosophy
//!
//! Every data source is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Feeding the classifier and parser from in-memory fixtures in tests
//! - Swapping the byte-level readers without touching the engine
//! - Clean dependency graph (all crates depend inward on core)

pub mod entity;
pub mod error;
pub mod group;
pub mod numeric;
pub mod source;

// Re-export key types at crate root for ergonomics
pub use entity::{EntityName, EntityValue};
pub use error::{AggregateError, ColumnError, Error, NumericError, Result, StreamError};
pub use group::{GroupItem, GroupKey, Taxonomy, TreeSize, TreeSizes};
pub use numeric::{DecimalContext, NumericKind, NumericMode, NumericValue, Rounding};
pub use source::{Leaf, RecordSource, Structure, Token, TokenSource};
