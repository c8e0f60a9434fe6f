//! # treeprice Aggregator
//!
//! Joins classified group membership with the attribute stream and averages
//! values per group.
//!
//! The engine works in two phases:
//! 1. **Index build**: the group stream is drained completely and frozen into
//!    a [`GroupIndex`] (discovery-ordered groups plus entity → group map).
//! 2. **Fan-out/fan-in**: one router task pushes each value onto its group's
//!    bounded queue; one worker per group folds and averages.
//!
//! [`pipeline::run`] wires both producers and the engine together.

mod accumulator;
pub mod engine;
pub mod index;
pub mod pipeline;
pub mod report;
mod router;

pub use engine::{Aggregator, AggregatorConfig};
pub use index::GroupIndex;
pub use pipeline::{PipelineConfig, PipelineReport};
pub use report::GroupAverage;
