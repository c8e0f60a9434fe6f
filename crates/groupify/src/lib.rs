//! Group classification for treeprice.
//!
//! Walks a nested document token by token and assigns every numeric leaf's
//! key to the top-level section it sits under, without buffering the
//! document. See [`GroupClassifier`].

pub mod classifier;

pub use classifier::{ClassifySummary, GroupClassifier};
