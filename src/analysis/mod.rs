//! Analysis modules.
//!
//! Filtering, grouping and joining of the loaded tables.

pub mod aggregator;

pub use aggregator::*;
