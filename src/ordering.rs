//! Ordering of children inside a container.
//!
//! Positions of a container's children are always `0..n-1`. `reorder` rewrites a full
//! permutation through a staging range; `append` adds new children after the current maximum.

pub mod append;
pub mod reorder;

pub use append::AppendInsertion;
pub use reorder::{OrderedSequenceStore, ReorderPhase, HOLDING_OFFSET, STAGING_OFFSET};
