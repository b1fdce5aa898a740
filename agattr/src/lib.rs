//! Attribute evaluation over [`agtree`] trees.
//!
//! The crate provides three attribute kinds, all memoized per node identity
//! and each owning its own cache:
//!
//! - [`attr::Attr`] / [`attr::ParamAttr`]: a fixed rule evaluated once per
//!   node (per node and parameter for the parameterized form), guarded by
//!   cycle detection.
//! - [`circular::Circular`]: self- or mutually-recursive attributes resolved
//!   by an iterative fixpoint driven by a shared [`circular::CircleGroup`].
//! - [`dynamic::DynamicAttr`]: a base rule plus a run-time stack of partial
//!   rules that can be pushed, popped and scoped.
//!
//! Evaluation is single-threaded and call-stack driven; caches and rule
//! stacks are unsynchronized state owned by each attribute instance.

pub mod attr;
pub mod cache;
pub mod circular;
pub mod cycle;
pub mod dynamic;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod tests_utils;

pub use attr::{Attr, ParamAttr};
pub use cache::{AttrCache, CellState};
pub use circular::{CircleGroup, Circular};
pub use dynamic::{DynamicAttr, Rule};
pub use error::{Error, RuleOutcome};
