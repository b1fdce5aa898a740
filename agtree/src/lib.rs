//! Arena-backed immutable trees with derived navigation relations.
//!
//! The crate exposes two pieces: [`tree::Tree`], a slotmap arena holding the
//! nodes of one rooted tree (node identity is the storage slot, never
//! structural equality), and [`relations::RelationIndex`], a side table of
//! parent/child/sibling relations derived from the root by a single
//! traversal. Attribution engines and client analyses share the tree
//! read-only; nothing in here mutates a node after it has been pushed.

pub mod relations;
pub mod tree;

pub use relations::RelationIndex;
pub use tree::{AstNode, NodeId, Tree};
