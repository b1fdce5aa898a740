//! Derived parent/child/sibling navigation over one rooted tree.
//!
//! Nodes never store back-references; all navigation other than
//! parent-to-child is served from a side table built here by a single
//! depth-first traversal from the root (explicit stack, no recursion).
//! The index is read-only after construction and may be shared freely by
//! any number of attribute instances over the same tree.

use log::debug;
use slotmap::SecondaryMap;
use smallvec::SmallVec;

use crate::tree::{AstNode, NodeId, Tree};

#[derive(Default)]
struct NodeRelations {
    parent: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
}

/// Side table of tree relations, keyed by node identity.
///
/// Covers exactly the nodes reachable from the root it was built from.
/// Querying any other node is a programming error and panics; a silent
/// `None` would let a rule quietly mis-dispatch on structural context.
pub struct RelationIndex {
    root: NodeId,
    rel: SecondaryMap<NodeId, NodeRelations>,
}

impl RelationIndex {
    /// Derive the relation table by one traversal from `root`.
    ///
    /// Panics if a node occurs in two child lists (shared subtrees are not
    /// trees) or if a child id is missing from the arena.
    pub fn build<T: AstNode>(tree: &Tree<T>, root: NodeId) -> Self {
        let mut rel: SecondaryMap<NodeId, NodeRelations> = SecondaryMap::new();
        rel.insert(root, NodeRelations::default());

        let mut stack: Vec<NodeId> = vec![root];
        while let Some(id) = stack.pop() {
            let children = tree[id].children();
            for (pos, &child) in children.iter().enumerate() {
                if rel.contains_key(child) {
                    panic!(
                        "node {} occurs in more than one child list; the indexed structure is not a tree",
                        tree.render(child)
                    );
                }
                rel.insert(
                    child,
                    NodeRelations {
                        parent: Some(id),
                        prev: if pos > 0 { Some(children[pos - 1]) } else { None },
                        next: children.get(pos + 1).copied(),
                        children: SmallVec::new(),
                    },
                );
                stack.push(child);
            }
            rel[id].children = children;
        }

        debug!(
            "relation index built from {:?}: {} nodes",
            root,
            rel.len()
        );
        Self { root, rel }
    }

    /// The root this index was built from.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// True if `id` is covered by this index (reachable from the root).
    pub fn contains(&self, id: NodeId) -> bool {
        self.rel.contains_key(id)
    }

    /// The unique node whose child list contains `id`, or `None` for the
    /// root. Panics if `id` is not part of the indexed tree.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).parent
    }

    /// Direct children of `id` in declaration order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.entry(id).children
    }

    /// Sibling immediately after `id` in its parent's child list.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).next
    }

    /// Sibling immediately before `id` in its parent's child list.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).prev
    }

    fn entry(&self, id: NodeId) -> &NodeRelations {
        self.rel.get(id).unwrap_or_else(|| {
            panic!(
                "relation query for node {id:?}, which is not part of the tree indexed from {:?}",
                self.root
            )
        })
    }
}
