use std::cell::OnceCell;
use std::ops::Index;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::relations::RelationIndex;

new_key_type! {
    /// Opaque identity token for one node of one [`Tree`].
    ///
    /// Two structurally identical nodes pushed separately get distinct ids;
    /// every cache keyed by `NodeId` therefore keys on identity, not shape.
    pub struct NodeId;
}

/// Common interface implemented by every node union stored in a [`Tree`].
///
/// Implementors are closed tagged unions; each variant carries the ids of
/// its ordered children inline. The trait gives the engine lightweight
/// access to that child list plus a variant head used only for diagnostic
/// rendering.
pub trait AstNode {
    /// Ids of the direct children, in declaration order.
    fn children(&self) -> SmallVec<[NodeId; 4]>;

    /// Variant head for diagnostic dumps, e.g. `Pair` or `Leaf(3)`.
    ///
    /// Payload-free inner variants render as `Head(child,child)`; leaves
    /// should fold their payload into the label themselves.
    fn label(&self) -> String;
}

/// One rooted, immutable tree of `T` nodes.
///
/// Construction is leaves-first: a node can only be pushed once all of its
/// children are already in the arena. After [`Tree::relations`] has derived the
/// relation index the shape is frozen; pushing more nodes past that point is
/// a contract violation and panics.
pub struct Tree<T: AstNode> {
    nodes: SlotMap<NodeId, T>,
    root: Option<NodeId>,
    relations: OnceCell<RelationIndex>,
}

impl<T: AstNode> Tree<T> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            relations: OnceCell::new(),
        }
    }

    /// Push a node into the arena and return its identity.
    ///
    /// Panics if any child id named by the payload is not already stored
    /// (malformed construction order or a foreign tree's id), or if the
    /// relation index has already been built.
    pub fn push(&mut self, payload: T) -> NodeId {
        assert!(
            self.relations.get().is_none(),
            "tree shape is frozen once the relation index has been built"
        );
        for child in payload.children() {
            assert!(
                self.nodes.contains_key(child),
                "child {:?} of pushed node `{}` is not stored in this tree",
                child,
                payload.label()
            );
        }
        self.nodes.insert(payload)
    }

    /// Declare `root` as the root node of this tree.
    pub fn set_root(&mut self, root: NodeId) {
        assert!(
            self.nodes.contains_key(root),
            "root {root:?} is not stored in this tree"
        );
        assert!(
            self.relations.get().is_none(),
            "tree shape is frozen once the relation index has been built"
        );
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterate over the ids of every node stored in the arena, including
    /// nodes not reachable from the root.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Human-readable structural dump of the subtree at `id`, used for
    /// diagnostics only. The exact format is not a compatibility surface.
    pub fn render(&self, id: NodeId) -> String {
        let node = &self[id];
        let children = node.children();
        if children.is_empty() {
            return node.label();
        }
        let inner: Vec<String> = children.iter().map(|&c| self.render(c)).collect();
        format!("{}({})", node.label(), inner.join(","))
    }

    /// The relation index derived from the declared root.
    ///
    /// Built on first use and reused for the lifetime of the tree. Panics
    /// if no root has been declared.
    pub fn relations(&self) -> &RelationIndex {
        self.relations.get_or_init(|| {
            let root = self
                .root
                .expect("relation index requested before a root was declared");
            RelationIndex::build(self, root)
        })
    }

    /// True if `id` has a parent and the parent's payload satisfies `pred`.
    pub fn parent_matches(&self, id: NodeId, pred: impl FnOnce(&T) -> bool) -> bool {
        match self.relations().parent(id) {
            Some(p) => pred(&self[p]),
            None => false,
        }
    }

    /// True if `id` has a next sibling whose payload satisfies `pred`.
    pub fn next_matches(&self, id: NodeId, pred: impl FnOnce(&T) -> bool) -> bool {
        match self.relations().next(id) {
            Some(s) => pred(&self[s]),
            None => false,
        }
    }

    /// True if `id` has a previous sibling whose payload satisfies `pred`.
    pub fn prev_matches(&self, id: NodeId, pred: impl FnOnce(&T) -> bool) -> bool {
        match self.relations().prev(id) {
            Some(s) => pred(&self[s]),
            None => false,
        }
    }

    /// True if `id` has both a next sibling matching `pred_next` and a
    /// parent matching `pred_parent`. Rule bodies use this to branch on a
    /// pair of structural neighbours in one step.
    pub fn next_and_parent_match(
        &self,
        id: NodeId,
        pred_next: impl FnOnce(&T) -> bool,
        pred_parent: impl FnOnce(&T) -> bool,
    ) -> bool {
        self.next_matches(id, pred_next) && self.parent_matches(id, pred_parent)
    }
}

impl<T: AstNode> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: AstNode> Index<NodeId> for Tree<T> {
    type Output = T;

    fn index(&self, id: NodeId) -> &T {
        self.nodes
            .get(id)
            .unwrap_or_else(|| panic!("node {id:?} is not stored in this tree"))
    }
}
