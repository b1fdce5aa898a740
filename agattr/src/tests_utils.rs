//! Demo object languages for the engine's own tests.
//!
//! These unions are clients of the engine, not part of it: they define node
//! shapes and helper queries, and the tests attach attribute equations to
//! them. They are compiled only for tests (or with the `test-utils`
//! feature for downstream test suites).

use std::collections::BTreeSet;
use std::rc::Rc;

use agtree::{AstNode, NodeId, Tree};
use smallvec::{SmallVec, smallvec};
use strum::{EnumIs, EnumTryAs};

/// Leaf/Pair number trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIs, EnumTryAs)]
pub enum Num {
    Leaf(i32),
    Pair(NodeId, NodeId),
}

impl AstNode for Num {
    fn children(&self) -> SmallVec<[NodeId; 4]> {
        match self {
            Num::Leaf(_) => SmallVec::new(),
            Num::Pair(l, r) => smallvec![*l, *r],
        }
    }

    fn label(&self) -> String {
        match self {
            Num::Leaf(v) => format!("Leaf({v})"),
            Num::Pair(..) => "Pair".to_string(),
        }
    }
}

pub struct PairIds {
    pub root: NodeId,
    pub leaf3: NodeId,
    pub inner: NodeId,
    pub leaf1: NodeId,
    pub leaf10: NodeId,
}

/// `Pair(Leaf(3), Pair(Leaf(1), Leaf(10)))`
pub fn sample_pair_tree() -> (Rc<Tree<Num>>, PairIds) {
    let mut tree = Tree::new();
    let leaf3 = tree.push(Num::Leaf(3));
    let leaf1 = tree.push(Num::Leaf(1));
    let leaf10 = tree.push(Num::Leaf(10));
    let inner = tree.push(Num::Pair(leaf1, leaf10));
    let root = tree.push(Num::Pair(leaf3, inner));
    tree.set_root(root);
    (
        Rc::new(tree),
        PairIds {
            root,
            leaf3,
            inner,
            leaf1,
            leaf10,
        },
    )
}

/// One tree holding two structurally equal depth-3 subtrees under a shared
/// root. Distinct identities, identical shapes.
pub fn twin_pair_tree() -> (Rc<Tree<Num>>, NodeId, NodeId) {
    let mut tree = Tree::new();
    let twin = |tree: &mut Tree<Num>| {
        let a = tree.push(Num::Leaf(1));
        let b = tree.push(Num::Leaf(2));
        tree.push(Num::Pair(a, b))
    };
    let left = twin(&mut tree);
    let right = twin(&mut tree);
    let root = tree.push(Num::Pair(left, right));
    tree.set_root(root);
    (Rc::new(tree), left, right)
}

/// Variable sets flowing through the dataflow tests.
pub type Vars = BTreeSet<&'static str>;

pub fn vars(names: &[&'static str]) -> Vars {
    names.iter().copied().collect()
}

/// Three-statement imperative fragment with one back-branch.
///
/// Statements are the ordered children of a `Block`; fallthrough control
/// flow is the next-sibling relation, and a `Branch` additionally jumps to
/// its `target` (a cross-reference, not a child).
#[derive(Debug, Clone, EnumIs, EnumTryAs)]
pub enum Stmt {
    Block(SmallVec<[NodeId; 4]>),
    Assign {
        def: &'static str,
        uses: &'static [&'static str],
    },
    Branch {
        uses: &'static [&'static str],
        target: NodeId,
    },
}

impl AstNode for Stmt {
    fn children(&self) -> SmallVec<[NodeId; 4]> {
        match self {
            Stmt::Block(stmts) => stmts.clone(),
            Stmt::Assign { .. } | Stmt::Branch { .. } => SmallVec::new(),
        }
    }

    fn label(&self) -> String {
        match self {
            Stmt::Block(_) => "Block".to_string(),
            Stmt::Assign { def, .. } => format!("Assign({def})"),
            Stmt::Branch { .. } => "Branch".to_string(),
        }
    }
}

pub struct CfgIds {
    pub block: NodeId,
    pub s1: NodeId,
    pub s2: NodeId,
    pub s3: NodeId,
}

/// ```text
/// s1: x = <input>
/// s2: branch s1 if <x>      (falls through to s3 otherwise)
/// s3: y = x
/// ```
pub fn branch_cfg() -> (Rc<Tree<Stmt>>, CfgIds) {
    let mut tree = Tree::new();
    let s1 = tree.push(Stmt::Assign { def: "x", uses: &[] });
    let s2 = tree.push(Stmt::Branch {
        uses: &["x"],
        target: s1,
    });
    let s3 = tree.push(Stmt::Assign {
        def: "y",
        uses: &["x"],
    });
    let block = tree.push(Stmt::Block(smallvec![s1, s2, s3]));
    tree.set_root(block);
    (Rc::new(tree), CfgIds { block, s1, s2, s3 })
}

/// The same control-flow graph as [`branch_cfg`], pushed into the arena in
/// a different order so fixpoint sweeps visit the cells differently.
pub fn branch_cfg_reversed() -> (Rc<Tree<Stmt>>, CfgIds) {
    let mut tree = Tree::new();
    let s3 = tree.push(Stmt::Assign {
        def: "y",
        uses: &["x"],
    });
    let s1 = tree.push(Stmt::Assign { def: "x", uses: &[] });
    let s2 = tree.push(Stmt::Branch {
        uses: &["x"],
        target: s1,
    });
    let block = tree.push(Stmt::Block(smallvec![s1, s2, s3]));
    tree.set_root(block);
    (Rc::new(tree), CfgIds { block, s1, s2, s3 })
}

/// Control-flow successors of a statement, derived from the relation index
/// (fallthrough = next sibling) plus any branch target.
pub fn successors(tree: &Tree<Stmt>, node: NodeId) -> Vec<NodeId> {
    match &tree[node] {
        Stmt::Block(_) => Vec::new(),
        Stmt::Assign { .. } => tree.relations().next(node).into_iter().collect(),
        Stmt::Branch { target, .. } => {
            let mut succ: Vec<NodeId> = tree.relations().next(node).into_iter().collect();
            succ.push(*target);
            succ
        }
    }
}

pub fn defs(tree: &Tree<Stmt>, node: NodeId) -> Vars {
    match &tree[node] {
        Stmt::Assign { def, .. } => vars(&[*def]),
        _ => Vars::new(),
    }
}

pub fn uses(tree: &Tree<Stmt>, node: NodeId) -> Vars {
    match &tree[node] {
        Stmt::Assign { uses, .. } | Stmt::Branch { uses, .. } => uses.iter().copied().collect(),
        Stmt::Block(_) => Vars::new(),
    }
}
