//! Circular attributes resolved by an iterative whole-tree fixpoint.
//!
//! Mutually-recursive definitions (live-in depending on successors'
//! live-out and back) cannot be resolved by direct memoized recursion.
//! Instead, every circular attribute carries a bottom value used as the
//! initial approximation, and a [`CircleGroup`] repeatedly recomputes every
//! node's cell for every registered attribute until a full round changes
//! nothing, then marks all cells final. Because the engine tracks no
//! explicit dependency set, it sweeps the whole node set rather than a
//! localized worklist; this stays correct under arbitrary rule bodies.
//!
//! While a pass is active, `get` returns the current approximation instead
//! of recursing, so self-reference is the working mechanism here, not a
//! cycle error.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use agtree::{AstNode, NodeId, Tree};
use log::debug;

use crate::cache::CellState;
use crate::error::{Error, RuleOutcome};

/// One fixpoint participant, type-erased for the group's roster.
trait Sweep {
    /// Recompute every node's cell once. True if any cell changed.
    fn sweep(&self) -> Result<bool, Error>;
    /// Promote all approximations to final values.
    fn finalize(&self);
    /// Drop non-final cells after an aborted pass.
    fn discard_approximations(&self);
}

/// Coordinator for one family of mutually-recursive circular attributes.
///
/// All attributes that may feed each other must be created through the same
/// group (and over the same tree); the group drives their sweeps together
/// and owns the in-circle flag that switches `get` into approximation
/// reads. Passes never overlap.
pub struct CircleGroup {
    in_circle: Cell<bool>,
    participants: RefCell<Vec<Weak<dyn Sweep>>>,
}

impl CircleGroup {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            in_circle: Cell::new(false),
            participants: RefCell::new(Vec::new()),
        })
    }

    /// True while a fixpoint pass is running.
    pub fn in_circle(&self) -> bool {
        self.in_circle.get()
    }

    /// Create a circular attribute registered with this group.
    pub fn circular<T, V>(
        self: &Rc<Self>,
        name: impl Into<String>,
        bottom: V,
        tree: Rc<Tree<T>>,
        rule: impl Fn(NodeId) -> RuleOutcome<V> + 'static,
    ) -> Rc<Circular<T, V>>
    where
        T: AstNode + 'static,
        V: Clone + PartialEq + 'static,
    {
        let attr = Rc::new(Circular {
            name: name.into(),
            bottom,
            tree,
            group: Rc::clone(self),
            rule: Box::new(rule),
            cells: RefCell::new(HashMap::new()),
        });
        let erased: Weak<dyn Sweep> = Rc::<Circular<T, V>>::downgrade(&attr);
        self.participants.borrow_mut().push(erased);
        attr
    }

    /// Sweep all participants until a full round leaves every cell
    /// unchanged, then finalize. On failure the guard clears the flag and
    /// discards every non-final approximation.
    fn run(&self) -> Result<(), Error> {
        self.in_circle.set(true);
        let mut guard = PassGuard {
            group: self,
            converged: false,
        };

        let participants = self.alive();
        let mut sweeps = 0usize;
        loop {
            let mut changed = false;
            for p in &participants {
                changed |= p.sweep()?;
            }
            sweeps += 1;
            if !changed {
                break;
            }
        }
        for p in &participants {
            p.finalize();
        }
        guard.converged = true;
        debug!(
            "fixpoint converged after {sweeps} sweep round(s) over {} attribute(s)",
            participants.len()
        );
        Ok(())
    }

    fn alive(&self) -> Vec<Rc<dyn Sweep>> {
        self.participants
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

struct PassGuard<'g> {
    group: &'g CircleGroup,
    converged: bool,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.group.in_circle.set(false);
        if !self.converged {
            for p in self.group.alive() {
                p.discard_approximations();
            }
        }
    }
}

/// A memoized attribute whose value is defined self-referentially.
///
/// Created through [`CircleGroup::circular`]. Outside a pass, `get` on an
/// unfinalized node triggers the group fixpoint; inside a pass it returns
/// the current approximation (seeding the bottom value on first touch).
pub struct Circular<T: AstNode, V: Clone + PartialEq> {
    name: String,
    bottom: V,
    tree: Rc<Tree<T>>,
    group: Rc<CircleGroup>,
    rule: Box<dyn Fn(NodeId) -> RuleOutcome<V>>,
    cells: RefCell<HashMap<NodeId, CellState<V>>>,
}

impl<T: AstNode, V: Clone + PartialEq> Circular<T, V> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, node: NodeId) -> Result<V, Error> {
        // Fail fast on ids from a different arena.
        let _ = &self.tree[node];

        if let Some(CellState::Computed(v)) = self.cells.borrow().get(&node) {
            return Ok(v.clone());
        }

        if self.group.in_circle() {
            let mut cells = self.cells.borrow_mut();
            let state = cells
                .entry(node)
                .or_insert_with(|| CellState::InProgress(Some(self.bottom.clone())));
            let value = match state {
                CellState::InProgress(Some(v)) => v.clone(),
                CellState::InProgress(None) => self.bottom.clone(),
                CellState::Computed(v) => v.clone(),
            };
            return Ok(value);
        }

        self.group.run()?;
        match self.cells.borrow().get(&node) {
            Some(CellState::Computed(v)) => Ok(v.clone()),
            _ => panic!(
                "fixpoint pass left node {node:?} of attribute `{}` unfinalized",
                self.name
            ),
        }
    }

    /// True only once the fixpoint has converged and the cell is final.
    pub fn has_been_computed_at(&self, node: NodeId) -> bool {
        matches!(
            self.cells.borrow().get(&node),
            Some(CellState::Computed(_))
        )
    }

    /// Discard every cell, final values and approximations alike.
    pub fn reset(&self) {
        debug!("attribute `{}`: cache reset", self.name);
        self.cells.borrow_mut().clear();
    }
}

impl<T: AstNode, V: Clone + PartialEq> Sweep for Circular<T, V> {
    fn sweep(&self) -> Result<bool, Error> {
        let nodes: Vec<NodeId> = self.tree.ids().collect();
        let mut changed = false;
        for node in nodes {
            let current = match self.cells.borrow().get(&node) {
                Some(CellState::Computed(v)) | Some(CellState::InProgress(Some(v))) => v.clone(),
                Some(CellState::InProgress(None)) | None => self.bottom.clone(),
            };
            // Seed the cell before the rule runs so re-entrant reads (of
            // this node or any other) see an approximation.
            self.cells
                .borrow_mut()
                .entry(node)
                .or_insert_with(|| CellState::InProgress(Some(current.clone())));

            let next = (self.rule)(node)?.ok_or_else(|| Error::NoRuleFor {
                attribute: self.name.clone(),
                node: self.tree.render(node),
            })?;
            if next != current {
                self.cells
                    .borrow_mut()
                    .insert(node, CellState::InProgress(Some(next)));
                changed = true;
            }
        }
        Ok(changed)
    }

    fn finalize(&self) {
        let mut cells = self.cells.borrow_mut();
        for state in cells.values_mut() {
            if let CellState::InProgress(Some(v)) = state {
                *state = CellState::Computed(v.clone());
            }
        }
    }

    fn discard_approximations(&self) {
        self.cells.borrow_mut().retain(|_, state| state.is_computed());
    }
}
