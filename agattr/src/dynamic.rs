//! Dynamic attributes: a base rule plus a run-time stack of partial rules.

use std::cell::RefCell;
use std::rc::Rc;

use agtree::{AstNode, NodeId, Tree};
use log::{debug, trace, warn};

use crate::cache::AttrCache;
use crate::cycle::EvalGuard;
use crate::error::{Error, RuleOutcome};

/// One partial rule of a dynamic attribute.
///
/// `Rule` values are cheap handles; cloning shares the underlying closure.
/// Stack membership is decided by handle identity (`Rc::ptr_eq`), never by
/// content: pushing the same handle twice and reducing once leaves one
/// occurrence active, while a second `Rule::new` over an identical closure
/// is a different rule entirely.
pub struct Rule<V>(Rc<dyn Fn(NodeId) -> RuleOutcome<V>>);

impl<V> Rule<V> {
    pub fn new(rule: impl Fn(NodeId) -> RuleOutcome<V> + 'static) -> Self {
        Self(Rc::new(rule))
    }

    fn try_apply(&self, node: NodeId) -> RuleOutcome<V> {
        (self.0)(node)
    }

    fn same(&self, other: &Rule<V>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<V> Clone for Rule<V> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

/// An attribute whose defining rules can be extended and reduced at run
/// time.
///
/// Lookup order is most-recently-pushed first, then the base rule fixed at
/// construction. The value cache is decoupled from the rule stack on
/// purpose: [`DynamicAttr::reset`] clears values only, and values computed
/// under an earlier stack configuration stay cached across stack mutation
/// until the caller resets.
pub struct DynamicAttr<T: AstNode, V: Clone> {
    name: String,
    tree: Rc<Tree<T>>,
    base: Rule<V>,
    stack: RefCell<Vec<Rule<V>>>,
    cache: AttrCache<NodeId, V>,
}

impl<T: AstNode, V: Clone> DynamicAttr<T, V> {
    pub fn new(name: impl Into<String>, tree: Rc<Tree<T>>, base: Rule<V>) -> Self {
        Self {
            name: name.into(),
            tree,
            base,
            stack: RefCell::new(Vec::new()),
            cache: AttrCache::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate at `node` under the current rule stack.
    pub fn get(&self, node: NodeId) -> Result<V, Error> {
        if let Some(value) = self.cache.computed(&node) {
            return Ok(value);
        }
        let guard = EvalGuard::begin(&self.name, || self.tree.render(node), &self.cache, node)?;
        // Snapshot the handles so rule bodies may mutate the stack (or
        // recurse into this attribute) without a borrow conflict.
        let stack: Vec<Rule<V>> = self.stack.borrow().clone();
        let mut value = None;
        for rule in stack.iter().rev().chain(std::iter::once(&self.base)) {
            if let Some(v) = rule.try_apply(node)? {
                value = Some(v);
                break;
            }
        }
        let value = value.ok_or_else(|| Error::NoRuleFor {
            attribute: self.name.clone(),
            node: self.tree.render(node),
        })?;
        guard.complete(value.clone());
        Ok(value)
    }

    /// Push `rule`; it now takes precedence over every earlier rule.
    pub fn extend(&self, rule: Rule<V>) {
        trace!("attribute `{}`: rule pushed", self.name);
        self.stack.borrow_mut().push(rule);
    }

    /// Remove the most-recently-pushed occurrence of exactly this rule
    /// handle. Other occurrences and other rules keep their positions.
    pub fn reduce(&self, rule: &Rule<V>) {
        let mut stack = self.stack.borrow_mut();
        match stack.iter().rposition(|r| r.same(rule)) {
            Some(pos) => {
                stack.remove(pos);
                trace!("attribute `{}`: rule removed at depth {pos}", self.name);
            }
            None => warn!(
                "attribute `{}`: reduce of a rule that is not on the stack",
                self.name
            ),
        }
    }

    /// Run `body` and restore the exact prior stack state on every exit
    /// path, including unwinding. Rules pushed inside `body` shadow outer
    /// rules for its duration only; nested scopes compose.
    pub fn scoped<R>(&self, body: impl FnOnce() -> R) -> R {
        let _guard = StackGuard {
            stack: &self.stack,
            saved: Some(self.stack.borrow().clone()),
        };
        trace!("attribute `{}`: scope entered", self.name);
        body()
    }

    /// Cache-hit status without forcing evaluation.
    pub fn has_been_computed_at(&self, node: NodeId) -> bool {
        self.cache.is_computed(&node)
    }

    /// Discard cached values. The rule stack is left untouched.
    pub fn reset(&self) {
        debug!("attribute `{}`: cache reset (rule stack kept)", self.name);
        self.cache.clear();
    }
}

struct StackGuard<'a, V> {
    stack: &'a RefCell<Vec<Rule<V>>>,
    saved: Option<Vec<Rule<V>>>,
}

impl<V> Drop for StackGuard<'_, V> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.stack.borrow_mut() = saved;
        }
    }
}
