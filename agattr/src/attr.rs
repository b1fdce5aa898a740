//! Basic memoized attributes.

use std::hash::Hash;
use std::rc::Rc;

use agtree::{AstNode, NodeId, Tree};
use log::debug;

use crate::cache::AttrCache;
use crate::cycle::EvalGuard;
use crate::error::{Error, RuleOutcome};

/// A memoized unary attribute: one fixed rule from node to value.
///
/// The rule is typically a partial case analysis over node variants; a node
/// matching no case surfaces as [`Error::NoRuleFor`]. Re-entering the same
/// node from within the rule body is a cycle and fails; use
/// [`Circular`](crate::circular::Circular) for definitions that are meant
/// to be self-referential.
pub struct Attr<T: AstNode, V: Clone> {
    name: String,
    tree: Rc<Tree<T>>,
    rule: Box<dyn Fn(NodeId) -> RuleOutcome<V>>,
    cache: AttrCache<NodeId, V>,
}

impl<T: AstNode, V: Clone> Attr<T, V> {
    pub fn new(
        name: impl Into<String>,
        tree: Rc<Tree<T>>,
        rule: impl Fn(NodeId) -> RuleOutcome<V> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            tree,
            rule: Box::new(rule),
            cache: AttrCache::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate at `node`, serving the cached value on a hit.
    pub fn get(&self, node: NodeId) -> Result<V, Error> {
        if let Some(value) = self.cache.computed(&node) {
            return Ok(value);
        }
        let guard = EvalGuard::begin(&self.name, || self.tree.render(node), &self.cache, node)?;
        let value = (self.rule)(node)?.ok_or_else(|| Error::NoRuleFor {
            attribute: self.name.clone(),
            node: self.tree.render(node),
        })?;
        guard.complete(value.clone());
        Ok(value)
    }

    /// Cache-hit status without forcing evaluation.
    pub fn has_been_computed_at(&self, node: NodeId) -> bool {
        self.cache.is_computed(&node)
    }

    /// Discard every cached entry of this instance.
    pub fn reset(&self) {
        debug!("attribute `{}`: cache reset", self.name);
        self.cache.clear();
    }
}

/// A memoized attribute taking an auxiliary parameter next to the node.
///
/// Caching is keyed on `(node identity, parameter)`; everything else
/// follows [`Attr`].
pub struct ParamAttr<T: AstNode, P: Hash + Eq + Clone, V: Clone> {
    name: String,
    tree: Rc<Tree<T>>,
    rule: Box<dyn Fn(NodeId, &P) -> RuleOutcome<V>>,
    cache: AttrCache<(NodeId, P), V>,
}

impl<T: AstNode, P: Hash + Eq + Clone, V: Clone> ParamAttr<T, P, V> {
    pub fn new(
        name: impl Into<String>,
        tree: Rc<Tree<T>>,
        rule: impl Fn(NodeId, &P) -> RuleOutcome<V> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            tree,
            rule: Box::new(rule),
            cache: AttrCache::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, node: NodeId, param: P) -> Result<V, Error> {
        let key = (node, param);
        if let Some(value) = self.cache.computed(&key) {
            return Ok(value);
        }
        let guard = EvalGuard::begin(
            &self.name,
            || self.tree.render(node),
            &self.cache,
            key.clone(),
        )?;
        let value = (self.rule)(node, &key.1)?.ok_or_else(|| Error::NoRuleFor {
            attribute: self.name.clone(),
            node: self.tree.render(node),
        })?;
        guard.complete(value.clone());
        Ok(value)
    }

    pub fn has_been_computed_at(&self, node: NodeId, param: P) -> bool {
        self.cache.is_computed(&(node, param))
    }

    pub fn reset(&self) {
        debug!("attribute `{}`: cache reset", self.name);
        self.cache.clear();
    }
}
