use strum::{EnumIs, EnumTryAs};
use thiserror::Error;

/// What one rule application produced.
///
/// `Ok(None)` means no case of the rule matched the node; the engine turns
/// that into [`Error::NoRuleFor`] (basic and circular attributes) or falls
/// through to the next rule on the stack (dynamic attributes). `Err`
/// propagates failures from nested attribute calls inside the rule body,
/// so rules can use `?` on `get` results.
pub type RuleOutcome<V> = Result<Option<V>, Error>;

/// Evaluation failures surfaced to the embedding language processor.
///
/// Every variant is local to one `get` call: the engine performs no retry
/// and no partial-result recovery, and the affected cache cell is left
/// absent so a corrected rule set can be retried later.
#[derive(Debug, Clone, PartialEq, Eq, EnumIs, EnumTryAs, Error)]
pub enum Error {
    /// The rule set was evaluated against a node whose variant (and any
    /// structural guard) matches none of its cases.
    #[error("no rule of attribute `{attribute}` applies to the node {node}")]
    NoRuleFor { attribute: String, node: String },

    /// Re-entrant evaluation of the same (attribute, node) pair outside an
    /// active circular fixpoint pass.
    #[error(
        "cycle detected: attribute `{attribute}` re-entered its own evaluation at node {node}. Use a circular attribute if this definition is meant to be self-referential."
    )]
    Cycle { attribute: String, node: String },
}
