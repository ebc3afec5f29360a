/*!
# Advice

Advice rewrites the node a join point matched. Every advice reports whether
it changed anything; structural preconditions (advice bound to a join point
matching the wrong kind of node) are errors, never panics.

When several aspects match the same node, their advice is applied in the
order given by [`sort_advice`]: namespace, then explicit order, then the
position the advice was defined at.
*/

pub mod code;

mod block;
mod decl;
mod expr;

#[cfg(test)]
mod tests;

use std::fmt;

use crate::aspect::context::AdviceContext;
use crate::ast::NodeKind;
use crate::fingerprint::{Hashable, Hasher};

pub use block::{AppendStatements, PrependStatements};
pub use code::{Template, TemplateError};
pub use decl::{AddBlankImport, AddComment, AddStructField, InjectDeclarations};
pub use expr::{AppendArgs, AssignValue, ReplaceFunction, WrapExpression};

#[derive(thiserror::Error, Debug)]
pub enum AdviceError {
    #[error("{advice} can't be applied to {kind}")]
    UnsupportedNode { advice: &'static str, kind: NodeKind },

    #[error("expected a replacement for {expected}, got {found}")]
    Mismatch { expected: String, found: String },

    #[error("{kind} can't be replaced")]
    NotReplaceable { kind: NodeKind },

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Placement of an advice among the advice applied to the same node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AdviceOrder {
    pub namespace: String,
    pub order: i64,
}

impl AdviceOrder {
    pub fn new(namespace: impl Into<String>, order: i64) -> Self {
        Self {
            namespace: namespace.into(),
            order,
        }
    }
}

impl Default for AdviceOrder {
    fn default() -> Self {
        Self::new("default", 0)
    }
}

impl Hashable for AdviceOrder {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("order", &[&self.namespace, &self.order]);
    }
}

pub trait Advice: Hashable + fmt::Debug + Send + Sync {
    /// Applies the advice to the node of `ctx`. Returns whether the tree or
    /// the file's accumulators changed.
    fn apply(&self, ctx: &mut AdviceContext<'_>) -> Result<bool, AdviceError>;

    /// Import paths the advice may add to a file.
    fn added_imports(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether applying the advice inside `import_path` would make that
    /// package import itself.
    fn imports_package(&self, import_path: &str) -> bool {
        self.added_imports().iter().any(|path| path == import_path)
    }

    /// Explicit placement; advice without one sorts as `("default", 0)`.
    fn order(&self) -> Option<AdviceOrder> {
        None
    }

    /// Name of the advice in configuration files.
    fn kind(&self) -> &'static str;
}

/// An advice tagged with everything it sorts by.
#[derive(Debug, Clone, Copy)]
pub struct OrderedAdvice<'a> {
    pub aspect_id: &'a str,
    /// Definition index across the whole aspect set.
    pub index: usize,
    pub advice: &'a dyn Advice,
}

impl<'a> OrderedAdvice<'a> {
    pub fn new(aspect_id: &'a str, index: usize, advice: &'a dyn Advice) -> Self {
        Self {
            aspect_id,
            index,
            advice,
        }
    }

    fn key(&self) -> (AdviceOrder, usize) {
        (self.advice.order().unwrap_or_default(), self.index)
    }
}

/// Sorts advice by namespace, then order, then definition index. The sort
/// is stable, so advice agreeing on all three keeps its relative position.
pub fn sort_advice(advice: &mut [OrderedAdvice<'_>]) {
    advice.sort_by_cached_key(OrderedAdvice::key);
}

pub(crate) fn unsupported(advice: &'static str, kind: NodeKind) -> AdviceError {
    AdviceError::UnsupportedNode { advice, kind }
}
