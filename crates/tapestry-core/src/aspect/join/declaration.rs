//! Declarations and assignments.

use crate::aspect::context::AspectContext;
use crate::ast::{Expr, NodeRef, Spec, StmtKind};
use crate::fingerprint::{Hashable, Hasher};
use crate::typed::Type;

use super::{FileMayMatchContext, MatchType, PackageMayMatchContext, Point};

/// The declaration of a package-level function, variable, constant or type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationOf {
    pub import_path: String,
    pub name: String,
}

impl DeclarationOf {
    pub fn new(import_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            import_path: import_path.into(),
            name: name.into(),
        }
    }
}

impl Point for DeclarationOf {
    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        MatchType::unless_never(ctx.import_path == self.import_path)
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        MatchType::unless_never(ctx.contains(&self.name))
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        if ctx.import_path() != self.import_path {
            return false;
        }
        match ctx.node() {
            Some(NodeRef::FuncDecl(func)) => func.recv.is_none() && func.name.name == self.name,
            Some(NodeRef::Spec(Spec::Value(spec))) => {
                spec.names.iter().any(|name| name.name == self.name)
            }
            Some(NodeRef::Spec(Spec::Type(spec))) => spec.name.name == self.name,
            _ => false,
        }
    }
}

impl Hashable for DeclarationOf {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("declaration-of", &[&self.import_path, &self.name]);
    }
}

/// A `var` or `const` specification declared with the given type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDeclaration(pub Type);

impl Point for ValueDeclaration {
    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        match self.0.base_named() {
            Some(named) => MatchType::unless_never(ctx.contains(&named.name)),
            None => MatchType::Unknown,
        }
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        match ctx.node() {
            Some(NodeRef::Spec(Spec::Value(spec))) => spec
                .ty
                .as_ref()
                .is_some_and(|ty| self.0.matches_in_package(ty, ctx.import_path())),
            _ => false,
        }
    }
}

impl Hashable for ValueDeclaration {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("value-declaration", &[&self.0]);
    }
}

/// An assignment or `var` specification with at least one assigned value
/// matching the inner join point.
#[derive(Debug)]
pub struct AssignmentOf(pub Box<dyn Point>);

impl AssignmentOf {
    fn any_value<'a>(&self, ctx: &AspectContext<'a>, field: &'static str, values: &'a [Expr]) -> bool {
        values.iter().enumerate().any(|(index, value)| {
            ctx.with_child(NodeRef::Expr(value), field, Some(index), |child| {
                self.0.matches(&child)
            })
        })
    }
}

impl Point for AssignmentOf {
    fn implies_imported(&self) -> Vec<String> {
        self.0.implies_imported()
    }

    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        match self.0.package_may_match(ctx) {
            MatchType::NeverMatch => MatchType::NeverMatch,
            _ => MatchType::Unknown,
        }
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        match self.0.file_may_match(ctx) {
            MatchType::NeverMatch => MatchType::NeverMatch,
            _ => MatchType::Unknown,
        }
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        match ctx.node() {
            Some(NodeRef::Stmt(stmt)) => match &stmt.kind {
                StmtKind::Assign(assign) => self.any_value(ctx, "Rhs", &assign.rhs),
                _ => false,
            },
            Some(NodeRef::Spec(Spec::Value(spec))) => self.any_value(ctx, "Values", &spec.values),
            _ => false,
        }
    }
}

impl Hashable for AssignmentOf {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("assignment-of", &[&self.0]);
    }
}

