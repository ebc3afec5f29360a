//! Struct definitions and literals.

use serde::Deserialize;

use crate::aspect::context::AspectContext;
use crate::ast::{Expr, NodeKind, NodeRef, Spec, UnaryOp};
use crate::fingerprint::{Hashable, Hasher};
use crate::typed::NamedType;

use super::{FileMayMatchContext, MatchType, PackageMayMatchContext, Point};

/// The declaration of a struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDefinition(pub NamedType);

impl Point for StructDefinition {
    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        MatchType::unless_never(self.0.import_path.as_deref() == Some(ctx.import_path))
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        MatchType::unless_never(ctx.contains(&self.0.name))
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        if self.0.import_path.as_deref() != Some(ctx.import_path()) {
            return false;
        }
        match ctx.node() {
            Some(NodeRef::Spec(Spec::Type(spec))) => {
                spec.name.name == self.0.name && matches!(spec.ty, Expr::StructType(_))
            }
            _ => false,
        }
    }
}

impl Hashable for StructDefinition {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("struct-definition", &[&self.0]);
    }
}

/// Which composite literals of a struct type a [`StructLiteral`] matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructLiteralMatch {
    /// Every `T{...}` literal, whether or not its address is taken.
    #[default]
    Any,
    /// `T{...}` literals whose address is not taken.
    ValueOnly,
    /// `&T{...}` expressions.
    PointerOnly,
}

impl StructLiteralMatch {
    fn as_str(self) -> &'static str {
        match self {
            StructLiteralMatch::Any => "any",
            StructLiteralMatch::ValueOnly => "value-only",
            StructLiteralMatch::PointerOnly => "pointer-only",
        }
    }
}

/// Composite literals of a struct type, or one keyed field inside them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLiteral {
    pub ty: NamedType,
    pub field: Option<String>,
    pub kind: StructLiteralMatch,
}

impl StructLiteral {
    pub fn new(ty: NamedType, kind: StructLiteralMatch) -> Self {
        Self {
            ty,
            field: None,
            kind,
        }
    }

    pub fn field(ty: NamedType, field: impl Into<String>) -> Self {
        Self {
            ty,
            field: Some(field.into()),
            kind: StructLiteralMatch::Any,
        }
    }

    fn is_literal_type(&self, ty: Option<&Expr>, import_path: &str) -> bool {
        ty.is_some_and(|ty| self.ty.matches_in(ty, Some(import_path)))
    }

    fn is_literal(&self, expr: &Expr, import_path: &str) -> bool {
        match expr.unparen() {
            Expr::CompositeLit(lit) => self.is_literal_type(lit.ty.as_deref(), import_path),
            _ => false,
        }
    }

    fn address_taken(ctx: &AspectContext<'_>) -> bool {
        ctx.parent().is_some_and(|parent| {
            parent.kind() == NodeKind::UnaryExpr && parent.token() == Some(UnaryOp::And.as_str())
        })
    }

    fn matches_literal(&self, ctx: &AspectContext<'_>) -> bool {
        let Some(NodeRef::Expr(expr)) = ctx.node() else {
            return false;
        };
        match self.kind {
            StructLiteralMatch::Any => self.is_literal(expr, ctx.import_path()),
            StructLiteralMatch::ValueOnly => {
                self.is_literal(expr, ctx.import_path()) && !Self::address_taken(ctx)
            }
            StructLiteralMatch::PointerOnly => match expr {
                Expr::Unary {
                    op: UnaryOp::And,
                    x,
                } => self.is_literal(x, ctx.import_path()),
                _ => false,
            },
        }
    }

    fn matches_field(&self, field: &str, ctx: &AspectContext<'_>) -> bool {
        let Some(NodeRef::Expr(Expr::KeyValue { key, .. })) = ctx.node() else {
            return false;
        };
        if !matches!(key.as_ref(), Expr::Ident(ident) if ident.path.is_none() && ident.name == field) {
            return false;
        }
        let Some(literal) = ctx.parent() else {
            return false;
        };
        if literal.kind() != NodeKind::CompositeLit
            || !self.is_literal_type(literal.composite_type(), ctx.import_path())
        {
            return false;
        }
        match self.kind {
            StructLiteralMatch::Any => true,
            StructLiteralMatch::ValueOnly => !Self::address_taken(&literal),
            StructLiteralMatch::PointerOnly => Self::address_taken(&literal),
        }
    }
}

impl Point for StructLiteral {
    fn implies_imported(&self) -> Vec<String> {
        self.ty.import_path.iter().cloned().collect()
    }

    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        match &self.ty.import_path {
            Some(path) => MatchType::unless_never(path == ctx.import_path || ctx.imports(path)),
            None => MatchType::Unknown,
        }
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        let mut result = MatchType::unless_never(ctx.contains(&self.ty.name));
        if let Some(field) = &self.field {
            result = result.and(MatchType::unless_never(ctx.contains(field)));
        }
        result
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        match &self.field {
            Some(field) => self.matches_field(field, ctx),
            None => self.matches_literal(ctx),
        }
    }
}

impl Hashable for StructLiteral {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(
            "struct-literal",
            &[&self.ty, &self.field, &self.kind.as_str()],
        );
    }
}
