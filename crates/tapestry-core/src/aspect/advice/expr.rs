//! Expression rewrites.

use crate::aspect::context::AdviceContext;
use crate::ast::{
    BlockStmt, CallExpr, Expr, Field, FieldList, FuncLit, FuncType, Ident, Node, NodeMut, Spec,
    Stmt, StmtKind,
};
use crate::fingerprint::{Hashable, Hasher};
use crate::typed::Type;

use super::code::Template;
use super::{unsupported, Advice, AdviceError};

/// Sets the values of a `var`/`const` spec, one copy per declared name.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignValue {
    pub template: Template,
}

impl AssignValue {
    pub fn new(template: Template) -> Self {
        Self { template }
    }
}

impl Advice for AssignValue {
    fn apply(&self, ctx: &mut AdviceContext<'_>) -> Result<bool, AdviceError> {
        let kind = ctx.kind();
        if !matches!(ctx.node_mut(), NodeMut::Spec(Spec::Value(_))) {
            return Err(unsupported(self.kind(), kind));
        }
        let value = self.template.compile_expression(ctx)?;
        let NodeMut::Spec(Spec::Value(spec)) = ctx.node_mut() else {
            return Err(unsupported(self.kind(), kind));
        };
        spec.values = vec![value; spec.names.len()];
        Ok(true)
    }

    fn added_imports(&self) -> Vec<String> {
        self.template.added_imports()
    }

    fn kind(&self) -> &'static str {
        "assign-value"
    }
}

impl Hashable for AssignValue {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(self.kind(), &[&self.template]);
    }
}

/// Replaces an expression with the template's rendering, which usually
/// embeds the original through `{{ .AST }}`. On a keyed element of a
/// composite literal, the element's value is wrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapExpression {
    pub template: Template,
}

impl WrapExpression {
    pub fn new(template: Template) -> Self {
        Self { template }
    }
}

impl Advice for WrapExpression {
    fn apply(&self, ctx: &mut AdviceContext<'_>) -> Result<bool, AdviceError> {
        let kind = ctx.kind();
        let keyed_value = match ctx.node_mut() {
            NodeMut::Expr(Expr::KeyValue { value, .. }) => Some(Node::Expr(value.as_ref().clone())),
            NodeMut::Expr(_) => None,
            _ => return Err(unsupported(self.kind(), kind)),
        };
        match keyed_value {
            Some(value) => {
                let wrapped = self.template.compile_expression_on(ctx, value)?;
                if let NodeMut::Expr(Expr::KeyValue { value, .. }) = ctx.node_mut() {
                    **value = wrapped;
                }
            }
            None => {
                let wrapped = self.template.compile_expression(ctx)?;
                ctx.replace_node(Node::Expr(wrapped))?;
            }
        }
        Ok(true)
    }

    fn added_imports(&self) -> Vec<String> {
        self.template.added_imports()
    }

    fn kind(&self) -> &'static str {
        "wrap-expression"
    }
}

impl Hashable for WrapExpression {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(self.kind(), &[&self.template]);
    }
}

/// Points a call at another package-level function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceFunction {
    pub import_path: String,
    pub name: String,
}

impl ReplaceFunction {
    pub fn new(import_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            import_path: import_path.into(),
            name: name.into(),
        }
    }
}

impl Advice for ReplaceFunction {
    fn apply(&self, ctx: &mut AdviceContext<'_>) -> Result<bool, AdviceError> {
        let local = ctx.import_path() == self.import_path;
        let kind = ctx.kind();
        let NodeMut::Expr(Expr::Call(call)) = ctx.node_mut() else {
            return Err(unsupported(self.kind(), kind));
        };
        *call.fun = if local {
            Expr::ident(&self.name)
        } else {
            Expr::qualified(&self.import_path, &self.name)
        };
        if !local {
            ctx.add_reference(&self.import_path);
        }
        Ok(true)
    }

    fn added_imports(&self) -> Vec<String> {
        vec![self.import_path.clone()]
    }

    /// A replacement from the woven package itself is left unqualified.
    fn imports_package(&self, _import_path: &str) -> bool {
        false
    }

    fn kind(&self) -> &'static str {
        "replace-function"
    }
}

impl Hashable for ReplaceFunction {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(self.kind(), &[&self.import_path, &self.name]);
    }
}

/// Appends arguments of one type to the variadic tail of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendArgs {
    pub ty: Type,
    pub values: Vec<Template>,
}

const SPREAD_PARAM: &str = "__opts";

impl AppendArgs {
    pub fn new(ty: Type, values: Vec<Template>) -> Self {
        Self { ty, values }
    }

    /// `func(opts ...T) []T { return append(opts, values...) }`
    fn merge_closure(&self, values: Vec<Expr>) -> Expr {
        let elt = self.ty.as_node();
        let params = FieldList::new(vec![Field::new(
            vec![Ident::new(SPREAD_PARAM)],
            Expr::Ellipsis(Some(Box::new(elt.clone()))),
        )]);
        let results = FieldList::new(vec![Field::new(
            Vec::new(),
            Expr::ArrayType {
                len: None,
                elt: Box::new(elt),
            },
        )]);
        let mut args = vec![Expr::ident(SPREAD_PARAM)];
        args.extend(values);
        let body = BlockStmt::new(vec![Stmt::new(StmtKind::Return(vec![Expr::call(
            Expr::ident("append"),
            args,
        )]))]);
        Expr::FuncLit(FuncLit {
            ty: FuncType {
                type_params: None,
                params,
                results,
            },
            body,
        })
    }
}

impl Advice for AppendArgs {
    fn apply(&self, ctx: &mut AdviceContext<'_>) -> Result<bool, AdviceError> {
        let kind = ctx.kind();
        if !matches!(ctx.node_mut(), NodeMut::Expr(Expr::Call(_))) {
            return Err(unsupported(self.kind(), kind));
        }
        let mut values = Vec::with_capacity(self.values.len());
        for template in &self.values {
            values.push(template.compile_expression(ctx)?);
        }
        if values.is_empty() {
            return Ok(false);
        }
        for path in self.ty.import_paths() {
            if path != ctx.import_path() {
                ctx.add_reference(&path);
            }
        }
        let NodeMut::Expr(Expr::Call(call)) = ctx.node_mut() else {
            return Err(unsupported(self.kind(), kind));
        };
        if call.ellipsis {
            if let Some(spread) = call.args.pop() {
                call.args.push(Expr::Call(CallExpr {
                    fun: Box::new(self.merge_closure(values)),
                    args: vec![spread],
                    ellipsis: true,
                }));
                return Ok(true);
            }
        }
        call.args.extend(values);
        Ok(true)
    }

    fn added_imports(&self) -> Vec<String> {
        let mut imports: Vec<String> = self.ty.import_paths().into_iter().collect();
        for template in &self.values {
            imports.extend(template.added_imports());
        }
        imports.sort();
        imports.dedup();
        imports
    }

    /// The element type may live in the woven package; only the value
    /// templates can import it.
    fn imports_package(&self, import_path: &str) -> bool {
        self.values
            .iter()
            .any(|template| template.added_imports().iter().any(|path| path == import_path))
    }

    fn kind(&self) -> &'static str {
        "append-args"
    }
}

impl Hashable for AppendArgs {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(self.kind(), &[&self.ty, &self.values]);
    }
}
