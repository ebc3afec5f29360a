//! Post-order traversal of a file with node chains.
//!
//! Children are visited in document order before their parent. While a
//! node's children are walked, the node itself is split into the parts its
//! children live in (borrowed mutably) and the parts its [`Frame`] exposes
//! (borrowed shared), so join points can look at ancestors while advice
//! rewrites a descendant.
//!
//! Function signatures are not walked: the signature stays readable from
//! the frame of the function while its body is rewritten, and parameter
//! names requested by advice are applied once the whole function has been
//! visited.

use tracing::warn;

use crate::aspect::context::{
    expr_token, stmt_token, AdviceContext, AspectContext, FileContext, FileState, FunctionEdits,
    FunctionView, Frame, NodeChain,
};
use crate::aspect::join::find_directive;
use crate::ast::*;

/// Directive excluding a node and everything under it from weaving.
pub const IGNORE_DIRECTIVE: &str = "tapestry:ignore";

/// Decides what to do at each node and does it.
pub(crate) trait Weaver {
    type Plan;
    type Error;

    /// Inspects a node; `None` leaves it untouched.
    fn plan(&mut self, ctx: &AspectContext<'_>) -> Option<Self::Plan>;

    fn apply(&mut self, plan: Self::Plan, ctx: &mut AdviceContext<'_>) -> Result<(), Self::Error>;
}

pub(crate) fn walk_file<W: Weaver>(
    file: &mut File,
    ctx: &FileContext<'_>,
    state: &mut FileState,
    weaver: &mut W,
) -> Result<(), W::Error> {
    let mut walker = Walker {
        file: ctx,
        state,
        weaver,
    };
    walker.node(None, NodeMut::File(file), "", None)
}

type Parent<'p, 'c> = Option<&'p NodeChain<'c>>;

struct Walker<'w, 'f, W: Weaver> {
    file: &'w FileContext<'f>,
    state: &'w mut FileState,
    weaver: &'w mut W,
}

fn ignored(decs: &Decorations) -> bool {
    find_directive(decs, IGNORE_DIRECTIVE).is_some()
}

impl<W: Weaver> Walker<'_, '_, W> {
    fn node(
        &mut self,
        parent: Parent<'_, '_>,
        mut node: NodeMut<'_>,
        field: &'static str,
        index: Option<usize>,
    ) -> Result<(), W::Error> {
        if node.as_ref().decs().is_some_and(ignored) {
            return Ok(());
        }
        let scoped = matches!(node, NodeMut::FuncDecl(_) | NodeMut::Expr(Expr::FuncLit(_)));
        if scoped {
            self.state.push_scope();
        }
        let result = self
            .children(parent, node.reborrow(), field, index)
            .and_then(|()| self.visit(parent, node.reborrow(), field, index));
        if scoped {
            let edits = self.state.pop_scope();
            if !edits.is_empty() {
                name_parameters(node, &edits);
            }
        }
        result
    }

    fn visit(
        &mut self,
        parent: Parent<'_, '_>,
        node: NodeMut<'_>,
        field: &'static str,
        index: Option<usize>,
    ) -> Result<(), W::Error> {
        let plan = {
            let chain = NodeChain::of(parent, node.as_ref(), field, index);
            self.weaver.plan(&AspectContext::new(&chain, self.file))
        };
        let Some(plan) = plan else {
            return Ok(());
        };
        let mut ctx = AdviceContext::new(node, parent, field, index, self.file, self.state);
        self.weaver.apply(plan, &mut ctx)
    }

    fn stmt(
        &mut self,
        parent: Parent<'_, '_>,
        stmt: &mut Stmt,
        field: &'static str,
        index: Option<usize>,
    ) -> Result<(), W::Error> {
        self.node(parent, NodeMut::Stmt(stmt), field, index)
    }

    fn stmts(&mut self, parent: Parent<'_, '_>, stmts: &mut [Stmt], field: &'static str) -> Result<(), W::Error> {
        for (i, stmt) in stmts.iter_mut().enumerate() {
            self.stmt(parent, stmt, field, Some(i))?;
        }
        Ok(())
    }

    fn expr(
        &mut self,
        parent: Parent<'_, '_>,
        expr: &mut Expr,
        field: &'static str,
        index: Option<usize>,
    ) -> Result<(), W::Error> {
        self.node(parent, NodeMut::Expr(expr), field, index)
    }

    fn exprs(&mut self, parent: Parent<'_, '_>, exprs: &mut [Expr], field: &'static str) -> Result<(), W::Error> {
        for (i, expr) in exprs.iter_mut().enumerate() {
            self.expr(parent, expr, field, Some(i))?;
        }
        Ok(())
    }

    fn block(&mut self, parent: Parent<'_, '_>, block: &mut BlockStmt, field: &'static str) -> Result<(), W::Error> {
        self.node(parent, NodeMut::Block(block), field, None)
    }

    fn children(
        &mut self,
        parent: Parent<'_, '_>,
        node: NodeMut<'_>,
        field: &'static str,
        index: Option<usize>,
    ) -> Result<(), W::Error> {
        match node {
            NodeMut::File(file) => {
                let chain = NodeChain::new(parent, Frame::new(NodeKind::File).with_decs(&file.decs), field, index);
                for (i, decl) in file.decls.iter_mut().enumerate() {
                    let node = match decl {
                        Decl::Func(func) => NodeMut::FuncDecl(func),
                        Decl::Gen(gen) => NodeMut::GenDecl(gen),
                    };
                    self.node(Some(&chain), node, "Decls", Some(i))?;
                }
                Ok(())
            }
            NodeMut::FuncDecl(func) => {
                let FuncDecl {
                    decs,
                    recv,
                    name,
                    ty,
                    body,
                } = func;
                let Some(body) = body else {
                    return Ok(());
                };
                let mut frame = Frame::new(NodeKind::FuncDecl).with_decs(decs);
                frame.function = Some(FunctionView {
                    name: Some(&*name),
                    receiver: recv.as_ref(),
                    ty: &*ty,
                });
                let chain = NodeChain::new(parent, frame, field, index);
                self.block(Some(&chain), body, "Body")
            }
            NodeMut::GenDecl(gen) => {
                let GenDecl { decs, tok, specs, .. } = gen;
                let mut frame = Frame::new(NodeKind::GenDecl).with_decs(decs);
                frame.token = Some(tok.as_str());
                frame.arity = Some(specs.len());
                let chain = NodeChain::new(parent, frame, field, index);
                for (i, spec) in specs.iter_mut().enumerate() {
                    self.node(Some(&chain), NodeMut::Spec(spec), "Specs", Some(i))?;
                }
                Ok(())
            }
            NodeMut::Spec(Spec::Import(_)) => Ok(()),
            NodeMut::Spec(Spec::Value(spec)) => {
                let frame = Frame::new(NodeKind::ValueSpec).with_decs(&spec.decs);
                let chain = NodeChain::new(parent, frame, field, index);
                self.exprs(Some(&chain), &mut spec.values, "Values")
            }
            NodeMut::Spec(Spec::Type(spec)) => {
                let Expr::StructType(fields) = &mut spec.ty else {
                    return Ok(());
                };
                let frame = Frame::new(NodeKind::TypeSpec).with_decs(&spec.decs);
                let chain = NodeChain::new(parent, frame, field, index);
                for (i, entry) in fields.list.iter_mut().enumerate() {
                    self.node(Some(&chain), NodeMut::Field(entry), "List", Some(i))?;
                }
                Ok(())
            }
            NodeMut::Field(_) => Ok(()),
            NodeMut::Block(block) => {
                let chain = NodeChain::new(parent, Frame::new(NodeKind::Block), field, index);
                self.stmts(Some(&chain), &mut block.list, "List")
            }
            NodeMut::Stmt(stmt) => self.stmt_children(parent, stmt, field, index),
            NodeMut::Expr(expr) => self.expr_children(parent, expr, field, index),
        }
    }

    fn stmt_children(
        &mut self,
        parent: Parent<'_, '_>,
        stmt: &mut Stmt,
        field: &'static str,
        index: Option<usize>,
    ) -> Result<(), W::Error> {
        let Stmt { decs, kind } = stmt;
        let mut frame = Frame::new(NodeKind::of_stmt(kind)).with_decs(decs);
        frame.token = stmt_token(kind);
        let chain = NodeChain::new(parent, frame, field, index);
        let here = Some(&chain);
        match kind {
            StmtKind::Decl(gen) => self.node(here, NodeMut::GenDecl(gen), "Decl", None),
            StmtKind::Empty | StmtKind::Branch { .. } => Ok(()),
            StmtKind::Labeled { stmt, .. } => self.stmt(here, stmt, "Stmt", None),
            StmtKind::Expr(x) | StmtKind::IncDec { x, .. } => self.expr(here, x, "X", None),
            StmtKind::Send { chan, value } => {
                self.expr(here, chan, "Chan", None)?;
                self.expr(here, value, "Value", None)
            }
            StmtKind::Assign(assign) => {
                self.exprs(here, &mut assign.lhs, "Lhs")?;
                self.exprs(here, &mut assign.rhs, "Rhs")
            }
            StmtKind::Go(call) | StmtKind::Defer(call) => self.expr(here, call, "Call", None),
            StmtKind::Return(results) => self.exprs(here, results, "Results"),
            StmtKind::Block(block) => self.stmts(here, &mut block.list, "List"),
            StmtKind::If(IfStmt { init, cond, body, els }) => {
                if let Some(init) = init {
                    self.stmt(here, init, "Init", None)?;
                }
                self.expr(here, cond, "Cond", None)?;
                self.block(here, body, "Body")?;
                if let Some(els) = els {
                    self.stmt(here, els, "Else", None)?;
                }
                Ok(())
            }
            StmtKind::Switch(SwitchStmt { init, tag, body }) => {
                if let Some(init) = init {
                    self.stmt(here, init, "Init", None)?;
                }
                if let Some(tag) = tag {
                    self.expr(here, tag, "Tag", None)?;
                }
                self.case_clauses(here, body)
            }
            StmtKind::TypeSwitch(TypeSwitchStmt { init, x, body, .. }) => {
                if let Some(init) = init {
                    self.stmt(here, init, "Init", None)?;
                }
                self.expr(here, x, "Assign", None)?;
                self.case_clauses(here, body)
            }
            StmtKind::Select(clauses) => {
                for (i, clause) in clauses.iter_mut().enumerate() {
                    let CommClause { decs, comm, body } = clause;
                    let frame = Frame::new(NodeKind::CommClause).with_decs(decs);
                    let clause_chain = NodeChain::new(here, frame, "Body", Some(i));
                    if let Some(comm) = comm {
                        self.stmt(Some(&clause_chain), comm, "Comm", None)?;
                    }
                    self.stmts(Some(&clause_chain), body, "Body")?;
                }
                Ok(())
            }
            StmtKind::For(ForStmt { init, cond, post, body }) => {
                if let Some(init) = init {
                    self.stmt(here, init, "Init", None)?;
                }
                if let Some(cond) = cond {
                    self.expr(here, cond, "Cond", None)?;
                }
                if let Some(post) = post {
                    self.stmt(here, post, "Post", None)?;
                }
                self.block(here, body, "Body")
            }
            StmtKind::Range(RangeStmt { key, value, x, body, .. }) => {
                if let Some(key) = key {
                    self.expr(here, key, "Key", None)?;
                }
                if let Some(value) = value {
                    self.expr(here, value, "Value", None)?;
                }
                self.expr(here, x, "X", None)?;
                self.block(here, body, "Body")
            }
        }
    }

    fn case_clauses(&mut self, parent: Parent<'_, '_>, clauses: &mut [CaseClause]) -> Result<(), W::Error> {
        for (i, clause) in clauses.iter_mut().enumerate() {
            let CaseClause { decs, list, body, .. } = clause;
            let frame = Frame::new(NodeKind::CaseClause).with_decs(decs);
            let chain = NodeChain::new(parent, frame, "Body", Some(i));
            self.exprs(Some(&chain), list, "List")?;
            self.stmts(Some(&chain), body, "Body")?;
        }
        Ok(())
    }

    fn expr_children(
        &mut self,
        parent: Parent<'_, '_>,
        expr: &mut Expr,
        field: &'static str,
        index: Option<usize>,
    ) -> Result<(), W::Error> {
        let mut frame = Frame::new(NodeKind::of_expr(expr));
        frame.token = expr_token(expr);
        match expr {
            Expr::CompositeLit(CompositeLit { ty, elts, .. }) => {
                frame.composite_type = ty.as_deref();
                let chain = NodeChain::new(parent, frame, field, index);
                self.exprs(Some(&chain), elts, "Elts")
            }
            Expr::FuncLit(FuncLit { ty, body }) => {
                frame.function = Some(FunctionView {
                    name: None,
                    receiver: None,
                    ty: &*ty,
                });
                let chain = NodeChain::new(parent, frame, field, index);
                self.block(Some(&chain), body, "Body")
            }
            Expr::Paren(x)
            | Expr::Selector { x, .. }
            | Expr::TypeAssert { x, .. }
            | Expr::Star(x)
            | Expr::Unary { x, .. } => {
                let chain = NodeChain::new(parent, frame, field, index);
                self.expr(Some(&chain), x, "X", None)
            }
            Expr::Index { x, indices } => {
                let chain = NodeChain::new(parent, frame, field, index);
                self.expr(Some(&chain), x, "X", None)?;
                self.exprs(Some(&chain), indices, "Index")
            }
            Expr::Slice { x, low, high, max, .. } => {
                let chain = NodeChain::new(parent, frame, field, index);
                let here = Some(&chain);
                self.expr(here, x, "X", None)?;
                for (bound, name) in [(low, "Low"), (high, "High"), (max, "Max")] {
                    if let Some(bound) = bound {
                        self.expr(here, bound, name, None)?;
                    }
                }
                Ok(())
            }
            Expr::Call(CallExpr { fun, args, .. }) => {
                let chain = NodeChain::new(parent, frame, field, index);
                self.expr(Some(&chain), fun, "Fun", None)?;
                self.exprs(Some(&chain), args, "Args")
            }
            Expr::Binary { x, y, .. } => {
                let chain = NodeChain::new(parent, frame, field, index);
                self.expr(Some(&chain), x, "X", None)?;
                self.expr(Some(&chain), y, "Y", None)
            }
            Expr::KeyValue { key, value } => {
                let chain = NodeChain::new(parent, frame, field, index);
                self.expr(Some(&chain), key, "Key", None)?;
                self.expr(Some(&chain), value, "Value", None)
            }
            // Identifiers, literals and type expressions.
            _ => Ok(()),
        }
    }
}

/// Applies the parameter names advice requested while the function was
/// visited.
fn name_parameters(node: NodeMut<'_>, edits: &FunctionEdits) {
    match node {
        NodeMut::FuncDecl(func) => edits.apply(func.recv.as_mut(), &mut func.ty),
        NodeMut::Expr(Expr::FuncLit(lit)) => edits.apply(None, &mut lit.ty),
        other => warn!(
            kind = %other.as_ref().kind(),
            "function was replaced before its parameters could be named"
        ),
    }
}
