//! Statement insertion.

use crate::aspect::context::AdviceContext;
use crate::ast::{AssignOp, BlockStmt, Expr, NodeMut, Stmt, StmtKind};
use crate::fingerprint::{Hashable, Hasher};

use super::code::Template;
use super::{unsupported, Advice, AdviceError, AdviceOrder};

/// The statement list advice inserts into, when the node has one.
fn body(node: NodeMut<'_>) -> Option<&mut BlockStmt> {
    match node {
        NodeMut::Block(block) => Some(block),
        NodeMut::FuncDecl(func) => func.body.as_mut(),
        NodeMut::Expr(Expr::FuncLit(lit)) => Some(&mut lit.body),
        NodeMut::Stmt(Stmt {
            kind: StmtKind::Block(block),
            ..
        }) => Some(block),
        _ => None,
    }
}

/// Functions declared without a body are implemented elsewhere (assembly,
/// `go:linkname`); there is nothing to insert into.
fn bodiless(ctx: &mut AdviceContext<'_>) -> bool {
    matches!(ctx.node_mut(), NodeMut::FuncDecl(func) if func.body.is_none())
}

/// Statements that can be moved into a new block without changing which
/// names are in scope after them.
fn wrappable(stmt: &Stmt) -> bool {
    !matches!(
        stmt.kind,
        StmtKind::Decl(_)
            | StmtKind::Labeled { .. }
            | StmtKind::Assign(crate::ast::AssignStmt {
                tok: AssignOp::Define,
                ..
            })
    )
}

/// Turns a lone statement into a block holding it, so statements can be
/// inserted next to it.
fn wrap(stmt: &mut Stmt) -> Option<&mut BlockStmt> {
    if !matches!(stmt.kind, StmtKind::Block(_)) {
        let original = std::mem::replace(stmt, Stmt::new(StmtKind::Empty));
        stmt.kind = StmtKind::Block(BlockStmt::new(vec![original]));
    }
    match &mut stmt.kind {
        StmtKind::Block(block) => Some(block),
        _ => None,
    }
}

fn is_terminal(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::Expr(Expr::Call(call)) => {
            matches!(call.fun.as_ref(), Expr::Ident(ident) if ident.path.is_none() && ident.name == "panic")
        }
        _ => false,
    }
}

/// Inserts statements at the start of a block, function body or statement.
#[derive(Debug, Clone, PartialEq)]
pub struct PrependStatements {
    pub template: Template,
    pub order: Option<AdviceOrder>,
}

impl PrependStatements {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            order: None,
        }
    }

    pub fn with_order(mut self, order: AdviceOrder) -> Self {
        self.order = Some(order);
        self
    }
}

impl Advice for PrependStatements {
    fn apply(&self, ctx: &mut AdviceContext<'_>) -> Result<bool, AdviceError> {
        if bodiless(ctx) {
            return Ok(false);
        }
        let stmts = self.template.compile_block(ctx)?.list;
        if stmts.is_empty() {
            return Ok(false);
        }
        let at = ctx.reserve_prepend(stmts.len());
        let kind = ctx.kind();
        let block = match ctx.node_mut() {
            NodeMut::Stmt(stmt) if wrappable(stmt) => wrap(stmt),
            node => body(node),
        };
        let Some(block) = block else {
            return Err(unsupported(self.kind(), kind));
        };
        let at = at.min(block.list.len());
        block.list.splice(at..at, stmts);
        Ok(true)
    }

    fn added_imports(&self) -> Vec<String> {
        self.template.added_imports()
    }

    fn order(&self) -> Option<AdviceOrder> {
        self.order.clone()
    }

    fn kind(&self) -> &'static str {
        "prepend-statements"
    }
}

impl Hashable for PrependStatements {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(self.kind(), &[&self.template, &self.order]);
    }
}

/// Inserts statements at the end of a block, before a final `return` or
/// `panic`.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendStatements {
    pub template: Template,
    pub order: Option<AdviceOrder>,
}

impl AppendStatements {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            order: None,
        }
    }

    pub fn with_order(mut self, order: AdviceOrder) -> Self {
        self.order = Some(order);
        self
    }
}

impl Advice for AppendStatements {
    fn apply(&self, ctx: &mut AdviceContext<'_>) -> Result<bool, AdviceError> {
        if bodiless(ctx) {
            return Ok(false);
        }
        let stmts = self.template.compile_block(ctx)?.list;
        if stmts.is_empty() {
            return Ok(false);
        }
        let kind = ctx.kind();
        let block = match ctx.node_mut() {
            NodeMut::Stmt(stmt) if wrappable(stmt) && !is_terminal(stmt) => wrap(stmt),
            node => body(node),
        };
        let Some(block) = block else {
            return Err(unsupported(self.kind(), kind));
        };
        let at = match block.list.last() {
            Some(last) if is_terminal(last) => block.list.len() - 1,
            _ => block.list.len(),
        };
        block.list.splice(at..at, stmts);
        Ok(true)
    }

    fn added_imports(&self) -> Vec<String> {
        self.template.added_imports()
    }

    fn order(&self) -> Option<AdviceOrder> {
        self.order.clone()
    }

    fn kind(&self) -> &'static str {
        "append-statements"
    }
}

impl Hashable for AppendStatements {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(self.kind(), &[&self.template, &self.order]);
    }
}
