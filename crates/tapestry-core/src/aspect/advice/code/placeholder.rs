//! Splices captured syntax nodes back into generated code.
//!
//! Captured expressions and statements are rendered as `_.__PLACEHOLDER_n__`,
//! which parses as a selector on the blank identifier in both expression and
//! statement position. Once the generated code is parsed, every such selector
//! is swapped for a copy of capture `n`.

use std::collections::BTreeSet;

use crate::ast::visit::{walk_expr_mut, walk_stmt_mut, VisitMut};
use crate::ast::{Expr, Ident, Node, Stmt, StmtKind};

use super::TemplateError;

const PREFIX: &str = "__PLACEHOLDER_";
const SUFFIX: &str = "__";

pub(crate) fn text(id: usize) -> String {
    format!("_.{PREFIX}{id}{SUFFIX}")
}

fn id_of(expr: &Expr) -> Option<usize> {
    match expr {
        Expr::Selector { x, sel } => match x.as_ref() {
            Expr::Ident(blank) if blank.path.is_none() && blank.name == "_" => sel
                .name
                .strip_prefix(PREFIX)?
                .strip_suffix(SUFFIX)?
                .parse()
                .ok(),
            _ => None,
        },
        _ => None,
    }
}

/// Replaces placeholders and collects the import paths referenced by the
/// generated code itself.
pub(crate) struct Splicer<'c> {
    captures: &'c [Node],
    pub(crate) paths: BTreeSet<String>,
    pub(crate) error: Option<TemplateError>,
}

impl<'c> Splicer<'c> {
    pub(crate) fn new(captures: &'c [Node]) -> Self {
        Self {
            captures,
            paths: BTreeSet::new(),
            error: None,
        }
    }

    fn capture(&mut self, id: usize) -> Option<&'c Node> {
        let node = self.captures.get(id);
        if node.is_none() && self.error.is_none() {
            self.error = Some(TemplateError::Splice {
                message: format!("unknown placeholder {id}"),
            });
        }
        node
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(TemplateError::Splice { message });
        }
    }
}

impl VisitMut for Splicer<'_> {
    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        let id = match &stmt.kind {
            StmtKind::Expr(expr) => id_of(expr),
            _ => None,
        };
        let Some(id) = id else {
            return walk_stmt_mut(self, stmt);
        };
        match self.capture(id) {
            Some(Node::Stmt(captured)) => *stmt = captured.clone(),
            Some(Node::Block(block)) => stmt.kind = StmtKind::Block(block.clone()),
            Some(Node::Expr(expr)) => stmt.kind = StmtKind::Expr(expr.clone()),
            Some(_) => self.fail(format!("placeholder {id} can't be used as a statement")),
            None => {}
        }
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        let Some(id) = id_of(expr) else {
            return walk_expr_mut(self, expr);
        };
        match self.capture(id) {
            Some(Node::Expr(captured)) => *expr = captured.clone(),
            Some(Node::FuncType(ty)) => *expr = Expr::FuncType(ty.clone()),
            Some(_) => self.fail(format!("placeholder {id} can't be used as an expression")),
            None => {}
        }
    }

    fn visit_ident_mut(&mut self, ident: &mut Ident) {
        if let Some(path) = &ident.path {
            self.paths.insert(path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::visit::VisitMut;
    use crate::ast::{BasicLit, BlockStmt};

    #[test]
    fn test_placeholder_text_round_trips() {
        let expr = Expr::selector(Expr::ident("_"), "__PLACEHOLDER_12__");
        assert_eq!(text(12), "_.__PLACEHOLDER_12__");
        assert_eq!(id_of(&expr), Some(12));
        assert_eq!(id_of(&Expr::selector(Expr::ident("x"), "__PLACEHOLDER_1__")), None);
        assert_eq!(id_of(&Expr::selector(Expr::ident("_"), "Field")), None);
    }

    #[test]
    fn test_splices_statements_and_expressions() {
        let captures = vec![
            Node::Expr(Expr::BasicLit(BasicLit::int(42))),
            Node::Block(BlockStmt::new(vec![])),
        ];
        let call = Expr::call(
            Expr::qualified("fmt", "Println"),
            vec![Expr::selector(Expr::ident("_"), "__PLACEHOLDER_0__")],
        );
        let mut block = BlockStmt::new(vec![
            Stmt::expr(call),
            Stmt::expr(Expr::selector(Expr::ident("_"), "__PLACEHOLDER_1__")),
        ]);
        let mut splicer = Splicer::new(&captures);
        splicer.visit_block_mut(&mut block);
        assert!(splicer.error.is_none());
        assert_eq!(splicer.paths.iter().collect::<Vec<_>>(), vec!["fmt"]);
        match &block.list[0].kind {
            StmtKind::Expr(Expr::Call(call)) => {
                assert_eq!(call.args, vec![Expr::BasicLit(BasicLit::int(42))]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(block.list[1].kind, StmtKind::Block(_)));
    }

    #[test]
    fn test_statement_in_expression_position_fails() {
        let captures = vec![Node::Block(BlockStmt::new(vec![]))];
        let mut expr = Expr::call(
            Expr::ident("f"),
            vec![Expr::selector(Expr::ident("_"), "__PLACEHOLDER_0__")],
        );
        let mut splicer = Splicer::new(&captures);
        splicer.visit_expr_mut(&mut expr);
        assert!(matches!(splicer.error, Some(TemplateError::Splice { .. })));
    }
}
