//! Mutable traversal over every expression and statement slot of a tree.
//!
//! Implementors override the `visit_*` hooks they care about and call the
//! matching `walk_*` function to keep descending.

use super::*;

pub trait VisitMut {
    fn visit_decl_mut(&mut self, decl: &mut Decl) {
        walk_decl_mut(self, decl);
    }

    fn visit_spec_mut(&mut self, spec: &mut Spec) {
        walk_spec_mut(self, spec);
    }

    fn visit_field_list_mut(&mut self, fields: &mut FieldList) {
        walk_field_list_mut(self, fields);
    }

    fn visit_block_mut(&mut self, block: &mut BlockStmt) {
        walk_block_mut(self, block);
    }

    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        walk_stmt_mut(self, stmt);
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
    }

    fn visit_ident_mut(&mut self, _ident: &mut Ident) {}
}

pub fn walk_file_mut<V: VisitMut + ?Sized>(v: &mut V, file: &mut File) {
    for decl in &mut file.decls {
        v.visit_decl_mut(decl);
    }
}

pub fn walk_node_mut<V: VisitMut + ?Sized>(v: &mut V, node: &mut Node) {
    match node {
        Node::Decl(decl) => v.visit_decl_mut(decl),
        Node::Spec(spec) => v.visit_spec_mut(spec),
        Node::Field(field) => walk_field_mut(v, field),
        Node::FieldList(fields) => v.visit_field_list_mut(fields),
        Node::FuncType(ty) => walk_func_type_mut(v, ty),
        Node::Block(block) => v.visit_block_mut(block),
        Node::Stmt(stmt) => v.visit_stmt_mut(stmt),
        Node::Expr(expr) => v.visit_expr_mut(expr),
    }
}

pub fn walk_decl_mut<V: VisitMut + ?Sized>(v: &mut V, decl: &mut Decl) {
    match decl {
        Decl::Func(func) => {
            if let Some(recv) = &mut func.recv {
                v.visit_field_list_mut(recv);
            }
            v.visit_ident_mut(&mut func.name);
            walk_func_type_mut(v, &mut func.ty);
            if let Some(body) = &mut func.body {
                v.visit_block_mut(body);
            }
        }
        Decl::Gen(gen) => walk_gen_decl_mut(v, gen),
    }
}

pub fn walk_gen_decl_mut<V: VisitMut + ?Sized>(v: &mut V, gen: &mut GenDecl) {
    for spec in &mut gen.specs {
        v.visit_spec_mut(spec);
    }
}

pub fn walk_spec_mut<V: VisitMut + ?Sized>(v: &mut V, spec: &mut Spec) {
    match spec {
        Spec::Import(_) => {}
        Spec::Value(value) => {
            for name in &mut value.names {
                v.visit_ident_mut(name);
            }
            if let Some(ty) = &mut value.ty {
                v.visit_expr_mut(ty);
            }
            for expr in &mut value.values {
                v.visit_expr_mut(expr);
            }
        }
        Spec::Type(ty) => {
            v.visit_ident_mut(&mut ty.name);
            if let Some(params) = &mut ty.type_params {
                v.visit_field_list_mut(params);
            }
            v.visit_expr_mut(&mut ty.ty);
        }
    }
}

pub fn walk_field_list_mut<V: VisitMut + ?Sized>(v: &mut V, fields: &mut FieldList) {
    for field in &mut fields.list {
        walk_field_mut(v, field);
    }
}

pub fn walk_field_mut<V: VisitMut + ?Sized>(v: &mut V, field: &mut Field) {
    for name in &mut field.names {
        v.visit_ident_mut(name);
    }
    v.visit_expr_mut(&mut field.ty);
}

pub fn walk_func_type_mut<V: VisitMut + ?Sized>(v: &mut V, ty: &mut FuncType) {
    if let Some(params) = &mut ty.type_params {
        v.visit_field_list_mut(params);
    }
    v.visit_field_list_mut(&mut ty.params);
    v.visit_field_list_mut(&mut ty.results);
}

pub fn walk_block_mut<V: VisitMut + ?Sized>(v: &mut V, block: &mut BlockStmt) {
    for stmt in &mut block.list {
        v.visit_stmt_mut(stmt);
    }
}

fn walk_opt_stmt<V: VisitMut + ?Sized>(v: &mut V, stmt: &mut Option<Box<Stmt>>) {
    if let Some(stmt) = stmt {
        v.visit_stmt_mut(stmt);
    }
}

pub fn walk_stmt_mut<V: VisitMut + ?Sized>(v: &mut V, stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::Decl(gen) => walk_gen_decl_mut(v, gen),
        StmtKind::Empty | StmtKind::Branch { .. } => {}
        StmtKind::Labeled { stmt, .. } => v.visit_stmt_mut(stmt),
        StmtKind::Expr(expr) | StmtKind::Go(expr) | StmtKind::Defer(expr) => {
            v.visit_expr_mut(expr)
        }
        StmtKind::Send { chan, value } => {
            v.visit_expr_mut(chan);
            v.visit_expr_mut(value);
        }
        StmtKind::IncDec { x, .. } => v.visit_expr_mut(x),
        StmtKind::Assign(assign) => {
            for expr in assign.lhs.iter_mut().chain(assign.rhs.iter_mut()) {
                v.visit_expr_mut(expr);
            }
        }
        StmtKind::Return(results) => {
            for expr in results {
                v.visit_expr_mut(expr);
            }
        }
        StmtKind::Block(block) => v.visit_block_mut(block),
        StmtKind::If(stmt) => {
            walk_opt_stmt(v, &mut stmt.init);
            v.visit_expr_mut(&mut stmt.cond);
            v.visit_block_mut(&mut stmt.body);
            walk_opt_stmt(v, &mut stmt.els);
        }
        StmtKind::Switch(stmt) => {
            walk_opt_stmt(v, &mut stmt.init);
            if let Some(tag) = &mut stmt.tag {
                v.visit_expr_mut(tag);
            }
            walk_clauses_mut(v, &mut stmt.body);
        }
        StmtKind::TypeSwitch(stmt) => {
            walk_opt_stmt(v, &mut stmt.init);
            v.visit_expr_mut(&mut stmt.x);
            walk_clauses_mut(v, &mut stmt.body);
        }
        StmtKind::Select(clauses) => {
            for clause in clauses {
                walk_opt_stmt(v, &mut clause.comm);
                for stmt in &mut clause.body {
                    v.visit_stmt_mut(stmt);
                }
            }
        }
        StmtKind::For(stmt) => {
            walk_opt_stmt(v, &mut stmt.init);
            if let Some(cond) = &mut stmt.cond {
                v.visit_expr_mut(cond);
            }
            walk_opt_stmt(v, &mut stmt.post);
            v.visit_block_mut(&mut stmt.body);
        }
        StmtKind::Range(stmt) => {
            if let Some(key) = &mut stmt.key {
                v.visit_expr_mut(key);
            }
            if let Some(value) = &mut stmt.value {
                v.visit_expr_mut(value);
            }
            v.visit_expr_mut(&mut stmt.x);
            v.visit_block_mut(&mut stmt.body);
        }
    }
}

fn walk_clauses_mut<V: VisitMut + ?Sized>(v: &mut V, clauses: &mut [CaseClause]) {
    for clause in clauses {
        for expr in &mut clause.list {
            v.visit_expr_mut(expr);
        }
        for stmt in &mut clause.body {
            v.visit_stmt_mut(stmt);
        }
    }
}

fn walk_opt_expr<V: VisitMut + ?Sized>(v: &mut V, expr: &mut Option<Box<Expr>>) {
    if let Some(expr) = expr {
        v.visit_expr_mut(expr);
    }
}

pub fn walk_expr_mut<V: VisitMut + ?Sized>(v: &mut V, expr: &mut Expr) {
    match expr {
        Expr::Ident(ident) => v.visit_ident_mut(ident),
        Expr::BasicLit(_) => {}
        Expr::CompositeLit(lit) => {
            walk_opt_expr(v, &mut lit.ty);
            for elt in &mut lit.elts {
                v.visit_expr_mut(elt);
            }
        }
        Expr::FuncLit(lit) => {
            walk_func_type_mut(v, &mut lit.ty);
            v.visit_block_mut(&mut lit.body);
        }
        Expr::Paren(x) | Expr::Star(x) | Expr::Unary { x, .. } => v.visit_expr_mut(x),
        Expr::Selector { x, .. } => v.visit_expr_mut(x),
        Expr::Index { x, indices } => {
            v.visit_expr_mut(x);
            for index in indices {
                v.visit_expr_mut(index);
            }
        }
        Expr::Slice {
            x, low, high, max, ..
        } => {
            v.visit_expr_mut(x);
            walk_opt_expr(v, low);
            walk_opt_expr(v, high);
            walk_opt_expr(v, max);
        }
        Expr::TypeAssert { x, ty } => {
            v.visit_expr_mut(x);
            walk_opt_expr(v, ty);
        }
        Expr::Call(call) => {
            v.visit_expr_mut(&mut call.fun);
            for arg in &mut call.args {
                v.visit_expr_mut(arg);
            }
        }
        Expr::Binary { x, y, .. } => {
            v.visit_expr_mut(x);
            v.visit_expr_mut(y);
        }
        Expr::KeyValue { key, value } => {
            v.visit_expr_mut(key);
            v.visit_expr_mut(value);
        }
        Expr::ArrayType { len, elt } => {
            walk_opt_expr(v, len);
            v.visit_expr_mut(elt);
        }
        Expr::StructType(fields) | Expr::InterfaceType(fields) => v.visit_field_list_mut(fields),
        Expr::FuncType(ty) => walk_func_type_mut(v, ty),
        Expr::MapType { key, value } => {
            v.visit_expr_mut(key);
            v.visit_expr_mut(value);
        }
        Expr::ChanType { value, .. } => v.visit_expr_mut(value),
        Expr::Ellipsis(elt) => walk_opt_expr(v, elt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Renamer;

    impl VisitMut for Renamer {
        fn visit_ident_mut(&mut self, ident: &mut Ident) {
            if ident.name == "old" {
                ident.name = "new".to_string();
            }
        }
    }

    #[test]
    fn test_visitor_reaches_nested_identifiers() {
        let mut expr = Expr::call(
            Expr::ident("f"),
            vec![Expr::Binary {
                x: Box::new(Expr::ident("old")),
                op: BinaryOp::Add,
                y: Box::new(Expr::star(Expr::ident("old"))),
            }],
        );
        Renamer.visit_expr_mut(&mut expr);

        let Expr::Call(call) = &expr else {
            panic!("expected call");
        };
        match &call.args[0] {
            Expr::Binary { x, y, .. } => {
                assert_eq!(**x, Expr::ident("new"));
                assert_eq!(**y, Expr::star(Expr::ident("new")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
