// Go source generation from the syntax tree.
// Output follows gofmt layout closely enough to be stable and readable; it is
// not byte-for-byte gofmt (alignment of trailing comments and struct fields
// is not reproduced).

use std::collections::BTreeMap;

use super::*;
use crate::parser::guess_package_name;

/// Trait for nodes that can render themselves as Go source.
pub trait ToSource {
    fn to_source(&self) -> String;
}

/// Prints a whole file. Path-qualified identifiers are rendered through the
/// file's own import declarations.
pub fn print_file(file: &File) -> String {
    let mut printer = Printer::new(file.import_names());
    printer.file(file);
    printer.out
}

impl ToSource for File {
    fn to_source(&self) -> String {
        print_file(self)
    }
}

impl ToSource for Expr {
    fn to_source(&self) -> String {
        let mut printer = Printer::default();
        printer.expr(self);
        printer.out
    }
}

impl ToSource for Stmt {
    fn to_source(&self) -> String {
        let mut printer = Printer::default();
        printer.stmt(self);
        printer.out
    }
}

impl ToSource for Decl {
    fn to_source(&self) -> String {
        let mut printer = Printer::default();
        printer.decl(self);
        printer.out
    }
}

impl ToSource for BlockStmt {
    fn to_source(&self) -> String {
        let mut printer = Printer::default();
        printer.block(self);
        printer.out
    }
}

impl ToSource for Node {
    fn to_source(&self) -> String {
        let mut printer = Printer::default();
        match self {
            Node::Decl(decl) => printer.decl(decl),
            Node::Spec(spec) => printer.spec(spec),
            Node::Field(field) => printer.field(field),
            Node::FieldList(fields) => printer.field_list(fields),
            Node::FuncType(ty) => {
                printer.out.push_str("func");
                printer.signature(ty);
            }
            Node::Block(block) => printer.block(block),
            Node::Stmt(stmt) => printer.stmt(stmt),
            Node::Expr(expr) => printer.expr(expr),
        }
        printer.out
    }
}

/// Escapes a string for use inside a double-quoted Go literal.
pub fn escape_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.push_str(&format!("\\u{:04x}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

const PREC_UNARY: u8 = 6;
const PREC_PRIMARY: u8 = 7;

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
    /// Import path to local package name.
    names: BTreeMap<String, String>,
}

impl Printer {
    fn new(names: BTreeMap<String, String>) -> Self {
        Self {
            out: String::new(),
            indent: 0,
            names,
        }
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn tabs(&mut self) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
    }

    fn leading(&mut self, decs: &Decorations) {
        for line in &decs.start {
            self.tabs();
            self.push(line);
            self.out.push('\n');
        }
    }

    fn trailing(&mut self, decs: &Decorations) {
        for comment in &decs.end {
            self.out.push(' ');
            self.push(comment);
        }
    }

    fn comment_lines(&mut self, lines: &[String]) {
        for line in lines {
            self.tabs();
            self.push(line);
            self.out.push('\n');
        }
    }

    fn file(&mut self, file: &File) {
        for line in &file.decs.start {
            self.push(line);
            self.out.push('\n');
        }
        if !file.decs.start.is_empty() {
            self.out.push('\n');
        }
        self.push("package ");
        self.push(&file.package.name);
        self.out.push('\n');
        for decl in &file.decls {
            self.out.push('\n');
            self.leading(decl.decs());
            self.decl(decl);
            self.trailing(decl.decs());
            self.out.push('\n');
        }
        if !file.decs.end.is_empty() {
            self.out.push('\n');
            self.comment_lines(&file.decs.end);
        }
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Func(func) => self.func_decl(func),
            Decl::Gen(gen) => self.gen_decl(gen),
        }
    }

    fn func_decl(&mut self, func: &FuncDecl) {
        self.push("func ");
        if let Some(recv) = &func.recv {
            self.out.push('(');
            self.fields_inline(recv);
            self.push(") ");
        }
        self.push(&func.name.name);
        self.signature(&func.ty);
        if let Some(body) = &func.body {
            self.out.push(' ');
            self.block(body);
        }
    }

    fn gen_decl(&mut self, gen: &GenDecl) {
        if !gen.grouped && gen.specs.len() == 1 && gen.trailing.is_empty() {
            // Comments attached to the lone spec go above the keyword.
            let decs = gen.specs[0].decs();
            for line in &decs.start {
                self.push(line);
                self.out.push('\n');
                self.tabs();
            }
            self.push(gen.tok.as_str());
            self.out.push(' ');
            self.spec(&gen.specs[0]);
            self.trailing(decs);
            return;
        }
        self.push(gen.tok.as_str());
        self.push(" (\n");
        self.indent += 1;
        for (i, spec) in gen.specs.iter().enumerate() {
            let decs = spec.decs();
            if i > 0 && decs.before == Space::EmptyLine {
                self.out.push('\n');
            }
            self.leading(decs);
            self.tabs();
            self.spec(spec);
            self.trailing(decs);
            self.out.push('\n');
        }
        self.comment_lines(&gen.trailing);
        self.indent -= 1;
        self.tabs();
        self.out.push(')');
    }

    fn spec(&mut self, spec: &Spec) {
        match spec {
            Spec::Import(import) => {
                if let Some(name) = &import.name {
                    self.push(&name.name);
                    self.out.push(' ');
                }
                self.out.push('"');
                self.push(&import.path);
                self.out.push('"');
            }
            Spec::Value(value) => {
                self.idents(&value.names);
                if let Some(ty) = &value.ty {
                    self.out.push(' ');
                    self.expr(ty);
                }
                if !value.values.is_empty() {
                    self.push(" = ");
                    self.exprs(&value.values);
                }
            }
            Spec::Type(ty) => {
                self.push(&ty.name.name);
                if let Some(params) = &ty.type_params {
                    self.out.push('[');
                    self.fields_inline(params);
                    self.out.push(']');
                }
                self.push(if ty.assign { " = " } else { " " });
                self.expr(&ty.ty);
            }
        }
    }

    fn idents(&mut self, idents: &[Ident]) {
        for (i, ident) in idents.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ident(ident);
        }
    }

    fn ident(&mut self, ident: &Ident) {
        if let Some(path) = &ident.path {
            let name = self
                .names
                .get(path)
                .cloned()
                .unwrap_or_else(|| guess_package_name(path));
            self.push(&name);
            self.out.push('.');
        }
        self.push(&ident.name);
    }

    fn field(&mut self, field: &Field) {
        if !field.names.is_empty() {
            self.idents(&field.names);
            self.out.push(' ');
        }
        self.expr(&field.ty);
        if let Some(tag) = &field.tag {
            self.out.push(' ');
            self.push(tag);
        }
    }

    fn fields_inline(&mut self, fields: &FieldList) {
        for (i, field) in fields.list.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.field(field);
        }
    }

    fn field_list(&mut self, fields: &FieldList) {
        self.out.push('(');
        self.fields_inline(fields);
        self.out.push(')');
    }

    fn signature(&mut self, ty: &FuncType) {
        if let Some(params) = &ty.type_params {
            self.out.push('[');
            self.fields_inline(params);
            self.out.push(']');
        }
        self.field_list(&ty.params);
        let results = &ty.results;
        match results.list.as_slice() {
            [] => {}
            [single] if single.names.is_empty() => {
                self.out.push(' ');
                self.expr(&single.ty);
            }
            _ => {
                self.out.push(' ');
                self.field_list(results);
            }
        }
    }

    fn block(&mut self, block: &BlockStmt) {
        self.out.push('{');
        self.out.push('\n');
        self.indent += 1;
        self.stmt_list(&block.list);
        self.comment_lines(&block.trailing);
        self.indent -= 1;
        self.tabs();
        self.out.push('}');
    }

    fn stmt_list(&mut self, list: &[Stmt]) {
        for (i, stmt) in list.iter().enumerate() {
            if i > 0 && stmt.decs.before == Space::EmptyLine {
                self.out.push('\n');
            }
            self.leading(&stmt.decs);
            if matches!(stmt.kind, StmtKind::Empty) && !stmt.decs.end.is_empty() {
                self.tabs();
                self.push(stmt.decs.end.join(" ").trim_start());
                self.out.push('\n');
                continue;
            }
            if matches!(stmt.kind, StmtKind::Empty) {
                continue;
            }
            self.tabs();
            self.stmt(stmt);
            self.trailing(&stmt.decs);
            self.out.push('\n');
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Decl(gen) => self.gen_decl(gen),
            StmtKind::Empty => {}
            StmtKind::Labeled { label, stmt } => {
                self.push(&label.name);
                self.out.push(':');
                if !matches!(stmt.kind, StmtKind::Empty) {
                    self.out.push('\n');
                    self.tabs();
                    self.stmt(stmt);
                }
            }
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::Send { chan, value } => {
                self.expr(chan);
                self.push(" <- ");
                self.expr(value);
            }
            StmtKind::IncDec { x, inc } => {
                self.expr(x);
                self.push(if *inc { "++" } else { "--" });
            }
            StmtKind::Assign(assign) => {
                self.exprs(&assign.lhs);
                self.out.push(' ');
                self.push(assign.tok.as_str());
                self.out.push(' ');
                self.exprs(&assign.rhs);
            }
            StmtKind::Go(call) => {
                self.push("go ");
                self.expr(call);
            }
            StmtKind::Defer(call) => {
                self.push("defer ");
                self.expr(call);
            }
            StmtKind::Return(results) => {
                self.push("return");
                if !results.is_empty() {
                    self.out.push(' ');
                    self.exprs(results);
                }
            }
            StmtKind::Branch { tok, label } => {
                self.push(tok.as_str());
                if let Some(label) = label {
                    self.out.push(' ');
                    self.push(&label.name);
                }
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::If(stmt) => self.if_stmt(stmt),
            StmtKind::Switch(stmt) => {
                self.push("switch ");
                if let Some(init) = &stmt.init {
                    self.stmt(init);
                    self.push("; ");
                }
                if let Some(tag) = &stmt.tag {
                    self.expr(tag);
                    self.out.push(' ');
                }
                self.case_clauses(&stmt.body);
            }
            StmtKind::TypeSwitch(stmt) => {
                self.push("switch ");
                if let Some(init) = &stmt.init {
                    self.stmt(init);
                    self.push("; ");
                }
                if let Some(binding) = &stmt.binding {
                    self.push(&binding.name);
                    self.push(" := ");
                }
                self.expr_prec(&stmt.x, PREC_PRIMARY);
                self.push(".(type) ");
                self.case_clauses(&stmt.body);
            }
            StmtKind::Select(clauses) => {
                self.push("select {\n");
                for clause in clauses {
                    self.leading(&clause.decs);
                    self.tabs();
                    match &clause.comm {
                        Some(comm) => {
                            self.push("case ");
                            self.stmt(comm);
                            self.out.push(':');
                        }
                        None => self.push("default:"),
                    }
                    self.out.push('\n');
                    self.indent += 1;
                    self.stmt_list(&clause.body);
                    self.indent -= 1;
                }
                self.tabs();
                self.out.push('}');
            }
            StmtKind::For(stmt) => {
                self.push("for ");
                if stmt.init.is_none() && stmt.post.is_none() {
                    if let Some(cond) = &stmt.cond {
                        self.expr(cond);
                        self.out.push(' ');
                    }
                } else {
                    if let Some(init) = &stmt.init {
                        self.stmt(init);
                    }
                    self.push("; ");
                    if let Some(cond) = &stmt.cond {
                        self.expr(cond);
                    }
                    self.push("; ");
                    if let Some(post) = &stmt.post {
                        self.stmt(post);
                        self.out.push(' ');
                    }
                }
                self.block(&stmt.body);
            }
            StmtKind::Range(stmt) => {
                self.push("for ");
                if let Some(key) = &stmt.key {
                    self.expr(key);
                    if let Some(value) = &stmt.value {
                        self.push(", ");
                        self.expr(value);
                    }
                    self.out.push(' ');
                    self.push(stmt.tok.unwrap_or(AssignOp::Define).as_str());
                    self.out.push(' ');
                }
                self.push("range ");
                self.expr(&stmt.x);
                self.out.push(' ');
                self.block(&stmt.body);
            }
        }
    }

    fn if_stmt(&mut self, stmt: &IfStmt) {
        self.push("if ");
        if let Some(init) = &stmt.init {
            self.stmt(init);
            self.push("; ");
        }
        self.expr(&stmt.cond);
        self.out.push(' ');
        self.block(&stmt.body);
        if let Some(els) = &stmt.els {
            self.push(" else ");
            self.stmt(els);
        }
    }

    fn case_clauses(&mut self, clauses: &[CaseClause]) {
        self.push("{\n");
        for clause in clauses {
            self.leading(&clause.decs);
            self.tabs();
            if clause.is_default {
                self.push("default:");
            } else {
                self.push("case ");
                self.exprs(&clause.list);
                self.out.push(':');
            }
            self.out.push('\n');
            self.indent += 1;
            self.stmt_list(&clause.body);
            self.indent -= 1;
        }
        self.tabs();
        self.out.push('}');
    }

    fn exprs(&mut self, exprs: &[Expr]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        self.expr_prec(expr, 0);
    }

    /// Prints `expr` in a context requiring at least `prec`, adding
    /// parentheses when the expression binds more loosely.
    fn expr_prec(&mut self, expr: &Expr, prec: u8) {
        match expr {
            Expr::Binary { x, op, y } => {
                let own = op.precedence();
                let wrap = own < prec;
                if wrap {
                    self.out.push('(');
                }
                self.expr_prec(x, own);
                self.out.push(' ');
                self.push(op.as_str());
                self.out.push(' ');
                self.expr_prec(y, own + 1);
                if wrap {
                    self.out.push(')');
                }
            }
            Expr::Unary { op, x } => {
                let wrap = PREC_UNARY < prec;
                if wrap {
                    self.out.push('(');
                }
                self.push(op.as_str());
                self.expr_prec(x, PREC_UNARY);
                if wrap {
                    self.out.push(')');
                }
            }
            Expr::Star(x) => {
                let wrap = PREC_UNARY < prec;
                if wrap {
                    self.out.push('(');
                }
                self.out.push('*');
                self.expr_prec(x, PREC_UNARY);
                if wrap {
                    self.out.push(')');
                }
            }
            other => self.primary(other),
        }
    }

    fn primary(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => self.ident(ident),
            Expr::BasicLit(lit) => self.push(&lit.value),
            Expr::CompositeLit(lit) => {
                if let Some(ty) = &lit.ty {
                    self.expr_prec(ty, PREC_PRIMARY);
                }
                self.out.push('{');
                if lit.multiline && !lit.elts.is_empty() {
                    self.out.push('\n');
                    self.indent += 1;
                    for elt in &lit.elts {
                        self.tabs();
                        self.expr(elt);
                        self.push(",\n");
                    }
                    self.indent -= 1;
                    self.tabs();
                } else {
                    self.exprs(&lit.elts);
                }
                self.out.push('}');
            }
            Expr::FuncLit(lit) => {
                self.push("func");
                self.signature(&lit.ty);
                self.out.push(' ');
                self.block(&lit.body);
            }
            Expr::Paren(inner) => {
                self.out.push('(');
                self.expr(inner);
                self.out.push(')');
            }
            Expr::Selector { x, sel } => {
                self.expr_prec(x, PREC_PRIMARY);
                self.out.push('.');
                self.push(&sel.name);
            }
            Expr::Index { x, indices } => {
                self.expr_prec(x, PREC_PRIMARY);
                self.out.push('[');
                self.exprs(indices);
                self.out.push(']');
            }
            Expr::Slice {
                x,
                low,
                high,
                max,
                slice3,
            } => {
                self.expr_prec(x, PREC_PRIMARY);
                self.out.push('[');
                if let Some(low) = low {
                    self.expr(low);
                }
                self.out.push(':');
                if let Some(high) = high {
                    self.expr(high);
                }
                if *slice3 {
                    self.out.push(':');
                    if let Some(max) = max {
                        self.expr(max);
                    }
                }
                self.out.push(']');
            }
            Expr::TypeAssert { x, ty } => {
                self.expr_prec(x, PREC_PRIMARY);
                self.push(".(");
                match ty {
                    Some(ty) => self.expr(ty),
                    None => self.push("type"),
                }
                self.out.push(')');
            }
            Expr::Call(call) => {
                let needs_parens = matches!(
                    call.fun.as_ref(),
                    Expr::FuncType(_) | Expr::ChanType { .. }
                );
                if needs_parens {
                    self.out.push('(');
                    self.expr(&call.fun);
                    self.out.push(')');
                } else {
                    self.expr_prec(&call.fun, PREC_PRIMARY);
                }
                self.out.push('(');
                self.exprs(&call.args);
                if call.ellipsis {
                    self.push("...");
                }
                self.out.push(')');
            }
            Expr::KeyValue { key, value } => {
                self.expr(key);
                self.push(": ");
                self.expr(value);
            }
            Expr::ArrayType { len, elt } => {
                self.out.push('[');
                if let Some(len) = len {
                    self.expr(len);
                }
                self.out.push(']');
                self.expr(elt);
            }
            Expr::StructType(fields) => self.struct_type(fields),
            Expr::FuncType(ty) => {
                self.push("func");
                self.signature(ty);
            }
            Expr::InterfaceType(fields) => self.interface_type(fields),
            Expr::MapType { key, value } => {
                self.push("map[");
                self.expr(key);
                self.out.push(']');
                self.expr(value);
            }
            Expr::ChanType { dir, value } => {
                self.push(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                });
                self.expr(value);
            }
            Expr::Ellipsis(elt) => {
                self.push("...");
                if let Some(elt) = elt {
                    self.expr(elt);
                }
            }
            Expr::Binary { .. } | Expr::Unary { .. } | Expr::Star(_) => self.expr(expr),
        }
    }

    fn struct_type(&mut self, fields: &FieldList) {
        if fields.list.is_empty() && fields.trailing.is_empty() {
            self.push("struct{}");
            return;
        }
        self.push("struct {\n");
        self.indent += 1;
        for (i, field) in fields.list.iter().enumerate() {
            if i > 0 && field.decs.before == Space::EmptyLine {
                self.out.push('\n');
            }
            self.leading(&field.decs);
            self.tabs();
            self.field(field);
            self.trailing(&field.decs);
            self.out.push('\n');
        }
        self.comment_lines(&fields.trailing);
        self.indent -= 1;
        self.tabs();
        self.out.push('}');
    }

    fn interface_type(&mut self, fields: &FieldList) {
        if fields.list.is_empty() && fields.trailing.is_empty() {
            self.push("interface{}");
            return;
        }
        self.push("interface {\n");
        self.indent += 1;
        for field in &fields.list {
            self.leading(&field.decs);
            self.tabs();
            match (&field.names.first(), &field.ty) {
                (Some(name), Expr::FuncType(ty)) => {
                    self.push(&name.name);
                    self.signature(ty);
                }
                _ => self.expr(&field.ty),
            }
            self.trailing(&field.decs);
            self.out.push('\n');
        }
        self.comment_lines(&fields.trailing);
        self.indent -= 1;
        self.tabs();
        self.out.push('}');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_binary_operands_keep_precedence() {
        // (a + b) * c
        let expr = Expr::Binary {
            x: Box::new(Expr::Binary {
                x: Box::new(Expr::ident("a")),
                op: BinaryOp::Add,
                y: Box::new(Expr::ident("b")),
            }),
            op: BinaryOp::Mul,
            y: Box::new(Expr::ident("c")),
        };
        assert_eq!(expr.to_source(), "(a + b) * c");

        // a - (b - c)
        let expr = Expr::Binary {
            x: Box::new(Expr::ident("a")),
            op: BinaryOp::Sub,
            y: Box::new(Expr::Binary {
                x: Box::new(Expr::ident("b")),
                op: BinaryOp::Sub,
                y: Box::new(Expr::ident("c")),
            }),
        };
        assert_eq!(expr.to_source(), "a - (b - c)");
    }

    #[test]
    fn test_selector_on_unary_operand_is_parenthesised() {
        let expr = Expr::selector(Expr::star(Expr::ident("p")), "field");
        assert_eq!(expr.to_source(), "(*p).field");
    }

    #[test]
    fn test_qualified_identifier_uses_guessed_name() {
        let expr = Expr::call(
            Expr::qualified("github.com/example/go-tracer/v2", "Start"),
            vec![Expr::BasicLit(BasicLit::string("op"))],
        );
        assert_eq!(expr.to_source(), "tracer.Start(\"op\")");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("a\"b\\c\n"), "a\\\"b\\\\c\\n");
    }

    #[test]
    fn test_print_file_with_imports_and_function() {
        let file = File {
            package: Ident::new("main"),
            decls: vec![
                Decl::Gen(GenDecl::new(
                    DeclToken::Import,
                    vec![Spec::Import(ImportSpec::new(Some("h"), "net/http"))],
                )),
                Decl::Func(FuncDecl {
                    decs: Decorations::with_start("// Handle serves requests."),
                    recv: None,
                    name: Ident::new("Handle"),
                    ty: FuncType {
                        type_params: None,
                        params: FieldList::new(vec![Field::new(
                            vec![Ident::new("r")],
                            Expr::star(Expr::qualified("net/http", "Request")),
                        )]),
                        results: FieldList::default(),
                    },
                    body: Some(BlockStmt::new(vec![Stmt::new(StmtKind::Return(vec![]))])),
                }),
            ],
            decs: Decorations::default(),
        };

        let expected = "package main\n\nimport h \"net/http\"\n\n// Handle serves requests.\nfunc Handle(r *h.Request) {\n\treturn\n}\n";
        assert_eq!(print_file(&file), expected);
    }
}
