// Lowering from the tree-sitter concrete syntax tree to the decorated AST.
// Comments are extras in the grammar and may show up as children of almost
// any node; in list positions (top level, blocks, groups, fields) they are
// attached to the neighbouring item as decorations, elsewhere they are dropped.

use std::collections::BTreeMap;

use tree_sitter::Node;
use tracing::trace;

use super::{guess_package_name, ParseError, SyntaxProblem};
use crate::ast::*;

pub(crate) fn collect_problems(root: Node, source: &str) -> Vec<SyntaxProblem> {
    let mut problems = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let position = node.start_position();
            let message = if node.is_missing() {
                format!("missing `{}`", node.kind())
            } else {
                let text = &source[node.byte_range()];
                let snippet: String = text.chars().take(24).collect();
                format!("unexpected `{}`", snippet.trim())
            };
            problems.push(SyntaxProblem {
                line: position.row + 1,
                column: position.column + 1,
                message,
            });
            continue;
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let mut children: Vec<Node> = node.children(&mut cursor).collect();
            children.reverse();
            stack.extend(children);
        }
    }
    problems
}

/// Converts one parsed file. Holds the import table used to resolve
/// package-qualified references.
pub struct Lowerer<'s> {
    src: &'s str,
    /// Local package name to import path.
    packages: BTreeMap<String, String>,
}

type Result<T> = std::result::Result<T, ParseError>;

impl<'s> Lowerer<'s> {
    pub fn new(src: &'s str, aliases: &BTreeMap<String, String>) -> Self {
        Self {
            src,
            packages: aliases.clone(),
        }
    }

    fn text(&self, node: Node) -> &'s str {
        &self.src[node.byte_range()]
    }

    fn unsupported(&self, node: Node) -> ParseError {
        ParseError::Unsupported {
            kind: node.kind().to_string(),
            line: node.start_position().row + 1,
        }
    }

    fn field<'t>(&self, node: Node<'t>, name: &str) -> Result<Node<'t>> {
        node.child_by_field_name(name)
            .ok_or_else(|| self.unsupported(node))
    }

    pub fn file(mut self, root: Node) -> Result<File> {
        let children = children(root);
        self.collect_imports(&children)?;

        let mut decs = Decorations::default();
        let mut package = Ident::new("main");
        let mut rest = Vec::new();
        let mut seen_package = false;
        for child in children {
            if !seen_package {
                match child.kind() {
                    "comment" => {
                        decs.start.push(self.text(child).to_string());
                        continue;
                    }
                    "package_clause" => {
                        seen_package = true;
                        if let Some(name) = named_children(child).first() {
                            package = Ident::new(self.text(*name));
                        }
                        continue;
                    }
                    _ => {}
                }
            }
            rest.push(child);
        }

        let (decls, trailing) = self.decorated(rest, Self::top_level, Decl::decs_mut)?;
        decs.end = trailing;
        Ok(File {
            package,
            decls,
            decs,
        })
    }

    fn collect_imports(&mut self, children: &[Node]) -> Result<()> {
        for child in children.iter().filter(|c| c.kind() == "import_declaration") {
            for spec in self.import_specs(*child)? {
                let local = match &spec.name {
                    Some(name) if name.name == "_" || name.name == "." => continue,
                    Some(name) => name.name.clone(),
                    None => guess_package_name(&spec.path),
                };
                self.packages.insert(local, spec.path.clone());
            }
        }
        Ok(())
    }

    /// Lowers a list of sibling nodes, attaching comments as decorations.
    /// Returns the items and the comments that followed the last item.
    fn decorated<'t, T>(
        &self,
        nodes: Vec<Node<'t>>,
        mut lower: impl FnMut(&Self, Node<'t>) -> Result<Option<T>>,
        decs_of: impl Fn(&mut T) -> &mut Decorations,
    ) -> Result<(Vec<T>, Vec<String>)> {
        let mut items: Vec<T> = Vec::new();
        let mut pending: Vec<Node<'t>> = Vec::new();
        let mut previous_end: Option<usize> = None;

        for node in nodes {
            if node.kind() == "comment" {
                let row = node.start_position().row;
                if pending.is_empty() && previous_end == Some(row) {
                    if let Some(last) = items.last_mut() {
                        decs_of(last).end.push(self.text(node).to_string());
                        continue;
                    }
                }
                pending.push(node);
                continue;
            }
            if !node.is_named() {
                continue;
            }
            let Some(mut item) = lower(self, node)? else {
                continue;
            };
            let first_row = pending
                .first()
                .map(|c| c.start_position().row)
                .unwrap_or_else(|| node.start_position().row);
            let decs = decs_of(&mut item);
            if let Some(end) = previous_end {
                decs.before = if first_row > end + 1 {
                    Space::EmptyLine
                } else {
                    Space::NewLine
                };
            }
            if !pending.is_empty() {
                let mut start: Vec<String> = pending
                    .drain(..)
                    .map(|c| self.text(c).to_string())
                    .collect();
                start.append(&mut decs.start);
                decs.start = start;
            }
            previous_end = Some(node.end_position().row);
            items.push(item);
        }

        let trailing = pending
            .into_iter()
            .map(|c| self.text(c).to_string())
            .collect();
        Ok((items, trailing))
    }

    fn top_level(&self, node: Node) -> Result<Option<Decl>> {
        Ok(Some(match node.kind() {
            "function_declaration" | "method_declaration" => Decl::Func(self.func_decl(node)?),
            "import_declaration" | "const_declaration" | "var_declaration"
            | "type_declaration" => Decl::Gen(self.gen_decl(node)?),
            ";" => return Ok(None),
            _ => return Err(self.unsupported(node)),
        }))
    }

    fn func_decl(&self, node: Node) -> Result<FuncDecl> {
        let recv = match node.child_by_field_name("receiver") {
            Some(recv) => Some(self.params(recv)?),
            None => None,
        };
        let name = Ident::new(self.text(self.field(node, "name")?));
        let ty = self.func_type(node)?;
        let body = match node.child_by_field_name("body") {
            Some(body) => Some(self.block(body)?),
            None => None,
        };
        Ok(FuncDecl {
            decs: Decorations::default(),
            recv,
            name,
            ty,
            body,
        })
    }

    /// Signature of a function declaration, literal or function type.
    fn func_type(&self, node: Node) -> Result<FuncType> {
        let type_params = match node.child_by_field_name("type_parameters") {
            Some(params) => Some(self.params(params)?),
            None => None,
        };
        let params = self.params(self.field(node, "parameters")?)?;
        let results = match node.child_by_field_name("result") {
            Some(result) if result.kind() == "parameter_list" => self.params(result)?,
            Some(result) => FieldList::new(vec![Field::new(Vec::new(), self.expr(result)?)]),
            None => FieldList::default(),
        };
        Ok(FuncType {
            type_params,
            params,
            results,
        })
    }

    /// Parameter, result, receiver and type parameter lists.
    fn params(&self, node: Node) -> Result<FieldList> {
        let (list, trailing) = self.decorated(
            children(node),
            |this, child| {
                Ok(Some(match child.kind() {
                    "parameter_declaration" => {
                        let names = this.field_names(child, "name");
                        Field::new(names, this.expr(this.field(child, "type")?)?)
                    }
                    "variadic_parameter_declaration" => {
                        let names = this.field_names(child, "name");
                        let elt = this.expr(this.field(child, "type")?)?;
                        Field::new(names, Expr::Ellipsis(Some(Box::new(elt))))
                    }
                    "type_parameter_declaration" => {
                        let names = this.field_names(child, "name");
                        Field::new(names, this.expr(this.field(child, "type")?)?)
                    }
                    _ => return Err(this.unsupported(child)),
                }))
            },
            |field| &mut field.decs,
        )?;
        Ok(FieldList { list, trailing })
    }

    fn field_names(&self, node: Node, field: &str) -> Vec<Ident> {
        let mut cursor = node.walk();
        node.children_by_field_name(field, &mut cursor)
            .map(|n| Ident::new(self.text(n)))
            .collect()
    }

    fn gen_decl(&self, node: Node) -> Result<GenDecl> {
        let tok = match node.kind() {
            "import_declaration" => DeclToken::Import,
            "const_declaration" => DeclToken::Const,
            "var_declaration" => DeclToken::Var,
            "type_declaration" => DeclToken::Type,
            _ => return Err(self.unsupported(node)),
        };

        // Groups are either direct children between parentheses or wrapped
        // in a `*_spec_list` node depending on the declaration kind.
        let mut items = Vec::new();
        let mut grouped = false;
        for child in children(node) {
            match child.kind() {
                "import_spec_list" | "var_spec_list" => {
                    grouped = true;
                    items.extend(children(child));
                }
                "(" => grouped = true,
                _ => items.push(child),
            }
        }

        let (specs, trailing) = self.decorated(items, Self::spec, Spec::decs_mut)?;
        Ok(GenDecl {
            decs: Decorations::default(),
            tok,
            grouped,
            specs,
            trailing,
        })
    }

    fn import_specs(&self, node: Node) -> Result<Vec<ImportSpec>> {
        let gen = self.gen_decl(node)?;
        Ok(gen
            .specs
            .into_iter()
            .filter_map(|spec| match spec {
                Spec::Import(import) => Some(import),
                _ => None,
            })
            .collect())
    }

    fn spec(&self, node: Node) -> Result<Option<Spec>> {
        Ok(Some(match node.kind() {
            "import_spec" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| Ident::new(self.text(n)));
                let path = self.text(self.field(node, "path")?);
                Spec::Import(ImportSpec {
                    decs: Decorations::default(),
                    name,
                    path: unquote(path),
                })
            }
            "var_spec" | "const_spec" => {
                let names = self.field_names(node, "name");
                let ty = match node.child_by_field_name("type") {
                    Some(ty) => Some(self.expr(ty)?),
                    None => None,
                };
                let values = match node.child_by_field_name("value") {
                    Some(values) => self.expr_list(values)?,
                    None => Vec::new(),
                };
                Spec::Value(ValueSpec {
                    decs: Decorations::default(),
                    names,
                    ty,
                    values,
                })
            }
            "type_spec" | "type_alias" => {
                let type_params = match node.child_by_field_name("type_parameters") {
                    Some(params) => Some(self.params(params)?),
                    None => None,
                };
                Spec::Type(TypeSpec {
                    decs: Decorations::default(),
                    name: Ident::new(self.text(self.field(node, "name")?)),
                    type_params,
                    assign: node.kind() == "type_alias",
                    ty: self.expr(self.field(node, "type")?)?,
                })
            }
            ")" | ";" => return Ok(None),
            _ => return Err(self.unsupported(node)),
        }))
    }

    pub fn block(&self, node: Node) -> Result<BlockStmt> {
        let (list, trailing) = self.statements(children(node))?;
        Ok(BlockStmt { list, trailing })
    }

    /// Lowers statement children, flattening `statement_list` wrappers.
    fn statements(&self, nodes: Vec<Node>) -> Result<(Vec<Stmt>, Vec<String>)> {
        let mut flat = Vec::new();
        for node in nodes {
            if node.kind() == "statement_list" {
                flat.extend(children(node));
            } else {
                flat.push(node);
            }
        }
        self.decorated(
            flat,
            |this, node| match node.kind() {
                "{" | "}" | ";" => Ok(None),
                _ => this.stmt(node).map(Some),
            },
            |stmt| &mut stmt.decs,
        )
    }

    fn opt_stmt(&self, node: Node, field: &str) -> Result<Option<Box<Stmt>>> {
        match node.child_by_field_name(field) {
            Some(child) => Ok(Some(Box::new(self.stmt(child)?))),
            None => Ok(None),
        }
    }

    pub fn stmt(&self, node: Node) -> Result<Stmt> {
        let kind = match node.kind() {
            "expression_statement" => StmtKind::Expr(self.first_expr(node)?),
            "send_statement" => StmtKind::Send {
                chan: self.expr(self.field(node, "channel")?)?,
                value: self.expr(self.field(node, "value")?)?,
            },
            "inc_statement" | "dec_statement" => StmtKind::IncDec {
                x: self.first_expr(node)?,
                inc: node.kind() == "inc_statement",
            },
            "assignment_statement" => {
                let operator = self.text(self.field(node, "operator")?);
                StmtKind::Assign(AssignStmt {
                    lhs: self.expr_list(self.field(node, "left")?)?,
                    tok: AssignOp::from_token(operator).ok_or_else(|| self.unsupported(node))?,
                    rhs: self.expr_list(self.field(node, "right")?)?,
                })
            }
            "short_var_declaration" => StmtKind::Assign(AssignStmt {
                lhs: self.expr_list(self.field(node, "left")?)?,
                tok: AssignOp::Define,
                rhs: self.expr_list(self.field(node, "right")?)?,
            }),
            "receive_statement" => {
                let right = self.expr(self.field(node, "right")?)?;
                match node.child_by_field_name("left") {
                    Some(left) => {
                        let define = children(node).iter().any(|c| c.kind() == ":=");
                        StmtKind::Assign(AssignStmt {
                            lhs: self.expr_list(left)?,
                            tok: if define { AssignOp::Define } else { AssignOp::Assign },
                            rhs: vec![right],
                        })
                    }
                    None => StmtKind::Expr(right),
                }
            }
            "labeled_statement" | "empty_labeled_statement" => {
                let label = self.field(node, "label")?;
                let inner = named_children(node)
                    .into_iter()
                    .find(|child| child.id() != label.id());
                StmtKind::Labeled {
                    label: Ident::new(self.text(label)),
                    stmt: Box::new(match inner {
                        Some(inner) => self.stmt(inner)?,
                        None => Stmt::new(StmtKind::Empty),
                    }),
                }
            }
            "fallthrough_statement" => StmtKind::Branch {
                tok: BranchToken::Fallthrough,
                label: None,
            },
            "break_statement" | "continue_statement" | "goto_statement" => {
                let tok = match node.kind() {
                    "break_statement" => BranchToken::Break,
                    "continue_statement" => BranchToken::Continue,
                    _ => BranchToken::Goto,
                };
                StmtKind::Branch {
                    tok,
                    label: named_children(node)
                        .first()
                        .map(|label| Ident::new(self.text(*label))),
                }
            }
            "return_statement" => match named_children(node).first() {
                Some(list) => StmtKind::Return(self.expr_list(*list)?),
                None => StmtKind::Return(Vec::new()),
            },
            "go_statement" => StmtKind::Go(self.first_expr(node)?),
            "defer_statement" => StmtKind::Defer(self.first_expr(node)?),
            "block" => StmtKind::Block(self.block(node)?),
            "empty_statement" => StmtKind::Empty,
            "if_statement" => StmtKind::If(self.if_stmt(node)?),
            "for_statement" => self.for_stmt(node)?,
            "expression_switch_statement" => StmtKind::Switch(SwitchStmt {
                init: self.opt_stmt(node, "initializer")?,
                tag: match node.child_by_field_name("value") {
                    Some(tag) => Some(self.expr(tag)?),
                    None => None,
                },
                body: self.case_clauses(node)?,
            }),
            "type_switch_statement" => {
                let binding = match node.child_by_field_name("alias") {
                    Some(alias) => named_children(alias)
                        .first()
                        .map(|n| Ident::new(self.text(*n))),
                    None => None,
                };
                StmtKind::TypeSwitch(TypeSwitchStmt {
                    init: self.opt_stmt(node, "initializer")?,
                    binding,
                    x: self.expr(self.field(node, "value")?)?,
                    body: self.case_clauses(node)?,
                })
            }
            "select_statement" => StmtKind::Select(self.comm_clauses(node)?),
            "const_declaration" | "var_declaration" | "type_declaration" => {
                StmtKind::Decl(self.gen_decl(node)?)
            }
            _ => return Err(self.unsupported(node)),
        };
        Ok(Stmt::new(kind))
    }

    fn if_stmt(&self, node: Node) -> Result<IfStmt> {
        Ok(IfStmt {
            init: self.opt_stmt(node, "initializer")?,
            cond: self.expr(self.field(node, "condition")?)?,
            body: self.block(self.field(node, "consequence")?)?,
            els: self.opt_stmt(node, "alternative")?,
        })
    }

    fn for_stmt(&self, node: Node) -> Result<StmtKind> {
        let body = self.block(self.field(node, "body")?)?;
        let header = named_children(node)
            .into_iter()
            .find(|child| child.kind() != "block");
        let Some(header) = header else {
            return Ok(StmtKind::For(ForStmt {
                init: None,
                cond: None,
                post: None,
                body,
            }));
        };
        match header.kind() {
            "for_clause" => Ok(StmtKind::For(ForStmt {
                init: self.opt_stmt(header, "initializer")?,
                cond: match header.child_by_field_name("condition") {
                    Some(cond) => Some(self.expr(cond)?),
                    None => None,
                },
                post: self.opt_stmt(header, "update")?,
                body,
            })),
            "range_clause" => {
                let (mut key, mut value, mut tok) = (None, None, None);
                if let Some(left) = header.child_by_field_name("left") {
                    let mut left = self.expr_list(left)?.into_iter();
                    key = left.next();
                    value = left.next();
                    let define = children(header).iter().any(|c| c.kind() == ":=");
                    tok = Some(if define { AssignOp::Define } else { AssignOp::Assign });
                }
                Ok(StmtKind::Range(RangeStmt {
                    key,
                    value,
                    tok,
                    x: self.expr(self.field(header, "right")?)?,
                    body,
                }))
            }
            _ => Ok(StmtKind::For(ForStmt {
                init: None,
                cond: Some(self.expr(header)?),
                post: None,
                body,
            })),
        }
    }

    fn case_clauses(&self, node: Node) -> Result<Vec<CaseClause>> {
        let clauses = children(node)
            .into_iter()
            .filter(|c| {
                matches!(
                    c.kind(),
                    "expression_case" | "type_case" | "default_case" | "comment"
                )
            })
            .collect();
        let (clauses, _) = self.decorated(
            clauses,
            |this, clause| {
                let is_default = clause.kind() == "default_case";
                let list = match clause.kind() {
                    "expression_case" => this.expr_list(this.field(clause, "value")?)?,
                    "type_case" => {
                        let mut cursor = clause.walk();
                        clause
                            .children_by_field_name("type", &mut cursor)
                            .map(|ty| this.expr(ty))
                            .collect::<Result<Vec<_>>>()?
                    }
                    _ => Vec::new(),
                };
                let body = this.clause_body(clause)?;
                Ok(Some(CaseClause {
                    decs: Decorations::default(),
                    list,
                    is_default,
                    body,
                }))
            },
            |clause| &mut clause.decs,
        )?;
        Ok(clauses)
    }

    /// Statements of a case clause follow its `:` token.
    fn clause_body(&self, clause: Node) -> Result<Vec<Stmt>> {
        let nodes = children(clause);
        let colon = nodes.iter().position(|c| c.kind() == ":").unwrap_or(nodes.len());
        let (body, _) = self.statements(nodes.into_iter().skip(colon + 1).collect())?;
        Ok(body)
    }

    fn comm_clauses(&self, node: Node) -> Result<Vec<CommClause>> {
        let clauses = children(node)
            .into_iter()
            .filter(|c| matches!(c.kind(), "communication_case" | "default_case" | "comment"))
            .collect();
        let (clauses, _) = self.decorated(
            clauses,
            |this, clause| {
                let comm = match clause.child_by_field_name("communication") {
                    Some(comm) => Some(Box::new(this.stmt(comm)?)),
                    None => None,
                };
                Ok(Some(CommClause {
                    decs: Decorations::default(),
                    comm,
                    body: this.clause_body(clause)?,
                }))
            },
            |clause| &mut clause.decs,
        )?;
        Ok(clauses)
    }

    fn first_expr(&self, node: Node) -> Result<Expr> {
        let first = named_children(node)
            .into_iter()
            .next()
            .ok_or_else(|| self.unsupported(node))?;
        self.expr(first)
    }

    fn expr_list(&self, node: Node) -> Result<Vec<Expr>> {
        if node.kind() != "expression_list" {
            return Ok(vec![self.expr(node)?]);
        }
        named_children(node)
            .into_iter()
            .map(|child| self.expr(child))
            .collect()
    }

    fn boxed(&self, node: Node, field: &str) -> Result<Box<Expr>> {
        Ok(Box::new(self.expr(self.field(node, field)?)?))
    }

    fn opt_boxed(&self, node: Node, field: &str) -> Result<Option<Box<Expr>>> {
        match node.child_by_field_name(field) {
            Some(child) => Ok(Some(Box::new(self.expr(child)?))),
            None => Ok(None),
        }
    }

    /// Resolves `pkg.Name` to a path-qualified identifier when `pkg` names an
    /// imported package.
    fn qualify(&self, package: &str, name: &str) -> Expr {
        match self.packages.get(package) {
            Some(path) => Expr::qualified(path.clone(), name),
            None => Expr::selector(Expr::ident(package), name),
        }
    }

    /// Whether a local declaration in scope at `node` hides a package named
    /// `name`.
    fn shadowed(&self, node: Node, name: &str) -> bool {
        if !self.packages.contains_key(name) {
            return false;
        }
        let mut inner = node;
        while let Some(outer) = inner.parent() {
            let in_body = inner.kind() == "block";
            for sibling in named_children(outer) {
                if sibling.end_byte() > inner.start_byte() {
                    break;
                }
                let declares = match sibling.kind() {
                    "parameter_list" => in_body && self.declares(sibling, name),
                    "expression_list" => {
                        outer.kind() == "type_switch_statement"
                            && outer.child_by_field_name("alias") == Some(sibling)
                            && self.lists(sibling, name)
                    }
                    _ => self.declares(sibling, name),
                };
                if declares {
                    return true;
                }
            }
            inner = outer;
        }
        false
    }

    /// Whether `node` (a statement, clause or parameter list) declares `name`
    /// for the statements after it.
    fn declares(&self, node: Node, name: &str) -> bool {
        let defines = || children(node).iter().any(|c| c.kind() == ":=");
        match node.kind() {
            "short_var_declaration" => node
                .child_by_field_name("left")
                .is_some_and(|left| self.lists(left, name)),
            "receive_statement" | "range_clause" => {
                defines()
                    && node
                        .child_by_field_name("left")
                        .is_some_and(|left| self.lists(left, name))
            }
            "for_clause" => node
                .child_by_field_name("initializer")
                .is_some_and(|init| self.declares(init, name)),
            "var_declaration" | "const_declaration" | "type_declaration" | "var_spec_list" => {
                named_children(node).into_iter().any(|spec| self.declares(spec, name))
            }
            "var_spec" | "const_spec" | "type_spec" | "type_alias" | "parameter_declaration"
            | "variadic_parameter_declaration" => {
                self.field_names(node, "name").iter().any(|ident| ident.name == name)
            }
            "parameter_list" => named_children(node).into_iter().any(|param| self.declares(param, name)),
            _ => false,
        }
    }

    fn lists(&self, list: Node, name: &str) -> bool {
        match list.kind() {
            "identifier" => self.text(list) == name,
            _ => named_children(list).iter().any(|item| self.text(*item) == name),
        }
    }

    pub fn expr(&self, node: Node) -> Result<Expr> {
        Ok(match node.kind() {
            "identifier" | "field_identifier" | "type_identifier" | "package_identifier"
            | "blank_identifier" | "label_name" | "nil" | "true" | "false" | "iota" | "dot" => {
                Expr::ident(self.text(node))
            }
            "int_literal" => self.lit(node, LitKind::Int),
            "float_literal" => self.lit(node, LitKind::Float),
            "imaginary_literal" => self.lit(node, LitKind::Imag),
            "rune_literal" => self.lit(node, LitKind::Char),
            "interpreted_string_literal" | "raw_string_literal" => self.lit(node, LitKind::String),
            "parenthesized_expression" | "parenthesized_type" => {
                Expr::Paren(Box::new(self.first_expr(node)?))
            }
            "selector_expression" => {
                let operand = self.field(node, "operand")?;
                let field = self.text(self.field(node, "field")?);
                if operand.kind() == "identifier" && !self.shadowed(node, self.text(operand)) {
                    self.qualify(self.text(operand), field)
                } else {
                    Expr::selector(self.expr(operand)?, field)
                }
            }
            "qualified_type" => self.qualify(
                self.text(self.field(node, "package")?),
                self.text(self.field(node, "name")?),
            ),
            "call_expression" => self.call(node)?,
            "index_expression" => Expr::Index {
                x: self.boxed(node, "operand")?,
                indices: vec![self.expr(self.field(node, "index")?)?],
            },
            "generic_type" => Expr::Index {
                x: self.boxed(node, "type")?,
                indices: self.type_arguments(self.field(node, "type_arguments")?)?,
            },
            "type_instantiation_expression" => {
                let ty = self.field(node, "type")?;
                let indices = named_children(node)
                    .into_iter()
                    .filter(|child| child.id() != ty.id())
                    .map(|child| self.expr(child))
                    .collect::<Result<Vec<_>>>()?;
                Expr::Index {
                    x: Box::new(self.expr(ty)?),
                    indices,
                }
            }
            "slice_expression" => {
                let colons = children(node).iter().filter(|c| c.kind() == ":").count();
                Expr::Slice {
                    x: self.boxed(node, "operand")?,
                    low: self.opt_boxed(node, "start")?,
                    high: self.opt_boxed(node, "end")?,
                    max: self.opt_boxed(node, "capacity")?,
                    slice3: colons == 2,
                }
            }
            "type_assertion_expression" => Expr::TypeAssert {
                x: self.boxed(node, "operand")?,
                ty: Some(self.boxed(node, "type")?),
            },
            "type_conversion_expression" => Expr::Call(CallExpr {
                fun: self.boxed(node, "type")?,
                args: vec![self.expr(self.field(node, "operand")?)?],
                ellipsis: false,
            }),
            "unary_expression" => {
                let operator = self.text(self.field(node, "operator")?);
                let x = self.boxed(node, "operand")?;
                if operator == "*" {
                    Expr::Star(x)
                } else {
                    Expr::Unary {
                        op: UnaryOp::from_token(operator).ok_or_else(|| self.unsupported(node))?,
                        x,
                    }
                }
            }
            "binary_expression" => {
                let operator = self.text(self.field(node, "operator")?);
                Expr::Binary {
                    x: self.boxed(node, "left")?,
                    op: BinaryOp::from_token(operator).ok_or_else(|| self.unsupported(node))?,
                    y: self.boxed(node, "right")?,
                }
            }
            "composite_literal" => {
                let body = self.field(node, "body")?;
                let mut lit = self.literal_value(body)?;
                lit.ty = Some(self.boxed(node, "type")?);
                Expr::CompositeLit(lit)
            }
            "literal_value" => Expr::CompositeLit(self.literal_value(node)?),
            "literal_element" => self.first_expr(node)?,
            "keyed_element" => {
                let parts = named_children(node);
                match parts.as_slice() {
                    [key, value] => Expr::KeyValue {
                        key: Box::new(self.expr(*key)?),
                        value: Box::new(self.expr(*value)?),
                    },
                    _ => return Err(self.unsupported(node)),
                }
            }
            "func_literal" => Expr::FuncLit(FuncLit {
                ty: self.func_type(node)?,
                body: self.block(self.field(node, "body")?)?,
            }),
            "pointer_type" => Expr::Star(Box::new(self.first_expr(node)?)),
            "array_type" => Expr::ArrayType {
                len: Some(self.boxed(node, "length")?),
                elt: self.boxed(node, "element")?,
            },
            "implicit_length_array_type" => Expr::ArrayType {
                len: Some(Box::new(Expr::Ellipsis(None))),
                elt: self.boxed(node, "element")?,
            },
            "slice_type" => Expr::ArrayType {
                len: None,
                elt: self.boxed(node, "element")?,
            },
            "map_type" => Expr::MapType {
                key: self.boxed(node, "key")?,
                value: self.boxed(node, "value")?,
            },
            "channel_type" => {
                let tokens: Vec<&str> = children(node)
                    .iter()
                    .filter(|c| !c.is_named())
                    .map(|c| c.kind())
                    .collect();
                let dir = match tokens.as_slice() {
                    ["<-", ..] => ChanDir::Recv,
                    ["chan", "<-", ..] => ChanDir::Send,
                    _ => ChanDir::Both,
                };
                Expr::ChanType {
                    dir,
                    value: self.boxed(node, "value")?,
                }
            }
            "function_type" => Expr::FuncType(self.func_type(node)?),
            "struct_type" => {
                let list = named_children(node)
                    .into_iter()
                    .find(|c| c.kind() == "field_declaration_list");
                match list {
                    Some(list) => Expr::StructType(self.struct_fields(list)?),
                    None => Expr::StructType(FieldList::default()),
                }
            }
            "interface_type" => Expr::InterfaceType(self.interface_elems(node)?),
            "negated_type" => Expr::Unary {
                op: UnaryOp::Tilde,
                x: Box::new(self.first_expr(node)?),
            },
            "type_elem" | "type_constraint" | "constraint_elem" => self.union(node)?,
            "variadic_argument" => Expr::Ellipsis(Some(Box::new(self.first_expr(node)?))),
            _ => return Err(self.unsupported(node)),
        })
    }

    fn lit(&self, node: Node, kind: LitKind) -> Expr {
        Expr::BasicLit(BasicLit {
            kind,
            value: self.text(node).to_string(),
        })
    }

    /// `A | B | ~C` type sets fold into left-associated `|` expressions.
    fn union(&self, node: Node) -> Result<Expr> {
        let mut terms = named_children(node).into_iter();
        let first = terms.next().ok_or_else(|| self.unsupported(node))?;
        let mut expr = self.expr(first)?;
        for term in terms {
            expr = Expr::Binary {
                x: Box::new(expr),
                op: BinaryOp::Or,
                y: Box::new(self.expr(term)?),
            };
        }
        Ok(expr)
    }

    fn type_arguments(&self, node: Node) -> Result<Vec<Expr>> {
        named_children(node)
            .into_iter()
            .map(|child| self.expr(child))
            .collect()
    }

    fn call(&self, node: Node) -> Result<Expr> {
        let mut fun = self.expr(self.field(node, "function")?)?;
        if let Some(type_args) = node.child_by_field_name("type_arguments") {
            fun = Expr::Index {
                x: Box::new(fun),
                indices: self.type_arguments(type_args)?,
            };
        }
        let arguments = self.field(node, "arguments")?;
        let mut args = Vec::new();
        let mut ellipsis = false;
        for child in children(arguments) {
            match child.kind() {
                "variadic_argument" => {
                    ellipsis = true;
                    args.push(self.first_expr(child)?);
                }
                "..." => ellipsis = true,
                "comment" => {}
                _ if child.is_named() => args.push(self.expr(child)?),
                _ => {}
            }
        }
        Ok(Expr::Call(CallExpr {
            fun: Box::new(fun),
            args,
            ellipsis,
        }))
    }

    fn literal_value(&self, node: Node) -> Result<CompositeLit> {
        let elts = named_children(node)
            .into_iter()
            .map(|child| self.expr(child))
            .collect::<Result<Vec<_>>>()?;
        let multiline = !elts.is_empty() && node.start_position().row != node.end_position().row;
        Ok(CompositeLit {
            ty: None,
            elts,
            multiline,
        })
    }

    fn struct_fields(&self, node: Node) -> Result<FieldList> {
        let (list, trailing) = self.decorated(
            children(node),
            |this, child| {
                if child.kind() != "field_declaration" {
                    return Ok(None);
                }
                let names = this.field_names(child, "name");
                let mut ty = this.expr(this.field(child, "type")?)?;
                let embedded_pointer =
                    names.is_empty() && children(child).iter().any(|c| c.kind() == "*");
                if embedded_pointer {
                    ty = Expr::Star(Box::new(ty));
                }
                let mut field = Field::new(names, ty);
                field.tag = child
                    .child_by_field_name("tag")
                    .map(|tag| this.text(tag).to_string());
                Ok(Some(field))
            },
            |field| &mut field.decs,
        )?;
        Ok(FieldList { list, trailing })
    }

    fn interface_elems(&self, node: Node) -> Result<FieldList> {
        let (list, trailing) = self.decorated(
            children(node),
            |this, child| {
                Ok(Some(match child.kind() {
                    "method_elem" | "method_spec" => {
                        let name = Ident::new(this.text(this.field(child, "name")?));
                        Field::new(vec![name], Expr::FuncType(this.func_type(child)?))
                    }
                    "{" | "}" | ";" | "interface" => return Ok(None),
                    _ if child.is_named() => Field::new(Vec::new(), this.expr(child)?),
                    _ => return Ok(None),
                }))
            },
            |field| &mut field.decs,
        )?;
        Ok(FieldList { list, trailing })
    }
}

fn children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

fn unquote(literal: &str) -> String {
    let trimmed = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| literal.strip_prefix('`').and_then(|s| s.strip_suffix('`')));
    match trimmed {
        Some(inner) => inner.to_string(),
        None => {
            trace!(literal, "import path is not quoted");
            literal.to_string()
        }
    }
}
