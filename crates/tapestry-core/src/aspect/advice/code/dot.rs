//! The value templates see as `.`: the matched node, its enclosing function
//! and facts about the package being woven.

use std::collections::{BTreeMap, HashMap};

use crate::aspect::context::AdviceContext;
use crate::aspect::join::parse_directive_args;
use crate::ast::printer::ToSource;
use crate::ast::{Decl, Expr, Node, Spec, StmtKind};
use crate::typed::Type;

use super::exec::{Host, Value};
use super::{placeholder, TemplateError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Object {
    Dot,
    Function,
    /// A captured syntax node, by capture id.
    Node(usize),
}

impl Object {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Object::Dot => "*code.dot",
            Object::Function => "*code.function",
            Object::Node(_) => "ast.Node",
        }
    }
}

fn exec_error(message: impl Into<String>) -> TemplateError {
    TemplateError::Exec {
        message: message.into(),
    }
}

/// Resolves objects against the advice context and records every syntax
/// node the template references.
pub(crate) struct DotHost<'c, 'a> {
    ctx: &'c mut AdviceContext<'a>,
    captures: Vec<Node>,
    root: Option<usize>,
    members: HashMap<(usize, String), Value>,
}

impl<'c, 'a> DotHost<'c, 'a> {
    pub(crate) fn new(ctx: &'c mut AdviceContext<'a>) -> Self {
        Self {
            ctx,
            captures: Vec::new(),
            root: None,
            members: HashMap::new(),
        }
    }

    /// Binds `.AST` to `node` rather than the matched node.
    pub(crate) fn set_ast(&mut self, node: Node) {
        self.capture(node);
        self.root = Some(self.captures.len() - 1);
    }

    pub(crate) fn into_captures(self) -> Vec<Node> {
        self.captures
    }

    fn capture(&mut self, node: Node) -> Value {
        self.captures.push(node);
        Value::Object(Object::Node(self.captures.len() - 1))
    }

    fn string_arg(name: &str, args: &[Value]) -> Result<String, TemplateError> {
        match args {
            [Value::Str(s)] => Ok(s.clone()),
            _ => Err(exec_error(format!("{name} expects one string argument"))),
        }
    }

    fn index_arg(name: &str, args: &[Value]) -> Result<usize, TemplateError> {
        match args {
            [Value::Int(i)] => usize::try_from(*i)
                .map_err(|_| exec_error(format!("{name}: negative index {i}"))),
            _ => Err(exec_error(format!("{name} expects one integer argument"))),
        }
    }

    fn no_args(name: &str, args: &[Value]) -> Result<(), TemplateError> {
        if args.is_empty() {
            Ok(())
        } else {
            Err(exec_error(format!("{name} takes no arguments")))
        }
    }

    fn parse_type(spec: &str) -> Result<Type, TemplateError> {
        Type::parse(spec).map_err(|err| exec_error(format!("invalid type {spec:?}: {err}")))
    }

    fn dot(&mut self, name: &str, args: Vec<Value>) -> Result<Value, TemplateError> {
        match name {
            "AST" => {
                Self::no_args(name, &args)?;
                if let Some(id) = self.root {
                    return Ok(Value::Object(Object::Node(id)));
                }
                let node = self
                    .ctx
                    .node()
                    .to_owned_node()
                    .ok_or_else(|| exec_error("the file node has no AST value"))?;
                let value = self.capture(node);
                self.root = Some(self.captures.len() - 1);
                Ok(value)
            }
            "DirectiveArgs" => {
                let directive = Self::string_arg(name, &args)?;
                let Some(raw) = self.ctx.directive(&directive) else {
                    return Ok(Value::List(Vec::new()));
                };
                let parsed = parse_directive_args(&raw)
                    .map_err(|err| exec_error(format!("directive {directive}: {err}")))?;
                Ok(Value::List(
                    parsed
                        .into_iter()
                        .map(|arg| {
                            let mut map = BTreeMap::new();
                            map.insert("Key".to_string(), Value::Str(arg.key));
                            map.insert("Value".to_string(), Value::Str(arg.value));
                            Value::Map(map)
                        })
                        .collect(),
                ))
            }
            "FindArgument" => self.function("ArgumentOfType", args),
            "Function" => {
                Self::no_args(name, &args)?;
                if self.ctx.function().is_none() {
                    return Err(exec_error("no function encloses the node"));
                }
                Ok(Value::Object(Object::Function))
            }
            "ImportPath" => {
                Self::no_args(name, &args)?;
                Ok(Value::from(self.ctx.import_path()))
            }
            "PackageName" => {
                Self::no_args(name, &args)?;
                Ok(Value::from(self.ctx.package_name()))
            }
            "Config" => {
                let key = Self::string_arg(name, &args)?;
                Ok(Value::from(self.ctx.config(&key).unwrap_or_default()))
            }
            "TestMain" => {
                Self::no_args(name, &args)?;
                Ok(Value::Bool(self.ctx.file().config.test_main))
            }
            other => Err(exec_error(format!("can't evaluate field {other} in type *code.dot"))),
        }
    }

    fn function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, TemplateError> {
        let import_path = self.ctx.import_path();
        match name {
            "Name" => {
                Self::no_args(name, &args)?;
                let function = self.ctx.function().ok_or_else(|| exec_error("no function"))?;
                Ok(Value::from(
                    function.name.map(|ident| ident.name.clone()).unwrap_or_default(),
                ))
            }
            "Receiver" => {
                Self::no_args(name, &args)?;
                self.ctx
                    .name_receiver()
                    .map(Value::Str)
                    .ok_or_else(|| exec_error("function has no receiver"))
            }
            "Argument" => {
                let index = Self::index_arg(name, &args)?;
                self.ctx
                    .name_argument(index)
                    .map(Value::Str)
                    .ok_or_else(|| exec_error(format!("function has no argument {index}")))
            }
            "Returns" => {
                let index = Self::index_arg(name, &args)?;
                self.ctx
                    .name_result(index)
                    .map(Value::Str)
                    .ok_or_else(|| exec_error(format!("function has no result {index}")))
            }
            "ArgumentOfType" => {
                let ty = Self::parse_type(&Self::string_arg(name, &args)?)?;
                let found = self.ctx.function().and_then(|function| {
                    function
                        .arguments()
                        .iter()
                        .position(|(_, expr)| ty.matches_in_package(expr, import_path))
                });
                Ok(Value::from(found.and_then(|i| self.ctx.name_argument(i)).unwrap_or_default()))
            }
            "ResultOfType" => {
                let ty = Self::parse_type(&Self::string_arg(name, &args)?)?;
                let found = self.ctx.function().and_then(|function| {
                    function
                        .results()
                        .iter()
                        .position(|(_, expr)| ty.matches_in_package(expr, import_path))
                });
                Ok(Value::from(found.and_then(|i| self.ctx.name_result(i)).unwrap_or_default()))
            }
            "LastResultThatImplements" => {
                let iface = Self::parse_type(&Self::string_arg(name, &args)?)?;
                let resolver = self.ctx.resolver();
                let found = self.ctx.function().and_then(|function| {
                    function.results().iter().rposition(|(_, expr)| {
                        iface.matches_in_package(expr, import_path)
                            || resolver.implements(expr, &iface, import_path) == Some(true)
                    })
                });
                Ok(Value::from(found.and_then(|i| self.ctx.name_result(i)).unwrap_or_default()))
            }
            other => Err(exec_error(format!(
                "can't evaluate field {other} in type *code.function"
            ))),
        }
    }

    fn node_member(&mut self, id: usize, name: &str, args: Vec<Value>) -> Result<Value, TemplateError> {
        Self::no_args(name, &args)?;
        let key = (id, name.to_string());
        if let Some(value) = self.members.get(&key) {
            return Ok(value.clone());
        }
        let node = self
            .captures
            .get(id)
            .cloned()
            .ok_or_else(|| exec_error(format!("unknown node {id}")))?;
        let member = member(&node, name).ok_or_else(|| {
            exec_error(format!("can't evaluate field {name} on {}", node_kind_name(&node)))
        })?;
        let value = self.materialize(member);
        self.members.insert(key, value.clone());
        Ok(value)
    }

    fn materialize(&mut self, member: Member) -> Value {
        match member {
            Member::Nil => Value::Nil,
            Member::Str(s) => Value::Str(s),
            Member::Bool(b) => Value::Bool(b),
            Member::Node(node) => self.capture(node),
            Member::Nodes(nodes) => {
                Value::List(nodes.into_iter().map(|node| self.capture(node)).collect())
            }
        }
    }
}

impl Host for DotHost<'_, '_> {
    fn call(&mut self, receiver: &Object, name: &str, args: Vec<Value>) -> Result<Value, TemplateError> {
        match receiver {
            Object::Dot => self.dot(name, args),
            Object::Function => self.function(name, args),
            Object::Node(id) => self.node_member(*id, name, args),
        }
    }

    fn render(&mut self, object: &Object) -> Result<String, TemplateError> {
        match object {
            Object::Dot => Err(exec_error("can't print the template context")),
            Object::Function => Ok(self
                .ctx
                .function()
                .and_then(|function| function.name.map(|ident| ident.name.clone()))
                .unwrap_or_default()),
            Object::Node(id) => {
                let node = self
                    .captures
                    .get(*id)
                    .ok_or_else(|| exec_error(format!("unknown node {id}")))?;
                Ok(match node {
                    Node::Expr(Expr::Ident(ident)) if ident.path.is_none() => ident.name.clone(),
                    Node::Expr(_) | Node::Stmt(_) | Node::Block(_) => placeholder::text(*id),
                    other => other.to_source(),
                })
            }
        }
    }
}

/// A field of a syntax node, named as in Go's `go/ast`.
enum Member {
    Nil,
    Str(String),
    Bool(bool),
    Node(Node),
    Nodes(Vec<Node>),
}

fn expr(expr: &Expr) -> Member {
    Member::Node(Node::Expr(expr.clone()))
}

fn opt_expr(e: Option<&Expr>) -> Member {
    e.map_or(Member::Nil, expr)
}

fn exprs(list: &[Expr]) -> Member {
    Member::Nodes(list.iter().cloned().map(Node::Expr).collect())
}

fn idents(list: &[crate::ast::Ident]) -> Member {
    Member::Nodes(list.iter().cloned().map(|ident| Node::Expr(Expr::Ident(ident))).collect())
}

fn node_kind_name(node: &Node) -> String {
    match node {
        Node::Decl(Decl::Func(_)) => "FuncDecl".to_string(),
        Node::Decl(Decl::Gen(_)) => "GenDecl".to_string(),
        Node::Spec(Spec::Import(_)) => "ImportSpec".to_string(),
        Node::Spec(Spec::Value(_)) => "ValueSpec".to_string(),
        Node::Spec(Spec::Type(_)) => "TypeSpec".to_string(),
        Node::Field(_) => "Field".to_string(),
        Node::FieldList(_) => "FieldList".to_string(),
        Node::FuncType(_) => "FuncType".to_string(),
        Node::Block(_) => "BlockStmt".to_string(),
        Node::Stmt(stmt) => crate::ast::NodeKind::of_stmt(&stmt.kind).to_string(),
        Node::Expr(e) => crate::ast::NodeKind::of_expr(e).to_string(),
    }
}

fn member(node: &Node, name: &str) -> Option<Member> {
    Some(match (node, name) {
        (Node::Expr(e), _) => return expr_member(e, name),
        (Node::Stmt(stmt), _) => return stmt_member(&stmt.kind, name),
        (Node::Block(block), "List") => {
            Member::Nodes(block.list.iter().cloned().map(Node::Stmt).collect())
        }
        (Node::Decl(Decl::Func(func)), "Name") => expr(&Expr::Ident(func.name.clone())),
        (Node::Decl(Decl::Func(func)), "Recv") => func
            .recv
            .clone()
            .map_or(Member::Nil, |recv| Member::Node(Node::FieldList(recv))),
        (Node::Decl(Decl::Func(func)), "Type") => Member::Node(Node::FuncType(func.ty.clone())),
        (Node::Decl(Decl::Func(func)), "Body") => func
            .body
            .clone()
            .map_or(Member::Nil, |body| Member::Node(Node::Block(body))),
        (Node::Decl(Decl::Gen(gen)), "Tok") => Member::Str(gen.tok.as_str().to_string()),
        (Node::Decl(Decl::Gen(gen)), "Specs") => {
            Member::Nodes(gen.specs.iter().cloned().map(Node::Spec).collect())
        }
        (Node::Spec(Spec::Value(spec)), "Names") => idents(&spec.names),
        (Node::Spec(Spec::Value(spec)), "Type") => opt_expr(spec.ty.as_ref()),
        (Node::Spec(Spec::Value(spec)), "Values") => exprs(&spec.values),
        (Node::Spec(Spec::Type(spec)), "Name") => expr(&Expr::Ident(spec.name.clone())),
        (Node::Spec(Spec::Type(spec)), "Type") => expr(&spec.ty),
        (Node::Spec(Spec::Import(spec)), "Name") => spec
            .name
            .clone()
            .map_or(Member::Nil, |name| Member::Node(Node::Expr(Expr::Ident(name)))),
        (Node::Spec(Spec::Import(spec)), "Path") => Member::Str(spec.path.clone()),
        (Node::Field(field), "Names") => idents(&field.names),
        (Node::Field(field), "Type") => expr(&field.ty),
        (Node::Field(field), "Tag") => field.tag.clone().map_or(Member::Nil, Member::Str),
        (Node::FieldList(fields), "List") => {
            Member::Nodes(fields.list.iter().cloned().map(Node::Field).collect())
        }
        (Node::FuncType(ty), "Params") => Member::Node(Node::FieldList(ty.params.clone())),
        (Node::FuncType(ty), "Results") => Member::Node(Node::FieldList(ty.results.clone())),
        _ => return None,
    })
}

fn expr_member(e: &Expr, name: &str) -> Option<Member> {
    Some(match (e, name) {
        (Expr::Ident(ident), "Name") => Member::Str(ident.name.clone()),
        (Expr::BasicLit(lit), "Value") => Member::Str(lit.value.clone()),
        (Expr::BasicLit(lit), "Kind") => Member::Str(format!("{:?}", lit.kind).to_uppercase()),
        (Expr::CompositeLit(lit), "Type") => opt_expr(lit.ty.as_deref()),
        (Expr::CompositeLit(lit), "Elts") => exprs(&lit.elts),
        (Expr::FuncLit(lit), "Type") => Member::Node(Node::FuncType(lit.ty.clone())),
        (Expr::FuncLit(lit), "Body") => Member::Node(Node::Block(lit.body.clone())),
        (Expr::Paren(x), "X") | (Expr::Star(x), "X") => expr(x),
        (Expr::Selector { x, .. }, "X") => expr(x),
        (Expr::Selector { sel, .. }, "Sel") => expr(&Expr::Ident(sel.clone())),
        (Expr::Index { x, .. }, "X") => expr(x),
        (Expr::Index { indices, .. }, "Index") => opt_expr(indices.first()),
        (Expr::Index { indices, .. }, "Indices") => exprs(indices),
        (Expr::Slice { x, .. }, "X") => expr(x),
        (Expr::Slice { low, .. }, "Low") => opt_expr(low.as_deref()),
        (Expr::Slice { high, .. }, "High") => opt_expr(high.as_deref()),
        (Expr::Slice { max, .. }, "Max") => opt_expr(max.as_deref()),
        (Expr::TypeAssert { x, .. }, "X") => expr(x),
        (Expr::TypeAssert { ty, .. }, "Type") => opt_expr(ty.as_deref()),
        (Expr::Call(call), "Fun") => expr(&call.fun),
        (Expr::Call(call), "Args") => exprs(&call.args),
        (Expr::Call(call), "Ellipsis") => Member::Bool(call.ellipsis),
        (Expr::Unary { x, .. }, "X") => expr(x),
        (Expr::Unary { op, .. }, "Op") => Member::Str(op.as_str().to_string()),
        (Expr::Binary { x, .. }, "X") => expr(x),
        (Expr::Binary { y, .. }, "Y") => expr(y),
        (Expr::Binary { op, .. }, "Op") => Member::Str(op.as_str().to_string()),
        (Expr::KeyValue { key, .. }, "Key") => expr(key),
        (Expr::KeyValue { value, .. }, "Value") => expr(value),
        (Expr::ArrayType { len, .. }, "Len") => opt_expr(len.as_deref()),
        (Expr::ArrayType { elt, .. }, "Elt") => expr(elt),
        (Expr::MapType { key, .. }, "Key") => expr(key),
        (Expr::MapType { value, .. }, "Value") | (Expr::ChanType { value, .. }, "Value") => {
            expr(value)
        }
        (Expr::FuncType(ty), "Params") => Member::Node(Node::FieldList(ty.params.clone())),
        (Expr::FuncType(ty), "Results") => Member::Node(Node::FieldList(ty.results.clone())),
        (Expr::StructType(fields), "Fields") | (Expr::InterfaceType(fields), "Methods") => {
            Member::Node(Node::FieldList(fields.clone()))
        }
        _ => return None,
    })
}

fn stmt_member(kind: &StmtKind, name: &str) -> Option<Member> {
    Some(match (kind, name) {
        (StmtKind::Expr(x), "X") | (StmtKind::IncDec { x, .. }, "X") => expr(x),
        (StmtKind::Go(call), "Call") | (StmtKind::Defer(call), "Call") => expr(call),
        (StmtKind::Assign(assign), "Lhs") => exprs(&assign.lhs),
        (StmtKind::Assign(assign), "Rhs") => exprs(&assign.rhs),
        (StmtKind::Assign(assign), "Tok") => Member::Str(assign.tok.as_str().to_string()),
        (StmtKind::Return(results), "Results") => exprs(results),
        (StmtKind::Send { chan, .. }, "Chan") => expr(chan),
        (StmtKind::Send { value, .. }, "Value") => expr(value),
        (StmtKind::Labeled { label, .. }, "Label") => expr(&Expr::Ident(label.clone())),
        (StmtKind::Labeled { stmt, .. }, "Stmt") => Member::Node(Node::Stmt(stmt.as_ref().clone())),
        (StmtKind::Block(block), "List") => {
            Member::Nodes(block.list.iter().cloned().map(Node::Stmt).collect())
        }
        (StmtKind::If(stmt), "Init") => stmt
            .init
            .as_deref()
            .map_or(Member::Nil, |init| Member::Node(Node::Stmt(init.clone()))),
        (StmtKind::If(stmt), "Cond") => expr(&stmt.cond),
        (StmtKind::If(stmt), "Body") => Member::Node(Node::Block(stmt.body.clone())),
        (StmtKind::If(stmt), "Else") => stmt
            .els
            .as_deref()
            .map_or(Member::Nil, |els| Member::Node(Node::Stmt(els.clone()))),
        (StmtKind::Decl(gen), "Decl") => Member::Node(Node::Decl(Decl::Gen(gen.clone()))),
        _ => return None,
    })
}
