//! Owned, decorated Go syntax tree.
//!
//! The tree is what aspects match against and what advice rewrites. It is a
//! lossless-enough model of Go source: every declaration, specification,
//! statement and field carries [`Decorations`] (leading comment lines,
//! trailing same-line comments and whether an empty line preceded it), so the
//! printed output keeps directives and documentation where the author put
//! them.
//!
//! Package-qualified references are not kept as selector expressions: the
//! parser resolves `http.Request` to `Ident { name: "Request", path:
//! Some("net/http") }` using the file's imports, and the printer turns it back
//! into a qualified reference using whatever local name the file ends up
//! importing the package under. Synthetic references produced by templates
//! use the same representation, which is how the injector knows which imports
//! a rewritten file needs.

pub mod printer;
pub mod visit;

use std::collections::BTreeMap;
use std::fmt;

pub use printer::{print_file, ToSource};

/// Whitespace preceding a decorated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Space {
    #[default]
    None,
    NewLine,
    EmptyLine,
}

/// Comments and spacing attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decorations {
    pub before: Space,
    /// Comment lines printed before the node, each including its `//` or `/*` marker.
    pub start: Vec<String>,
    /// Comments printed after the node on the same line.
    pub end: Vec<String>,
}

impl Decorations {
    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.end.is_empty() && self.before == Space::None
    }

    pub fn with_start(line: impl Into<String>) -> Self {
        Self {
            start: vec![line.into()],
            ..Default::default()
        }
    }
}

/// An identifier, optionally qualified by the import path of the package it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident {
    pub name: String,
    pub path: Option<String>,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }

    pub fn qualified(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.path.is_none() && self.name == "_"
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{path}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A parsed Go source file.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub package: Ident,
    pub decls: Vec<Decl>,
    /// `start` holds comments preceding the package clause, `end` trailing
    /// comments after the last declaration.
    pub decs: Decorations,
}

impl File {
    pub fn imports(&self) -> impl Iterator<Item = &ImportSpec> {
        self.decls.iter().flat_map(|decl| match decl {
            Decl::Gen(gen) if gen.tok == DeclToken::Import => gen
                .specs
                .iter()
                .filter_map(|spec| match spec {
                    Spec::Import(import) => Some(import),
                    _ => None,
                })
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        })
    }

    /// Maps each import path of the file to the local name it is referenced by.
    /// Blank and dot imports are left out.
    pub fn import_names(&self) -> BTreeMap<String, String> {
        let mut names = BTreeMap::new();
        for import in self.imports() {
            let local = match &import.name {
                Some(name) if name.name == "_" || name.name == "." => continue,
                Some(name) => name.name.clone(),
                None => crate::parser::guess_package_name(&import.path),
            };
            names.entry(import.path.clone()).or_insert(local);
        }
        names
    }

    pub fn imports_path(&self, path: &str) -> bool {
        self.imports().any(|import| import.path == path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Func(FuncDecl),
    Gen(GenDecl),
}

impl Decl {
    pub fn decs(&self) -> &Decorations {
        match self {
            Decl::Func(func) => &func.decs,
            Decl::Gen(gen) => &gen.decs,
        }
    }

    pub fn decs_mut(&mut self) -> &mut Decorations {
        match self {
            Decl::Func(func) => &mut func.decs,
            Decl::Gen(gen) => &mut gen.decs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub decs: Decorations,
    pub recv: Option<FieldList>,
    pub name: Ident,
    pub ty: FuncType,
    pub body: Option<BlockStmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclToken {
    Import,
    Const,
    Type,
    Var,
}

impl DeclToken {
    pub fn as_str(self) -> &'static str {
        match self {
            DeclToken::Import => "import",
            DeclToken::Const => "const",
            DeclToken::Type => "type",
            DeclToken::Var => "var",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenDecl {
    pub decs: Decorations,
    pub tok: DeclToken,
    /// Whether the specs are wrapped in a parenthesised group.
    pub grouped: bool,
    pub specs: Vec<Spec>,
    /// Comments inside the group after the last spec.
    pub trailing: Vec<String>,
}

impl GenDecl {
    pub fn new(tok: DeclToken, specs: Vec<Spec>) -> Self {
        Self {
            decs: Decorations::default(),
            tok,
            grouped: specs.len() > 1,
            specs,
            trailing: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Spec {
    Import(ImportSpec),
    Value(ValueSpec),
    Type(TypeSpec),
}

impl Spec {
    pub fn decs(&self) -> &Decorations {
        match self {
            Spec::Import(spec) => &spec.decs,
            Spec::Value(spec) => &spec.decs,
            Spec::Type(spec) => &spec.decs,
        }
    }

    pub fn decs_mut(&mut self) -> &mut Decorations {
        match self {
            Spec::Import(spec) => &mut spec.decs,
            Spec::Value(spec) => &mut spec.decs,
            Spec::Type(spec) => &mut spec.decs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    pub decs: Decorations,
    pub name: Option<Ident>,
    /// Unquoted import path.
    pub path: String,
}

impl ImportSpec {
    pub fn new(name: Option<&str>, path: impl Into<String>) -> Self {
        Self {
            decs: Decorations::default(),
            name: name.map(Ident::new),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub decs: Decorations,
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub decs: Decorations,
    pub name: Ident,
    pub type_params: Option<FieldList>,
    /// `type A = B` alias form.
    pub assign: bool,
    pub ty: Expr,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldList {
    pub list: Vec<Field>,
    /// Comments after the last field, before the closing token.
    pub trailing: Vec<String>,
}

impl FieldList {
    pub fn new(list: Vec<Field>) -> Self {
        Self {
            list,
            trailing: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Number of entries once name groups (`a, b int`) are flattened.
    pub fn num_fields(&self) -> usize {
        self.list.iter().map(|field| field.names.len().max(1)).sum()
    }

    /// Flattened `(name, type)` entries; unnamed fields yield `None`.
    pub fn entries(&self) -> Vec<(Option<&Ident>, &Expr)> {
        let mut entries = Vec::new();
        for field in &self.list {
            if field.names.is_empty() {
                entries.push((None, &field.ty));
            } else {
                for name in &field.names {
                    entries.push((Some(name), &field.ty));
                }
            }
        }
        entries
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub decs: Decorations,
    pub names: Vec<Ident>,
    pub ty: Expr,
    /// Raw tag literal including its quotes.
    pub tag: Option<String>,
}

impl Field {
    pub fn new(names: Vec<Ident>, ty: Expr) -> Self {
        Self {
            decs: Decorations::default(),
            names,
            ty,
            tag: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FuncType {
    pub type_params: Option<FieldList>,
    pub params: FieldList,
    pub results: FieldList,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockStmt {
    pub list: Vec<Stmt>,
    /// Comments after the last statement, before the closing brace.
    pub trailing: Vec<String>,
}

impl BlockStmt {
    pub fn new(list: Vec<Stmt>) -> Self {
        Self {
            list,
            trailing: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub decs: Decorations,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            decs: Decorations::default(),
            kind,
        }
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Define,
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Define => ":=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Quo => "/=",
            AssignOp::Rem => "%=",
            AssignOp::And => "&=",
            AssignOp::Or => "|=",
            AssignOp::Xor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
            AssignOp::AndNot => "&^=",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "=" => AssignOp::Assign,
            ":=" => AssignOp::Define,
            "+=" => AssignOp::Add,
            "-=" => AssignOp::Sub,
            "*=" => AssignOp::Mul,
            "/=" => AssignOp::Quo,
            "%=" => AssignOp::Rem,
            "&=" => AssignOp::And,
            "|=" => AssignOp::Or,
            "^=" => AssignOp::Xor,
            "<<=" => AssignOp::Shl,
            ">>=" => AssignOp::Shr,
            "&^=" => AssignOp::AndNot,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub lhs: Vec<Expr>,
    pub tok: AssignOp,
    pub rhs: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchToken {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

impl BranchToken {
    pub fn as_str(self) -> &'static str {
        match self {
            BranchToken::Break => "break",
            BranchToken::Continue => "continue",
            BranchToken::Goto => "goto",
            BranchToken::Fallthrough => "fallthrough",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub body: BlockStmt,
    /// Either a block statement or another `if` statement.
    pub els: Option<Box<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    pub decs: Decorations,
    /// Empty for the `default` clause.
    pub list: Vec<Expr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub init: Option<Box<Stmt>>,
    pub tag: Option<Expr>,
    pub body: Vec<CaseClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSwitchStmt {
    pub init: Option<Box<Stmt>>,
    pub binding: Option<Ident>,
    pub x: Expr,
    pub body: Vec<CaseClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommClause {
    pub decs: Decorations,
    /// `None` for the `default` clause.
    pub comm: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub post: Option<Box<Stmt>>,
    pub body: BlockStmt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeStmt {
    pub key: Option<Expr>,
    pub value: Option<Expr>,
    /// `=` or `:=`, absent for `for range x`.
    pub tok: Option<AssignOp>,
    pub x: Expr,
    pub body: BlockStmt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Decl(GenDecl),
    Empty,
    Labeled { label: Ident, stmt: Box<Stmt> },
    Expr(Expr),
    Send { chan: Expr, value: Expr },
    IncDec { x: Expr, inc: bool },
    Assign(AssignStmt),
    Go(Expr),
    Defer(Expr),
    Return(Vec<Expr>),
    Branch { tok: BranchToken, label: Option<Ident> },
    Block(BlockStmt),
    If(IfStmt),
    Switch(SwitchStmt),
    TypeSwitch(TypeSwitchStmt),
    Select(Vec<CommClause>),
    For(ForStmt),
    Range(RangeStmt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Char,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicLit {
    pub kind: LitKind,
    /// Literal text as written, quotes included.
    pub value: String,
}

impl BasicLit {
    pub fn int(value: u64) -> Self {
        Self {
            kind: LitKind::Int,
            value: value.to_string(),
        }
    }

    pub fn string(value: &str) -> Self {
        Self {
            kind: LitKind::String,
            value: format!("\"{}\"", printer::escape_string(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    Xor,
    And,
    Arrow,
    Tilde,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::Xor => "^",
            UnaryOp::And => "&",
            UnaryOp::Arrow => "<-",
            UnaryOp::Tilde => "~",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "+" => UnaryOp::Plus,
            "-" => UnaryOp::Minus,
            "!" => UnaryOp::Not,
            "^" => UnaryOp::Xor,
            "&" => UnaryOp::And,
            "<-" => UnaryOp::Arrow,
            "~" => UnaryOp::Tilde,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    LOr,
    LAnd,
    Eq,
    Neq,
    Lss,
    Leq,
    Gtr,
    Geq,
    Add,
    Sub,
    Or,
    Xor,
    Mul,
    Quo,
    Rem,
    Shl,
    Shr,
    And,
    AndNot,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::LOr => "||",
            BinaryOp::LAnd => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lss => "<",
            BinaryOp::Leq => "<=",
            BinaryOp::Gtr => ">",
            BinaryOp::Geq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Quo => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&",
            BinaryOp::AndNot => "&^",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "||" => BinaryOp::LOr,
            "&&" => BinaryOp::LAnd,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Neq,
            "<" => BinaryOp::Lss,
            "<=" => BinaryOp::Leq,
            ">" => BinaryOp::Gtr,
            ">=" => BinaryOp::Geq,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "|" => BinaryOp::Or,
            "^" => BinaryOp::Xor,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Quo,
            "%" => BinaryOp::Rem,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "&" => BinaryOp::And,
            "&^" => BinaryOp::AndNot,
            _ => return None,
        })
    }

    /// Go operator precedence, 1 (lowest) through 5.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::LOr => 1,
            BinaryOp::LAnd => 2,
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Lss
            | BinaryOp::Leq
            | BinaryOp::Gtr
            | BinaryOp::Geq => 3,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Or | BinaryOp::Xor => 4,
            BinaryOp::Mul
            | BinaryOp::Quo
            | BinaryOp::Rem
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::And
            | BinaryOp::AndNot => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub fun: Box<Expr>,
    pub args: Vec<Expr>,
    /// The last argument is spread with `...`.
    pub ellipsis: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeLit {
    pub ty: Option<Box<Expr>>,
    pub elts: Vec<Expr>,
    /// Elements were laid out one per line.
    pub multiline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncLit {
    pub ty: FuncType,
    pub body: BlockStmt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(Ident),
    BasicLit(BasicLit),
    CompositeLit(CompositeLit),
    FuncLit(FuncLit),
    Paren(Box<Expr>),
    Selector {
        x: Box<Expr>,
        sel: Ident,
    },
    /// Index expression; several indices for generic instantiations.
    Index {
        x: Box<Expr>,
        indices: Vec<Expr>,
    },
    Slice {
        x: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
        slice3: bool,
    },
    /// `x.(T)`; a missing type denotes `x.(type)` in type switches.
    TypeAssert {
        x: Box<Expr>,
        ty: Option<Box<Expr>>,
    },
    Call(CallExpr),
    Star(Box<Expr>),
    Unary {
        op: UnaryOp,
        x: Box<Expr>,
    },
    Binary {
        x: Box<Expr>,
        op: BinaryOp,
        y: Box<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    /// `[len]elt`; no length is a slice type, an `Ellipsis` length is `[...]elt`.
    ArrayType {
        len: Option<Box<Expr>>,
        elt: Box<Expr>,
    },
    StructType(FieldList),
    FuncType(FuncType),
    InterfaceType(FieldList),
    MapType {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    ChanType {
        dir: ChanDir,
        value: Box<Expr>,
    },
    Ellipsis(Option<Box<Expr>>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(Ident::new(name))
    }

    pub fn qualified(path: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Ident(Ident::qualified(path, name))
    }

    pub fn selector(x: Expr, sel: impl Into<String>) -> Self {
        Expr::Selector {
            x: Box::new(x),
            sel: Ident::new(sel),
        }
    }

    pub fn call(fun: Expr, args: Vec<Expr>) -> Self {
        Expr::Call(CallExpr {
            fun: Box::new(fun),
            args,
            ellipsis: false,
        })
    }

    pub fn star(x: Expr) -> Self {
        Expr::Star(Box::new(x))
    }

    /// Strips any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        match self {
            Expr::Paren(inner) => inner.unparen(),
            other => other,
        }
    }
}

/// An owned node, as captured by templates and produced by advice.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Decl(Decl),
    Spec(Spec),
    Field(Field),
    FieldList(FieldList),
    FuncType(FuncType),
    Block(BlockStmt),
    Stmt(Stmt),
    Expr(Expr),
}

/// Borrowed view of a visitable node.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    File(&'a File),
    FuncDecl(&'a FuncDecl),
    GenDecl(&'a GenDecl),
    Spec(&'a Spec),
    Field(&'a Field),
    Block(&'a BlockStmt),
    Stmt(&'a Stmt),
    Expr(&'a Expr),
}

/// Mutable view of a visitable node.
#[derive(Debug)]
pub enum NodeMut<'a> {
    File(&'a mut File),
    FuncDecl(&'a mut FuncDecl),
    GenDecl(&'a mut GenDecl),
    Spec(&'a mut Spec),
    Field(&'a mut Field),
    Block(&'a mut BlockStmt),
    Stmt(&'a mut Stmt),
    Expr(&'a mut Expr),
}

impl<'a> NodeMut<'a> {
    pub fn reborrow(&mut self) -> NodeMut<'_> {
        match self {
            NodeMut::File(n) => NodeMut::File(n),
            NodeMut::FuncDecl(n) => NodeMut::FuncDecl(n),
            NodeMut::GenDecl(n) => NodeMut::GenDecl(n),
            NodeMut::Spec(n) => NodeMut::Spec(n),
            NodeMut::Field(n) => NodeMut::Field(n),
            NodeMut::Block(n) => NodeMut::Block(n),
            NodeMut::Stmt(n) => NodeMut::Stmt(n),
            NodeMut::Expr(n) => NodeMut::Expr(n),
        }
    }

    pub fn as_ref(&self) -> NodeRef<'_> {
        match self {
            NodeMut::File(n) => NodeRef::File(n),
            NodeMut::FuncDecl(n) => NodeRef::FuncDecl(n),
            NodeMut::GenDecl(n) => NodeRef::GenDecl(n),
            NodeMut::Spec(n) => NodeRef::Spec(n),
            NodeMut::Field(n) => NodeRef::Field(n),
            NodeMut::Block(n) => NodeRef::Block(n),
            NodeMut::Stmt(n) => NodeRef::Stmt(n),
            NodeMut::Expr(n) => NodeRef::Expr(n),
        }
    }

    pub fn decs_mut(&mut self) -> Option<&mut Decorations> {
        match self {
            NodeMut::File(n) => Some(&mut n.decs),
            NodeMut::FuncDecl(n) => Some(&mut n.decs),
            NodeMut::GenDecl(n) => Some(&mut n.decs),
            NodeMut::Spec(n) => Some(n.decs_mut()),
            NodeMut::Field(n) => Some(&mut n.decs),
            NodeMut::Stmt(n) => Some(&mut n.decs),
            NodeMut::Block(_) | NodeMut::Expr(_) => None,
        }
    }
}

impl<'a> NodeRef<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::File(_) => NodeKind::File,
            NodeRef::FuncDecl(_) => NodeKind::FuncDecl,
            NodeRef::GenDecl(_) => NodeKind::GenDecl,
            NodeRef::Spec(Spec::Import(_)) => NodeKind::ImportSpec,
            NodeRef::Spec(Spec::Value(_)) => NodeKind::ValueSpec,
            NodeRef::Spec(Spec::Type(_)) => NodeKind::TypeSpec,
            NodeRef::Field(_) => NodeKind::Field,
            NodeRef::Block(_) => NodeKind::Block,
            NodeRef::Stmt(stmt) => NodeKind::of_stmt(&stmt.kind),
            NodeRef::Expr(expr) => NodeKind::of_expr(expr),
        }
    }

    pub fn decs(&self) -> Option<&'a Decorations> {
        match *self {
            NodeRef::File(n) => Some(&n.decs),
            NodeRef::FuncDecl(n) => Some(&n.decs),
            NodeRef::GenDecl(n) => Some(&n.decs),
            NodeRef::Spec(n) => Some(n.decs()),
            NodeRef::Field(n) => Some(&n.decs),
            NodeRef::Stmt(n) => Some(&n.decs),
            NodeRef::Block(_) | NodeRef::Expr(_) => None,
        }
    }

    pub fn as_expr(&self) -> Option<&'a Expr> {
        match *self {
            NodeRef::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn to_owned_node(&self) -> Option<Node> {
        Some(match *self {
            NodeRef::File(_) => return None,
            NodeRef::FuncDecl(n) => Node::Decl(Decl::Func(n.clone())),
            NodeRef::GenDecl(n) => Node::Decl(Decl::Gen(n.clone())),
            NodeRef::Spec(n) => Node::Spec(n.clone()),
            NodeRef::Field(n) => Node::Field(n.clone()),
            NodeRef::Block(n) => Node::Block(n.clone()),
            NodeRef::Stmt(n) => Node::Stmt(n.clone()),
            NodeRef::Expr(n) => Node::Expr(n.clone()),
        })
    }
}

/// Fine-grained node classification used by matchers and directive forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    FuncDecl,
    GenDecl,
    ImportSpec,
    ValueSpec,
    TypeSpec,
    Field,
    Block,
    CaseClause,
    CommClause,
    DeclStmt,
    EmptyStmt,
    LabeledStmt,
    ExprStmt,
    SendStmt,
    IncDecStmt,
    AssignStmt,
    GoStmt,
    DeferStmt,
    ReturnStmt,
    BranchStmt,
    IfStmt,
    SwitchStmt,
    TypeSwitchStmt,
    SelectStmt,
    ForStmt,
    RangeStmt,
    Ident,
    BasicLit,
    CompositeLit,
    FuncLit,
    ParenExpr,
    SelectorExpr,
    IndexExpr,
    SliceExpr,
    TypeAssertExpr,
    CallExpr,
    StarExpr,
    UnaryExpr,
    BinaryExpr,
    KeyValueExpr,
    ArrayType,
    StructType,
    FuncType,
    InterfaceType,
    MapType,
    ChanType,
    Ellipsis,
}

impl NodeKind {
    pub fn of_stmt(kind: &StmtKind) -> Self {
        match kind {
            StmtKind::Decl(_) => NodeKind::DeclStmt,
            StmtKind::Empty => NodeKind::EmptyStmt,
            StmtKind::Labeled { .. } => NodeKind::LabeledStmt,
            StmtKind::Expr(_) => NodeKind::ExprStmt,
            StmtKind::Send { .. } => NodeKind::SendStmt,
            StmtKind::IncDec { .. } => NodeKind::IncDecStmt,
            StmtKind::Assign(_) => NodeKind::AssignStmt,
            StmtKind::Go(_) => NodeKind::GoStmt,
            StmtKind::Defer(_) => NodeKind::DeferStmt,
            StmtKind::Return(_) => NodeKind::ReturnStmt,
            StmtKind::Branch { .. } => NodeKind::BranchStmt,
            StmtKind::Block(_) => NodeKind::Block,
            StmtKind::If(_) => NodeKind::IfStmt,
            StmtKind::Switch(_) => NodeKind::SwitchStmt,
            StmtKind::TypeSwitch(_) => NodeKind::TypeSwitchStmt,
            StmtKind::Select(_) => NodeKind::SelectStmt,
            StmtKind::For(_) => NodeKind::ForStmt,
            StmtKind::Range(_) => NodeKind::RangeStmt,
        }
    }

    pub fn of_expr(expr: &Expr) -> Self {
        match expr {
            Expr::Ident(_) => NodeKind::Ident,
            Expr::BasicLit(_) => NodeKind::BasicLit,
            Expr::CompositeLit(_) => NodeKind::CompositeLit,
            Expr::FuncLit(_) => NodeKind::FuncLit,
            Expr::Paren(_) => NodeKind::ParenExpr,
            Expr::Selector { .. } => NodeKind::SelectorExpr,
            Expr::Index { .. } => NodeKind::IndexExpr,
            Expr::Slice { .. } => NodeKind::SliceExpr,
            Expr::TypeAssert { .. } => NodeKind::TypeAssertExpr,
            Expr::Call(_) => NodeKind::CallExpr,
            Expr::Star(_) => NodeKind::StarExpr,
            Expr::Unary { .. } => NodeKind::UnaryExpr,
            Expr::Binary { .. } => NodeKind::BinaryExpr,
            Expr::KeyValue { .. } => NodeKind::KeyValueExpr,
            Expr::ArrayType { .. } => NodeKind::ArrayType,
            Expr::StructType(_) => NodeKind::StructType,
            Expr::FuncType(_) => NodeKind::FuncType,
            Expr::InterfaceType(_) => NodeKind::InterfaceType,
            Expr::MapType { .. } => NodeKind::MapType,
            Expr::ChanType { .. } => NodeKind::ChanType,
            Expr::Ellipsis(_) => NodeKind::Ellipsis,
        }
    }

    pub fn is_stmt(self) -> bool {
        matches!(
            self,
            NodeKind::DeclStmt
                | NodeKind::EmptyStmt
                | NodeKind::LabeledStmt
                | NodeKind::ExprStmt
                | NodeKind::SendStmt
                | NodeKind::IncDecStmt
                | NodeKind::AssignStmt
                | NodeKind::GoStmt
                | NodeKind::DeferStmt
                | NodeKind::ReturnStmt
                | NodeKind::BranchStmt
                | NodeKind::IfStmt
                | NodeKind::SwitchStmt
                | NodeKind::TypeSwitchStmt
                | NodeKind::SelectStmt
                | NodeKind::ForStmt
                | NodeKind::RangeStmt
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
