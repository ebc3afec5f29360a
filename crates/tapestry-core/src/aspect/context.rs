/*!
# Node chains and contexts

While the injector walks a file, every node visited is described by a
[`NodeChain`]: a link living on the walker's stack that records the node, the
field and index it occupies in its parent, and a link to the parent's chain.
Ancestors are only present as a [`Frame`], a projection of the parts of the
node that stay readable while one of its children is being rewritten
(decorations, tokens, the enclosing function's signature, the type of a
composite literal). The borrow checker guarantees chains never outlive the
visit of their node.

Join points see an [`AspectContext`]; advice gets an [`AdviceContext`], which
adds a mutable handle on the node and the per-file [`FileState`].
*/

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use tracing::trace;

use crate::ast::*;
use crate::aspect::join::{find_directive, TypeResolver};
use crate::aspect::advice::AdviceError;
use crate::parser::{guess_package_name, GoParser, ParseError};
use crate::InjectorConfig;

/// The signature of a function declaration or literal.
#[derive(Debug, Clone, Copy)]
pub struct FunctionView<'a> {
    /// `None` for function literals.
    pub name: Option<&'a Ident>,
    pub receiver: Option<&'a FieldList>,
    pub ty: &'a FuncType,
}

impl<'a> FunctionView<'a> {
    pub fn of(node: NodeRef<'a>) -> Option<Self> {
        match node {
            NodeRef::FuncDecl(func) => Some(Self {
                name: Some(&func.name),
                receiver: func.recv.as_ref(),
                ty: &func.ty,
            }),
            NodeRef::Expr(Expr::FuncLit(lit)) => Some(Self {
                name: None,
                receiver: None,
                ty: &lit.ty,
            }),
            _ => None,
        }
    }

    pub fn arguments(&self) -> Vec<(Option<&'a Ident>, &'a Expr)> {
        self.ty.params.entries()
    }

    pub fn results(&self) -> Vec<(Option<&'a Ident>, &'a Expr)> {
        self.ty.results.entries()
    }

    pub fn receiver_type(&self) -> Option<&'a Expr> {
        self.receiver
            .and_then(|recv| recv.list.first())
            .map(|field| &field.ty)
    }

    pub fn receiver_name(&self) -> Option<&'a Ident> {
        self.receiver
            .and_then(|recv| recv.list.first())
            .and_then(|field| field.names.first())
    }
}

/// What remains readable of a node while its children are visited.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub kind: NodeKind,
    pub decs: Option<&'a Decorations>,
    /// Assignment, declaration, increment or operator token.
    pub token: Option<&'static str>,
    /// Number of specs of a declaration.
    pub arity: Option<usize>,
    /// Type of a composite literal.
    pub composite_type: Option<&'a Expr>,
    /// Signature of a function declaration or literal.
    pub function: Option<FunctionView<'a>>,
}

impl<'a> Frame<'a> {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            decs: None,
            token: None,
            arity: None,
            composite_type: None,
            function: None,
        }
    }

    pub fn with_decs(mut self, decs: &'a Decorations) -> Self {
        self.decs = Some(decs);
        self
    }

    pub fn of(node: NodeRef<'a>) -> Self {
        let mut frame = Self::new(node.kind());
        frame.decs = node.decs();
        frame.function = FunctionView::of(node);
        match node {
            NodeRef::GenDecl(gen) => {
                frame.token = Some(gen.tok.as_str());
                frame.arity = Some(gen.specs.len());
            }
            NodeRef::Stmt(stmt) => frame.token = stmt_token(&stmt.kind),
            NodeRef::Expr(expr) => {
                frame.token = expr_token(expr);
                if let Expr::CompositeLit(lit) = expr {
                    frame.composite_type = lit.ty.as_deref();
                }
            }
            _ => {}
        }
        frame
    }
}

pub(crate) fn stmt_token(kind: &StmtKind) -> Option<&'static str> {
    match kind {
        StmtKind::Assign(assign) => Some(assign.tok.as_str()),
        StmtKind::Range(range) => range.tok.map(AssignOp::as_str),
        StmtKind::IncDec { inc, .. } => Some(if *inc { "++" } else { "--" }),
        StmtKind::Decl(gen) => Some(gen.tok.as_str()),
        _ => None,
    }
}

pub(crate) fn expr_token(expr: &Expr) -> Option<&'static str> {
    match expr {
        Expr::Unary { op, .. } => Some(op.as_str()),
        Expr::Binary { op, .. } => Some(op.as_str()),
        _ => None,
    }
}

/// A visited node and its ancestry.
#[derive(Debug)]
pub struct NodeChain<'a> {
    parent: Option<&'a NodeChain<'a>>,
    frame: Frame<'a>,
    node: Option<NodeRef<'a>>,
    field: &'static str,
    index: Option<usize>,
}

impl<'a> NodeChain<'a> {
    /// A link for an ancestor being walked through.
    pub fn new(
        parent: Option<&'a NodeChain<'a>>,
        frame: Frame<'a>,
        field: &'static str,
        index: Option<usize>,
    ) -> Self {
        Self {
            parent,
            frame,
            node: None,
            field,
            index,
        }
    }

    /// A link for a fully readable node.
    pub fn of(
        parent: Option<&'a NodeChain<'a>>,
        node: NodeRef<'a>,
        field: &'static str,
        index: Option<usize>,
    ) -> Self {
        Self {
            parent,
            frame: Frame::of(node),
            node: Some(node),
            field,
            index,
        }
    }

    pub fn node(&self) -> Option<NodeRef<'a>> {
        self.node
    }

    pub fn frame(&self) -> &Frame<'a> {
        &self.frame
    }

    pub fn kind(&self) -> NodeKind {
        self.frame.kind
    }

    /// Name of the field of the parent holding this node, Go style (`Body`, `Rhs`).
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn parent(&self) -> Option<&'a NodeChain<'a>> {
        self.parent
    }

    pub fn ancestors(&self) -> impl Iterator<Item = &'a NodeChain<'a>> {
        std::iter::successors(self.parent, |chain| chain.parent)
    }
}

/// Ambient facts about the file being woven.
pub struct FileContext<'a> {
    pub config: &'a InjectorConfig,
    pub package_name: String,
    pub file_name: String,
    pub resolver: &'a dyn TypeResolver,
}

impl fmt::Debug for FileContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileContext")
            .field("import_path", &self.config.import_path)
            .field("package_name", &self.package_name)
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a node for join points.
#[derive(Debug, Clone, Copy)]
pub struct AspectContext<'a> {
    chain: &'a NodeChain<'a>,
    file: &'a FileContext<'a>,
}

impl<'a> AspectContext<'a> {
    pub fn new(chain: &'a NodeChain<'a>, file: &'a FileContext<'a>) -> Self {
        Self { chain, file }
    }

    pub fn chain(&self) -> &'a NodeChain<'a> {
        self.chain
    }

    /// The node itself; `None` for ancestors seen through their frame.
    pub fn node(&self) -> Option<NodeRef<'a>> {
        self.chain.node
    }

    pub fn kind(&self) -> NodeKind {
        self.chain.kind()
    }

    pub fn field(&self) -> &'static str {
        self.chain.field
    }

    pub fn index(&self) -> Option<usize> {
        self.chain.index
    }

    pub fn decs(&self) -> Option<&'a Decorations> {
        self.chain.frame.decs
    }

    pub fn token(&self) -> Option<&'static str> {
        self.chain.frame.token
    }

    pub fn arity(&self) -> Option<usize> {
        self.chain.frame.arity
    }

    pub fn composite_type(&self) -> Option<&'a Expr> {
        self.chain.frame.composite_type
    }

    /// Signature of the node, when it is a function declaration or literal.
    pub fn function(&self) -> Option<FunctionView<'a>> {
        self.chain.frame.function
    }

    /// Signature of the closest function: the node itself or an ancestor.
    pub fn enclosing_function(&self) -> Option<FunctionView<'a>> {
        self.function()
            .or_else(|| self.chain.ancestors().find_map(|chain| chain.frame.function))
    }

    pub fn parent(&self) -> Option<AspectContext<'a>> {
        self.chain.parent.map(|chain| AspectContext {
            chain,
            file: self.file,
        })
    }

    /// Evaluates `f` against a synthesized context for a child of this node.
    pub fn with_child<R>(
        &self,
        node: NodeRef<'a>,
        field: &'static str,
        index: Option<usize>,
        f: impl FnOnce(AspectContext<'_>) -> R,
    ) -> R {
        let chain = NodeChain::of(Some(self.chain), node, field, index);
        f(AspectContext {
            chain: &chain,
            file: self.file,
        })
    }

    pub fn file(&self) -> &'a FileContext<'a> {
        self.file
    }

    pub fn import_path(&self) -> &'a str {
        &self.file.config.import_path
    }

    pub fn package_name(&self) -> &'a str {
        &self.file.package_name
    }

    pub fn module_path(&self) -> &'a str {
        &self.file.config.module_path
    }

    pub fn test_main(&self) -> bool {
        self.file.config.test_main
    }

    pub fn config(&self, key: &str) -> Option<&'a str> {
        self.file.config.configuration.get(key).map(String::as_str)
    }

    pub fn resolver(&self) -> &'a dyn TypeResolver {
        self.file.resolver
    }
}

/// A Go language level, `go1.N` or `go1.N.M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GoLangVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid Go language version {0:?}, expected go1.N or go1.N.M")]
pub struct InvalidGoLangVersion(pub String);

impl GoLangVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            patch: None,
        }
    }
}

impl FromStr for GoLangVersion {
    type Err = InvalidGoLangVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidGoLangVersion(s.to_string());
        let digits = s.strip_prefix("go").unwrap_or(s);
        let mut parts = digits.split('.');
        let mut number = || -> Result<Option<u32>, InvalidGoLangVersion> {
            match parts.next() {
                None => Ok(None),
                Some(part) if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) => {
                    part.parse().map(Some).map_err(|_| invalid())
                }
                Some(_) => Err(invalid()),
            }
        };
        let major = number()?.ok_or_else(invalid)?;
        let minor = number()?.ok_or_else(invalid)?;
        let patch = number()?;
        if number()?.is_some() {
            return Err(invalid());
        }
        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for GoLangVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "go{}.{}", self.major, self.minor)?;
        if let Some(patch) = self.patch {
            write!(f, ".{patch}")?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for GoLangVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Parameter names requested from a function while its body is rewritten.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FunctionEdits {
    pub receiver: bool,
    pub arguments: BTreeSet<usize>,
    pub results: BTreeSet<usize>,
}

impl FunctionEdits {
    pub fn is_empty(&self) -> bool {
        !self.receiver && self.arguments.is_empty() && self.results.is_empty()
    }

    /// Names the requested entries. Go requires a parameter list to be
    /// either fully named or fully unnamed, so naming one unnamed entry names
    /// all of them.
    pub fn apply(&self, recv: Option<&mut FieldList>, ty: &mut FuncType) {
        if self.receiver {
            if let Some(field) = recv.and_then(|recv| recv.list.first_mut()) {
                match field.names.first_mut() {
                    Some(name) if name.is_blank() => *name = Ident::new("__receiver"),
                    Some(_) => {}
                    None => field.names.push(Ident::new("__receiver")),
                }
            }
        }
        name_entries(&mut ty.params, &self.arguments, "__argument", |_| "_".to_string());
        name_entries(&mut ty.results, &self.results, "__returns", |i| format!("__returns_{i}"));
    }
}

fn name_entries(
    list: &mut FieldList,
    wanted: &BTreeSet<usize>,
    prefix: &str,
    filler: impl Fn(usize) -> String,
) {
    if wanted.is_empty() {
        return;
    }
    if list.list.iter().all(|field| field.names.is_empty()) {
        for (i, field) in list.list.iter_mut().enumerate() {
            let name = if wanted.contains(&i) {
                format!("{prefix}_{i}")
            } else {
                filler(i)
            };
            field.names = vec![Ident::new(name)];
        }
        return;
    }
    let mut position = 0;
    for field in &mut list.list {
        for name in &mut field.names {
            if wanted.contains(&position) && name.is_blank() {
                *name = Ident::new(format!("{prefix}_{position}"));
            }
            position += 1;
        }
    }
}

/// Local name generated code imports `path` under, chosen so it can't
/// collide with identifiers of the woven file.
pub fn reference_alias(path: &str) -> String {
    format!("__tapestry_{}", guess_package_name(path))
}

/// Per-file accumulators shared by all advice applied to one file.
pub struct FileState {
    /// Import path to the alias it must be imported under; `_` for blank imports.
    references: BTreeMap<String, String>,
    links: BTreeSet<String>,
    go_lang: Option<GoLangVersion>,
    declarations: Vec<Decl>,
    declared: HashSet<String>,
    scopes: Vec<FunctionEdits>,
    parser: GoParser,
}

impl FileState {
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            references: BTreeMap::new(),
            links: BTreeSet::new(),
            go_lang: None,
            declarations: Vec::new(),
            declared: HashSet::new(),
            scopes: Vec::new(),
            parser: GoParser::new()?,
        })
    }

    /// Records that the file must import `path` as `alias`. A named import
    /// supersedes a blank one. Returns whether anything changed.
    pub fn add_import(&mut self, path: &str, alias: &str) -> bool {
        match self.references.get(path) {
            Some(existing) if existing == "_" && alias != "_" => {}
            Some(_) => return false,
            None => {}
        }
        trace!(path, alias, "registered import");
        self.references.insert(path.to_string(), alias.to_string());
        true
    }

    /// Records that generated code references `path`, under the alias
    /// [`reference_alias`] gives it unless the file already imports it.
    pub fn add_reference(&mut self, path: &str) -> bool {
        self.add_import(path, &reference_alias(path))
    }

    /// Records a link-time dependency.
    pub fn add_link(&mut self, path: &str) -> bool {
        self.links.insert(path.to_string())
    }

    /// Raises the minimum Go language level required by the file.
    pub fn ensure_min_go_lang(&mut self, version: GoLangVersion) {
        if self.go_lang.map_or(true, |current| current < version) {
            self.go_lang = Some(version);
        }
    }

    /// Queues top-level declarations; identical declarations are only
    /// added once per file. Returns whether anything was queued.
    pub fn add_declarations(&mut self, decls: Vec<Decl>) -> bool {
        let mut added = false;
        for decl in decls {
            if self.declared.insert(decl.to_source()) {
                self.declarations.push(decl);
                added = true;
            }
        }
        added
    }

    pub fn parser(&mut self) -> &mut GoParser {
        &mut self.parser
    }

    pub fn references(&self) -> &BTreeMap<String, String> {
        &self.references
    }

    pub fn links(&self) -> &BTreeSet<String> {
        &self.links
    }

    pub fn go_lang(&self) -> Option<GoLangVersion> {
        self.go_lang
    }

    pub(crate) fn take_declarations(&mut self) -> Vec<Decl> {
        std::mem::take(&mut self.declarations)
    }

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(FunctionEdits::default());
    }

    pub(crate) fn pop_scope(&mut self) -> FunctionEdits {
        self.scopes.pop().unwrap_or_default()
    }

    fn scope(&mut self) -> Option<&mut FunctionEdits> {
        self.scopes.last_mut()
    }
}

impl fmt::Debug for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileState")
            .field("references", &self.references)
            .field("links", &self.links)
            .field("go_lang", &self.go_lang)
            .field("declarations", &self.declarations.len())
            .finish_non_exhaustive()
    }
}

/// Mutable view of a matched node for advice.
pub struct AdviceContext<'a> {
    node: NodeMut<'a>,
    parent: Option<&'a NodeChain<'a>>,
    field: &'static str,
    index: Option<usize>,
    file: &'a FileContext<'a>,
    state: &'a mut FileState,
    prepended: usize,
}

impl<'a> AdviceContext<'a> {
    pub fn new(
        node: NodeMut<'a>,
        parent: Option<&'a NodeChain<'a>>,
        field: &'static str,
        index: Option<usize>,
        file: &'a FileContext<'a>,
        state: &'a mut FileState,
    ) -> Self {
        Self {
            node,
            parent,
            field,
            index,
            file,
            state,
            prepended: 0,
        }
    }

    pub fn node(&self) -> NodeRef<'_> {
        self.node.as_ref()
    }

    pub fn node_mut(&mut self) -> NodeMut<'_> {
        self.node.reborrow()
    }

    pub fn kind(&self) -> NodeKind {
        self.node.as_ref().kind()
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Replaces the node in its parent. Only statement and expression slots
    /// can be replaced, and only by a node of the same category.
    pub fn replace_node(&mut self, replacement: Node) -> Result<(), AdviceError> {
        let kind = self.kind();
        match (&mut self.node, replacement) {
            (NodeMut::Stmt(slot), Node::Stmt(stmt)) => **slot = stmt,
            (NodeMut::Stmt(slot), Node::Block(block)) => {
                **slot = Stmt::new(StmtKind::Block(block));
            }
            (NodeMut::Expr(slot), Node::Expr(expr)) => **slot = expr,
            (NodeMut::Stmt(_) | NodeMut::Expr(_), other) => {
                return Err(AdviceError::Mismatch {
                    expected: kind.to_string(),
                    found: node_category(&other).to_string(),
                });
            }
            _ => return Err(AdviceError::NotReplaceable { kind }),
        }
        Ok(())
    }

    pub fn parent(&self) -> Option<AspectContext<'_>> {
        self.parent.map(|chain| AspectContext::new(chain, self.file))
    }

    pub fn ancestors(&self) -> impl Iterator<Item = &'a NodeChain<'a>> {
        std::iter::successors(self.parent, |chain| chain.parent())
    }

    /// Signature of the closest function: the node itself or an ancestor.
    pub fn function(&self) -> Option<FunctionView<'_>> {
        FunctionView::of(self.node.as_ref())
            .or_else(|| self.ancestors().find_map(|chain| chain.frame().function))
    }

    /// Arguments of the closest directive named `name`, searching the node
    /// and then its ancestors.
    pub fn directive(&self, name: &str) -> Option<String> {
        if let Some(args) = self.node.as_ref().decs().and_then(|decs| find_directive(decs, name)) {
            return Some(args.to_string());
        }
        self.ancestors()
            .filter_map(|chain| chain.frame().decs)
            .find_map(|decs| find_directive(decs, name))
            .map(str::to_string)
    }

    /// Name of argument `index` of the closest function, naming it if it is
    /// unnamed or blank. The rename is applied once the function's body has
    /// been walked.
    pub fn name_argument(&mut self, index: usize) -> Option<String> {
        let existing = {
            let function = self.function()?;
            let (name, _) = *function.arguments().get(index)?;
            name.filter(|name| !name.is_blank()).map(|name| name.name.clone())
        };
        if existing.is_some() {
            return existing;
        }
        self.state.scope()?.arguments.insert(index);
        Some(format!("__argument_{index}"))
    }

    /// Name of result `index` of the closest function, naming it if needed.
    pub fn name_result(&mut self, index: usize) -> Option<String> {
        let existing = {
            let function = self.function()?;
            let (name, _) = *function.results().get(index)?;
            name.filter(|name| !name.is_blank()).map(|name| name.name.clone())
        };
        if existing.is_some() {
            return existing;
        }
        self.state.scope()?.results.insert(index);
        Some(format!("__returns_{index}"))
    }

    /// Name of the receiver of the closest method, naming it if needed.
    pub fn name_receiver(&mut self) -> Option<String> {
        let existing = {
            let function = self.function()?;
            function.receiver?;
            function
                .receiver_name()
                .filter(|name| !name.is_blank())
                .map(|name| name.name.clone())
        };
        if existing.is_some() {
            return existing;
        }
        self.state.scope()?.receiver = true;
        Some("__receiver".to_string())
    }

    pub fn add_import(&mut self, path: &str, alias: &str) -> bool {
        self.state.add_import(path, alias)
    }

    pub fn add_reference(&mut self, path: &str) -> bool {
        self.state.add_reference(path)
    }

    pub fn add_link(&mut self, path: &str) -> bool {
        self.state.add_link(path)
    }

    pub fn ensure_min_go_lang(&mut self, version: GoLangVersion) {
        self.state.ensure_min_go_lang(version);
    }

    pub fn add_declarations(&mut self, decls: Vec<Decl>) -> bool {
        self.state.add_declarations(decls)
    }

    pub fn parser(&mut self) -> &mut GoParser {
        self.state.parser()
    }

    pub fn file(&self) -> &'a FileContext<'a> {
        self.file
    }

    pub fn import_path(&self) -> &'a str {
        &self.file.config.import_path
    }

    pub fn package_name(&self) -> &'a str {
        &self.file.package_name
    }

    pub fn config(&self, key: &str) -> Option<&'a str> {
        self.file.config.configuration.get(key).map(String::as_str)
    }

    pub fn resolver(&self) -> &'a dyn TypeResolver {
        self.file.resolver
    }

    /// Reserves `count` positions at the front of the node's block; advice
    /// applied later at the same node inserts after earlier advice.
    pub(crate) fn reserve_prepend(&mut self, count: usize) -> usize {
        let at = self.prepended;
        self.prepended += count;
        at
    }
}

fn node_category(node: &Node) -> &'static str {
    match node {
        Node::Decl(_) => "declaration",
        Node::Spec(_) => "spec",
        Node::Field(_) => "field",
        Node::FieldList(_) => "field list",
        Node::FuncType(_) => "function type",
        Node::Block(_) => "block",
        Node::Stmt(_) => "statement",
        Node::Expr(_) => "expression",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_lang_version_parsing_and_order() {
        let v118: GoLangVersion = "go1.18".parse().unwrap();
        let v121: GoLangVersion = "go1.21.3".parse().unwrap();
        assert_eq!(v118, GoLangVersion::new(1, 18));
        assert_eq!(v121.to_string(), "go1.21.3");
        assert!(v118 < v121);
        assert_eq!("1.20".parse::<GoLangVersion>().unwrap().to_string(), "go1.20");
        for bad in ["", "go", "go1", "go1.x", "go1.2.3.4", "go1..2"] {
            assert!(bad.parse::<GoLangVersion>().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_file_state_keeps_highest_go_lang() {
        let mut state = FileState::new().unwrap();
        state.ensure_min_go_lang(GoLangVersion::new(1, 21));
        state.ensure_min_go_lang(GoLangVersion::new(1, 18));
        assert_eq!(state.go_lang(), Some(GoLangVersion::new(1, 21)));
    }

    #[test]
    fn test_named_import_supersedes_blank() {
        let mut state = FileState::new().unwrap();
        assert!(state.add_import("unsafe", "_"));
        assert!(!state.add_import("unsafe", "_"));
        assert!(state.add_import("unsafe", "__tapestry_unsafe"));
        assert!(!state.add_import("unsafe", "_"));
        assert_eq!(state.references()["unsafe"], "__tapestry_unsafe");
    }

    #[test]
    fn test_declarations_are_deduplicated() {
        let mut state = FileState::new().unwrap();
        let decl = Decl::Gen(GenDecl::new(
            DeclToken::Var,
            vec![Spec::Value(ValueSpec {
                decs: Decorations::default(),
                names: vec![Ident::new("x")],
                ty: Some(Expr::ident("int")),
                values: Vec::new(),
            })],
        ));
        assert!(state.add_declarations(vec![decl.clone()]));
        assert!(!state.add_declarations(vec![decl]));
        assert_eq!(state.take_declarations().len(), 1);
    }

    #[test]
    fn test_naming_unnamed_parameters_names_all() {
        let mut ty = FuncType {
            type_params: None,
            params: FieldList::new(vec![
                Field::new(Vec::new(), Expr::ident("int")),
                Field::new(Vec::new(), Expr::ident("string")),
            ]),
            results: FieldList::new(vec![
                Field::new(Vec::new(), Expr::ident("int")),
                Field::new(Vec::new(), Expr::ident("error")),
            ]),
        };
        let edits = FunctionEdits {
            receiver: false,
            arguments: [1].into_iter().collect(),
            results: [1].into_iter().collect(),
        };
        edits.apply(None, &mut ty);

        let params: Vec<&str> = ty.params.entries().iter().map(|(n, _)| n.unwrap().name.as_str()).collect();
        assert_eq!(params, vec!["_", "__argument_1"]);
        let results: Vec<&str> = ty.results.entries().iter().map(|(n, _)| n.unwrap().name.as_str()).collect();
        assert_eq!(results, vec!["__returns_0", "__returns_1"]);
    }

    #[test]
    fn test_naming_blank_parameter_in_named_list() {
        let mut ty = FuncType {
            type_params: None,
            params: FieldList::new(vec![Field::new(
                vec![Ident::new("a"), Ident::new("_")],
                Expr::ident("int"),
            )]),
            results: FieldList::default(),
        };
        let edits = FunctionEdits {
            arguments: [0, 1].into_iter().collect(),
            ..Default::default()
        };
        edits.apply(None, &mut ty);
        assert_eq!(ty.params.list[0].names, vec![Ident::new("a"), Ident::new("__argument_1")]);
    }
}
