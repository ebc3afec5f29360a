//! Functions, their bodies and calls to them.

use crate::aspect::context::{AspectContext, FunctionView};
use crate::ast::{Expr, Ident, NodeKind, NodeRef};
use crate::fingerprint::{Hashable, Hasher};
use crate::typed::Type;

use super::{FileMayMatchContext, MatchType, PackageMayMatchContext, Point, TypeResolver};

/// A call to the package-level function `path.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub import_path: String,
    pub name: String,
}

impl FunctionCall {
    pub fn new(import_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            import_path: import_path.into(),
            name: name.into(),
        }
    }

    /// Whether `fun` refers to the function, as seen from `import_path`.
    pub fn is_target(&self, fun: &Expr, import_path: &str) -> bool {
        match fun.unparen() {
            Expr::Ident(ident) if ident.name == self.name => match &ident.path {
                Some(path) => *path == self.import_path,
                None => import_path == self.import_path,
            },
            _ => false,
        }
    }
}

impl Point for FunctionCall {
    fn implies_imported(&self) -> Vec<String> {
        vec![self.import_path.clone()]
    }

    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        MatchType::unless_never(
            ctx.import_path == self.import_path || ctx.imports(&self.import_path),
        )
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        MatchType::unless_never(ctx.contains(&self.name))
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        match ctx.node() {
            Some(NodeRef::Expr(Expr::Call(call))) => self.is_target(&call.fun, ctx.import_path()),
            _ => false,
        }
    }
}

impl Hashable for FunctionCall {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("function-call", &[&self.import_path, &self.name]);
    }
}

/// A constraint on a function declaration or literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionOption {
    Name(String),
    /// Exact argument and result types, in order.
    Signature { args: Vec<Type>, returns: Vec<Type> },
    /// Any of the argument types among the arguments, or any of the result
    /// types among the results.
    SignatureContains { args: Vec<Type>, returns: Vec<Type> },
    Receiver(Type),
    /// Some result implements the interface.
    ResultImplements(Type),
    /// The last result implements the interface.
    FinalResultImplements(Type),
}

/// What a function option is evaluated against.
struct FunctionInformation<'a> {
    view: FunctionView<'a>,
    import_path: &'a str,
    resolver: &'a dyn TypeResolver,
}

impl FunctionInformation<'_> {
    fn implements(&self, expr: &Expr, iface: &Type) -> bool {
        iface.matches_in_package(expr, self.import_path)
            || self.resolver.implements(expr, iface, self.import_path) == Some(true)
    }
}

fn positional(types: &[Type], entries: &[(Option<&Ident>, &Expr)], import_path: &str) -> bool {
    types.len() == entries.len()
        && types
            .iter()
            .zip(entries)
            .all(|(ty, (_, expr))| ty.matches_in_package(expr, import_path))
}

fn contains_any(types: &[Type], entries: &[(Option<&Ident>, &Expr)], import_path: &str) -> bool {
    types.iter().any(|ty| {
        entries
            .iter()
            .any(|(_, expr)| ty.matches_in_package(expr, import_path))
    })
}

impl FunctionOption {
    fn evaluate(&self, info: &FunctionInformation<'_>) -> bool {
        match self {
            FunctionOption::Name(name) => info.view.name.is_some_and(|ident| ident.name == *name),
            FunctionOption::Signature { args, returns } => {
                positional(args, &info.view.arguments(), info.import_path)
                    && positional(returns, &info.view.results(), info.import_path)
            }
            FunctionOption::SignatureContains { args, returns } => {
                if args.is_empty() && returns.is_empty() {
                    return true;
                }
                contains_any(args, &info.view.arguments(), info.import_path)
                    || contains_any(returns, &info.view.results(), info.import_path)
            }
            FunctionOption::Receiver(ty) => info
                .view
                .receiver_type()
                .is_some_and(|recv| ty.matches_in_package(recv, info.import_path)),
            FunctionOption::ResultImplements(iface) => info
                .view
                .results()
                .iter()
                .any(|(_, expr)| info.implements(expr, iface)),
            FunctionOption::FinalResultImplements(iface) => info
                .view
                .results()
                .last()
                .is_some_and(|(_, expr)| info.implements(expr, iface)),
        }
    }

    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        match self {
            // Methods can only be declared in the package of their receiver.
            FunctionOption::Receiver(ty) => match ty.base_named().and_then(|n| n.import_path.as_deref()) {
                Some(path) => MatchType::unless_never(path == ctx.import_path),
                None => MatchType::Unknown,
            },
            _ => MatchType::Unknown,
        }
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        match self {
            FunctionOption::Name(name) => MatchType::unless_never(ctx.contains(name)),
            FunctionOption::Receiver(ty) => match ty.base_named() {
                Some(named) => MatchType::unless_never(ctx.contains(&named.name)),
                None => MatchType::Unknown,
            },
            _ => MatchType::Unknown,
        }
    }
}

impl Hashable for FunctionOption {
    fn hash_into(&self, hasher: &mut Hasher) {
        match self {
            FunctionOption::Name(name) => hasher.named("name", &[name]),
            FunctionOption::Signature { args, returns } => {
                hasher.named("signature", &[args, returns])
            }
            FunctionOption::SignatureContains { args, returns } => {
                hasher.named("signature-contains", &[args, returns])
            }
            FunctionOption::Receiver(ty) => hasher.named("receiver", &[ty]),
            FunctionOption::ResultImplements(ty) => hasher.named("result-implements", &[ty]),
            FunctionOption::FinalResultImplements(ty) => {
                hasher.named("final-result-implements", &[ty])
            }
        }
    }
}

/// A function declaration or literal satisfying every option.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Function(pub Vec<FunctionOption>);

impl Function {
    pub fn new(options: Vec<FunctionOption>) -> Self {
        Self(options)
    }

    /// Evaluates the options against the signature the context carries,
    /// which may come from an ancestor frame.
    pub(crate) fn matches_view(&self, ctx: &AspectContext<'_>) -> bool {
        let Some(view) = ctx.function() else {
            return false;
        };
        let info = FunctionInformation {
            view,
            import_path: ctx.import_path(),
            resolver: ctx.resolver(),
        };
        self.0.iter().all(|option| option.evaluate(&info))
    }
}

impl Point for Function {
    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        self.0
            .iter()
            .fold(MatchType::Unknown, |acc, option| acc.and(option.package_may_match(ctx)))
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        let mut result = MatchType::unless_never(ctx.contains("func"));
        for option in &self.0 {
            result = result.and(option.file_may_match(ctx));
        }
        result
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        self.matches_view(ctx)
    }
}

impl Hashable for Function {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("function", &[&self.0]);
    }
}

/// The body of a function matching the inner join point.
#[derive(Debug)]
pub struct FunctionBody(pub Box<dyn Point>);

impl Point for FunctionBody {
    fn implies_imported(&self) -> Vec<String> {
        self.0.implies_imported()
    }

    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        self.0.package_may_match(ctx)
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        self.0.file_may_match(ctx)
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        if ctx.kind() != NodeKind::Block || ctx.field() != "Body" {
            return false;
        }
        match ctx.parent() {
            Some(parent) if parent.function().is_some() => self.0.matches(&parent),
            _ => false,
        }
    }
}

impl Hashable for FunctionBody {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("function-body", &[&self.0]);
    }
}
