//! Directive comments: `//name key:value key:"quoted value"`.
//!
//! A directive placed on a statement also applies to the primary expression
//! of that statement, so `//dd:span` above `x := fetch()` marks both the
//! assignment and the call.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{cut, map, opt},
    multi::separated_list0,
    sequence::{delimited, preceded, terminated},
    IResult,
};

use crate::aspect::context::AspectContext;
use crate::ast::{Decorations, NodeKind};
use crate::fingerprint::{Hashable, Hasher};

use super::{FileMayMatchContext, MatchType, Point};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveArgument {
    pub key: String,
    pub value: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("unterminated quoted value in directive arguments {input:?} at offset {offset}")]
    Unterminated { input: String, offset: usize },

    #[error("malformed directive arguments {input:?} at offset {offset}")]
    Malformed { input: String, offset: usize },
}

/// Returns the arguments of the first `//name` comment among the leading
/// comments of `decs`. `//namespace` does not match `name`.
pub fn find_directive<'d>(decs: &'d Decorations, name: &str) -> Option<&'d str> {
    decs.start.iter().find_map(|line| {
        let rest = line.strip_prefix("//")?.strip_prefix(name)?;
        match rest.chars().next() {
            None => Some(""),
            Some(c) if c.is_whitespace() => Some(rest.trim()),
            Some(_) => None,
        }
    })
}

fn quoted(quote: char) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| {
        preceded(
            char(quote),
            cut(terminated(take_while(move |c| c != quote), char(quote))),
        )(input)
    }
}

fn value(input: &str) -> IResult<&str, &str> {
    alt((
        quoted('"'),
        quoted('\''),
        take_while(|c: char| !c.is_whitespace()),
    ))(input)
}

fn argument(input: &str) -> IResult<&str, DirectiveArgument> {
    let key = take_while1(|c: char| !c.is_whitespace() && c != ':');
    map(
        nom::sequence::pair(key, opt(preceded(char(':'), value))),
        |(key, value): (&str, Option<&str>)| DirectiveArgument {
            key: key.to_string(),
            value: value.unwrap_or_default().to_string(),
        },
    )(input)
}

fn arguments(input: &str) -> IResult<&str, Vec<DirectiveArgument>> {
    delimited(multispace0, separated_list0(multispace1, argument), multispace0)(input)
}

/// Parses the `key:value` arguments following a directive name. Values may
/// be wrapped in matching single or double quotes to include spaces; a key
/// without a value gets an empty one.
pub fn parse_directive_args(input: &str) -> Result<Vec<DirectiveArgument>, DirectiveError> {
    match arguments(input) {
        Ok(("", args)) => Ok(args),
        Ok((rest, _)) => Err(DirectiveError::Malformed {
            input: input.to_string(),
            offset: input.len() - rest.len(),
        }),
        Err(nom::Err::Failure(err)) => Err(DirectiveError::Unterminated {
            input: input.to_string(),
            offset: input.len() - err.input.len(),
        }),
        Err(nom::Err::Error(err)) => Err(DirectiveError::Malformed {
            input: input.to_string(),
            offset: input.len() - err.input.len(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(DirectiveError::Malformed {
            input: input.to_string(),
            offset: input.len(),
        }),
    }
}

/// Whether a directive on a node of kind `parent` applies to its child
/// stored in `field`.
fn forwards(ctx: &AspectContext<'_>, field: &str) -> bool {
    match (ctx.kind(), field) {
        (NodeKind::AssignStmt, "Rhs") => true,
        (NodeKind::AssignStmt, "Lhs") => ctx.token() == Some(":="),
        (NodeKind::CallExpr, "Fun") => true,
        (NodeKind::SendStmt, "Value") => true,
        (NodeKind::DeferStmt | NodeKind::GoStmt, "Call") => true,
        (NodeKind::ReturnStmt, "Results") => true,
        (NodeKind::ExprStmt, "X") => true,
        (NodeKind::ValueSpec, "Values") => true,
        (NodeKind::GenDecl, "Specs") => ctx.arity() == Some(1),
        (NodeKind::DeclStmt, "Decl") => true,
        _ => false,
    }
}

/// Matches nodes carrying the `//name` directive, directly or through a
/// forwarding parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive(pub String);

impl Directive {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Arguments of the directive as seen from `ctx`.
    pub fn lookup<'a>(&self, ctx: &AspectContext<'a>) -> Option<&'a str> {
        let mut current = *ctx;
        loop {
            if let Some(args) = current.decs().and_then(|decs| find_directive(decs, &self.0)) {
                return Some(args);
            }
            let parent = current.parent()?;
            if !forwards(&parent, current.field()) {
                return None;
            }
            current = parent;
        }
    }
}

impl Point for Directive {
    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        MatchType::unless_never(ctx.contains(&format!("//{}", self.0)))
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        self.lookup(ctx).is_some()
    }
}

impl Hashable for Directive {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("directive", &[&self.0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(key: &str, value: &str) -> DirectiveArgument {
        DirectiveArgument {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_parse_span_arguments() {
        let args = parse_directive_args(r#"span.name:rootHandler resource.name:"GET /""#).unwrap();
        assert_eq!(
            args,
            vec![arg("span.name", "rootHandler"), arg("resource.name", "GET /")]
        );
    }

    #[test]
    fn test_parse_single_quotes_and_bare_keys() {
        let args = parse_directive_args("  a:'x y'  flag b:  ").unwrap();
        assert_eq!(args, vec![arg("a", "x y"), arg("flag", ""), arg("b", "")]);
        assert!(parse_directive_args("").unwrap().is_empty());
    }

    #[test]
    fn test_unterminated_quote_is_an_error() {
        let err = parse_directive_args(r#"resource.name:"GET /"#).unwrap_err();
        assert!(matches!(err, DirectiveError::Unterminated { .. }), "{err}");
    }

    #[test]
    fn test_find_directive_requires_whole_name() {
        let decs = Decorations {
            start: vec![
                "// a regular comment".to_string(),
                "//dd:spanExtra foo:bar".to_string(),
                "//dd:span span.name:x".to_string(),
            ],
            ..Default::default()
        };
        assert_eq!(find_directive(&decs, "dd:span"), Some("span.name:x"));
        assert_eq!(find_directive(&decs, "dd:spanExtra"), Some("foo:bar"));
        assert_eq!(find_directive(&decs, "dd:spa"), None);

        let spaced = Decorations::with_start("// dd:span");
        assert_eq!(find_directive(&spaced, "dd:span"), None);
        let bare = Decorations::with_start("//dd:span");
        assert_eq!(find_directive(&bare, "dd:span"), Some(""));
    }
}
