// Parser module - turns Go source text into the decorated syntax tree
use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Parser as TsParser;

use crate::ast::File;

mod lower;

#[cfg(test)]
mod tests;

pub use lower::Lowerer;

/// A location the grammar could not make sense of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxProblem {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("failed to load the Go grammar: {0}")]
    Language(String),

    #[error("the Go parser produced no tree")]
    NoTree,

    #[error("syntax error at {}\n{listing}", format_problems(.problems))]
    Syntax {
        problems: Vec<SyntaxProblem>,
        /// The offending source, with line numbers.
        listing: String,
    },

    #[error("unsupported syntax `{kind}` at line {line}")]
    Unsupported { kind: String, line: usize },
}

fn format_problems(problems: &[SyntaxProblem]) -> String {
    problems
        .iter()
        .map(|p| format!("{}:{}: {}", p.line, p.column, p.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses Go source into the syntax tree used throughout the engine.
pub trait SourceParser {
    /// Parses a complete file. `aliases` maps local package names that the
    /// source uses without importing them (template import aliases) to their
    /// import paths; references through them become path-qualified.
    fn parse_file(
        &mut self,
        source: &str,
        aliases: &BTreeMap<String, String>,
    ) -> Result<File, ParseError>;

    /// Get parser name for debugging
    fn name(&self) -> &'static str;
}

/// [`SourceParser`] backed by tree-sitter's Go grammar.
pub struct GoParser {
    parser: TsParser,
}

impl GoParser {
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = TsParser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|err| ParseError::Language(err.to_string()))?;
        Ok(Self { parser })
    }
}

impl std::fmt::Debug for GoParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GoParser")
    }
}

impl SourceParser for GoParser {
    fn parse_file(
        &mut self,
        source: &str,
        aliases: &BTreeMap<String, String>,
    ) -> Result<File, ParseError> {
        let tree = self.parser.parse(source, None).ok_or(ParseError::NoTree)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(ParseError::Syntax {
                problems: lower::collect_problems(root, source),
                listing: numbered_source(source),
            });
        }
        Lowerer::new(source, aliases).file(root)
    }

    fn name(&self) -> &'static str {
        "tree-sitter-go"
    }
}

/// Convenience wrapper parsing a single file with a fresh parser.
pub fn parse_file(source: &str) -> Result<File, ParseError> {
    GoParser::new()?.parse_file(source, &BTreeMap::new())
}

/// Renders `source` with right-aligned line numbers, for error reports.
pub fn numbered_source(source: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let width = lines.len().to_string().len();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$} | {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

static MAJOR_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v[0-9]+$").unwrap());
static DOTTED_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.v[0-9]+$").unwrap());
static NON_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}_]").unwrap());

/// Best guess of the package name declared by the package at `path`.
///
/// Major version suffixes (`/v2`, `.v3`) are skipped, `go-` prefixes and
/// `-go` suffixes are dropped and anything that cannot appear in an
/// identifier becomes `_`.
pub fn guess_package_name(path: &str) -> String {
    let mut segments = path.rsplit('/');
    let mut last = segments.next().unwrap_or(path);
    if MAJOR_VERSION.is_match(last) {
        if let Some(previous) = segments.next() {
            last = previous;
        }
    }

    let unversioned = DOTTED_VERSION.replace(last, "");
    let base: &str = unversioned.as_ref();
    let base = base.strip_prefix("go-").unwrap_or(base);
    let base = base
        .strip_suffix("-go")
        .or_else(|| base.strip_suffix(".go"))
        .unwrap_or(base);

    let mut name = NON_IDENTIFIER.replace_all(base, "_").into_owned();
    if name.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}
