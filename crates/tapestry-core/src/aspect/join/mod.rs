/*!
# Join points

A join point is a predicate over a position in the syntax tree. Besides the
authoritative [`Point::matches`], every join point offers two cheap
three-valued pre-filters evaluated before any tree is walked: one over the
package (import path, imports, configuration) and one over the raw file
content. [`MatchType::Match`] means the predicate holds for every node in
scope, [`MatchType::NeverMatch`] that it holds for none, and
[`MatchType::Unknown`] defers to the walk.
*/

mod declaration;
mod directive;
mod function;
mod package;
mod resolver;
mod structs;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::aspect::context::AspectContext;
use crate::fingerprint::{Hashable, Hasher};

pub use declaration::{AssignmentOf, DeclarationOf, ValueDeclaration};
pub use directive::{
    find_directive, parse_directive_args, Directive, DirectiveArgument, DirectiveError,
};
pub use function::{Function, FunctionBody, FunctionCall, FunctionOption};
pub use package::{ImportPath, PackageFilter, PackageName, TestMain};
pub use resolver::{NoResolver, PackageTypeIndex, TypeResolver};
pub use structs::{StructDefinition, StructLiteral, StructLiteralMatch};

/// Outcome of a pre-filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Match,
    NeverMatch,
    Unknown,
}

impl MatchType {
    pub fn from_bool(value: bool) -> Self {
        if value {
            MatchType::Match
        } else {
            MatchType::NeverMatch
        }
    }

    /// `Unknown` unless the condition rules out any match.
    pub fn unless_never(possible: bool) -> Self {
        if possible {
            MatchType::Unknown
        } else {
            MatchType::NeverMatch
        }
    }

    pub fn and(self, other: MatchType) -> MatchType {
        match (self, other) {
            (MatchType::NeverMatch, _) | (_, MatchType::NeverMatch) => MatchType::NeverMatch,
            (MatchType::Match, MatchType::Match) => MatchType::Match,
            _ => MatchType::Unknown,
        }
    }

    pub fn or(self, other: MatchType) -> MatchType {
        match (self, other) {
            (MatchType::Match, _) | (_, MatchType::Match) => MatchType::Match,
            (MatchType::NeverMatch, MatchType::NeverMatch) => MatchType::NeverMatch,
            _ => MatchType::Unknown,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> MatchType {
        match self {
            MatchType::Match => MatchType::NeverMatch,
            MatchType::NeverMatch => MatchType::Match,
            MatchType::Unknown => MatchType::Unknown,
        }
    }
}

/// What is known about a package before its files are read.
#[derive(Debug, Clone, Copy)]
pub struct PackageMayMatchContext<'a> {
    pub import_path: &'a str,
    pub package_name: &'a str,
    pub module_path: &'a str,
    /// Every import path imported by any file of the package.
    pub imports: &'a BTreeSet<String>,
    pub test_main: bool,
    pub configuration: &'a BTreeMap<String, String>,
}

impl PackageMayMatchContext<'_> {
    pub fn imports(&self, path: &str) -> bool {
        self.imports.contains(path)
    }
}

/// Raw content of a file, before it is parsed.
#[derive(Debug)]
pub struct FileMayMatchContext<'a> {
    pub content: &'a str,
    pub package_name: &'a str,
    probes: HashMap<String, bool>,
}

impl<'a> FileMayMatchContext<'a> {
    pub fn new(content: &'a str, package_name: &'a str) -> Self {
        Self {
            content,
            package_name,
            probes: HashMap::new(),
        }
    }

    /// Whether the raw content contains `needle`; answers are cached.
    pub fn contains(&mut self, needle: &str) -> bool {
        if let Some(found) = self.probes.get(needle) {
            return *found;
        }
        let found = self.content.contains(needle);
        self.probes.insert(needle.to_string(), found);
        found
    }
}

/// A predicate over positions in the syntax tree.
pub trait Point: Hashable + fmt::Debug + Send + Sync {
    /// Packages any file matching this join point necessarily imports.
    fn implies_imported(&self) -> Vec<String> {
        Vec::new()
    }

    fn package_may_match(&self, _ctx: &PackageMayMatchContext<'_>) -> MatchType {
        MatchType::Unknown
    }

    fn file_may_match(&self, _ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        MatchType::Unknown
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool;
}

/// Holds when every requirement holds. Never holds without requirements.
#[derive(Debug)]
pub struct AllOf(pub Vec<Box<dyn Point>>);

impl Point for AllOf {
    fn implies_imported(&self) -> Vec<String> {
        let paths: BTreeSet<String> = self.0.iter().flat_map(|jp| jp.implies_imported()).collect();
        paths.into_iter().collect()
    }

    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        if self.0.is_empty() {
            return MatchType::NeverMatch;
        }
        self.0
            .iter()
            .fold(MatchType::Match, |acc, jp| acc.and(jp.package_may_match(ctx)))
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        if self.0.is_empty() {
            return MatchType::NeverMatch;
        }
        let mut result = MatchType::Match;
        for jp in &self.0 {
            result = result.and(jp.file_may_match(ctx));
            if result == MatchType::NeverMatch {
                break;
            }
        }
        result
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        !self.0.is_empty() && self.0.iter().all(|jp| jp.matches(ctx))
    }
}

impl Hashable for AllOf {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("all-of", &[&self.0]);
    }
}

/// Holds when any candidate holds.
#[derive(Debug)]
pub struct OneOf(pub Vec<Box<dyn Point>>);

impl Point for OneOf {
    /// Only paths implied by every candidate.
    fn implies_imported(&self) -> Vec<String> {
        let mut candidates = self.0.iter();
        let Some(first) = candidates.next() else {
            return Vec::new();
        };
        let mut common: BTreeSet<String> = first.implies_imported().into_iter().collect();
        for jp in candidates {
            let paths: BTreeSet<String> = jp.implies_imported().into_iter().collect();
            common.retain(|path| paths.contains(path));
        }
        common.into_iter().collect()
    }

    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        self.0
            .iter()
            .fold(MatchType::NeverMatch, |acc, jp| acc.or(jp.package_may_match(ctx)))
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        let mut result = MatchType::NeverMatch;
        for jp in &self.0 {
            result = result.or(jp.file_may_match(ctx));
            if result == MatchType::Match {
                break;
            }
        }
        result
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        self.0.iter().any(|jp| jp.matches(ctx))
    }
}

impl Hashable for OneOf {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("one-of", &[&self.0]);
    }
}

#[derive(Debug)]
pub struct Not(pub Box<dyn Point>);

impl Point for Not {
    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        self.0.package_may_match(ctx).not()
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        self.0.file_may_match(ctx).not()
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        !self.0.matches(ctx)
    }
}

impl Hashable for Not {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("not", &[&self.0]);
    }
}

/// Holds when every key is configured with the given value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration(pub BTreeMap<String, String>);

impl Configuration {
    fn holds(&self, configuration: &BTreeMap<String, String>) -> bool {
        self.0
            .iter()
            .all(|(key, value)| configuration.get(key) == Some(value))
    }
}

impl Point for Configuration {
    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        MatchType::from_bool(self.holds(ctx.configuration))
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        self.holds(&ctx.file().config.configuration)
    }
}

impl Hashable for Configuration {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("configuration", &[&self.0]);
    }
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;
