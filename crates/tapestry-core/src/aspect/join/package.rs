//! Package-level join points. They hold either for every node of a package
//! or for none of them, so their pre-filters are always decisive.

use globset::{Glob, GlobBuilder, GlobMatcher};

use crate::aspect::context::AspectContext;
use crate::fingerprint::{Hashable, Hasher};

use super::{FileMayMatchContext, MatchType, PackageMayMatchContext, Point};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPath(pub String);

impl Point for ImportPath {
    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        MatchType::from_bool(ctx.import_path == self.0)
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        ctx.import_path() == self.0
    }
}

impl Hashable for ImportPath {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("import-path", &[&self.0]);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageName(pub String);

impl Point for PackageName {
    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        if ctx.package_name.is_empty() {
            return MatchType::Unknown;
        }
        MatchType::from_bool(ctx.package_name == self.0)
    }

    fn file_may_match(&self, ctx: &mut FileMayMatchContext<'_>) -> MatchType {
        if ctx.package_name.is_empty() {
            return MatchType::Unknown;
        }
        MatchType::from_bool(ctx.package_name == self.0)
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        ctx.package_name() == self.0
    }
}

impl Hashable for PackageName {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("package-name", &[&self.0]);
    }
}

/// Glob over import paths. `*` and `?` stay within a path segment, `**`
/// crosses segments. With `root`, only packages of the main module match and
/// the pattern applies to their path relative to the module root.
#[derive(Debug, Clone)]
pub struct PackageFilter {
    pub pattern: String,
    pub root: bool,
    matcher: GlobMatcher,
}

impl PackageFilter {
    pub fn new(pattern: impl Into<String>, root: bool) -> Result<Self, globset::Error> {
        let pattern = pattern.into();
        let glob: Glob = GlobBuilder::new(&pattern).literal_separator(true).build()?;
        Ok(Self {
            matcher: glob.compile_matcher(),
            pattern,
            root,
        })
    }

    pub fn is_match(&self, import_path: &str, module_path: &str) -> bool {
        if !self.root {
            return self.matcher.is_match(import_path);
        }
        if module_path.is_empty() {
            return false;
        }
        let relative = if import_path == module_path {
            "."
        } else {
            match import_path
                .strip_prefix(module_path)
                .and_then(|rest| rest.strip_prefix('/'))
            {
                Some(relative) => relative,
                None => return false,
            }
        };
        self.matcher.is_match(relative)
    }
}

impl PartialEq for PackageFilter {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.root == other.root
    }
}

impl Point for PackageFilter {
    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        MatchType::from_bool(self.is_match(ctx.import_path, ctx.module_path))
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        self.is_match(ctx.import_path(), ctx.module_path())
    }
}

impl Hashable for PackageFilter {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("package-filter", &[&self.pattern, &self.root]);
    }
}

/// Holds inside synthesized test main packages, or outside of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestMain(pub bool);

impl Point for TestMain {
    fn package_may_match(&self, ctx: &PackageMayMatchContext<'_>) -> MatchType {
        MatchType::from_bool(ctx.test_main == self.0)
    }

    fn matches(&self, ctx: &AspectContext<'_>) -> bool {
        ctx.test_main() == self.0
    }
}

impl Hashable for TestMain {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("test-main", &[&self.0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_star_stays_within_segment() {
        let filter = PackageFilter::new("github.com/myorg/*", false).unwrap();
        assert!(filter.is_match("github.com/myorg/pkg", ""));
        assert!(!filter.is_match("github.com/myorg/sub/pkg", ""));
    }

    #[test]
    fn test_globstar_crosses_segments() {
        let filter = PackageFilter::new("github.com/myorg/**", false).unwrap();
        assert!(filter.is_match("github.com/myorg/sub/pkg", ""));
        assert!(filter.is_match("github.com/myorg/pkg", ""));
        assert!(!filter.is_match("github.com/other/pkg", ""));
    }

    #[test]
    fn test_character_classes() {
        let filter = PackageFilter::new("example.com/v[12]/?pi", false).unwrap();
        assert!(filter.is_match("example.com/v1/api", ""));
        assert!(!filter.is_match("example.com/v3/api", ""));
    }

    #[test]
    fn test_root_relative_patterns() {
        let filter = PackageFilter::new("internal/**", true).unwrap();
        let module = "example.com/app";
        assert!(filter.is_match("example.com/app/internal/db", module));
        assert!(!filter.is_match("example.com/app/cmd/server", module));
        assert!(!filter.is_match("example.com/application/internal/db", module));
        assert!(!filter.is_match("other.org/lib/internal/db", module));
        assert!(!filter.is_match("example.com/app/internal/db", ""));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(PackageFilter::new("example.com/[", false).is_err());
    }
}
