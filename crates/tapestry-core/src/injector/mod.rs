/*!
# Injector

Weaves a set of aspects into the files of one package.

For every package the injector first asks each aspect's join point whether
the package (import path, imports, configuration) and then each file (raw
content) may contain a match, so files no aspect can touch are never
walked. Surviving files are walked post-order; at each node the advice of
every matching aspect is sorted and applied in place. A file whose tree
changed is finalised: injected declarations are appended, the imports
generated code needs are added and the file is printed again.

Any advice error fails the whole package; no partial output is returned.
*/

mod imports;
pub(crate) mod walk;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aspect::advice::{sort_advice, AdviceError, OrderedAdvice};
use crate::aspect::context::{AdviceContext, AspectContext, FileContext, FileState, GoLangVersion};
use crate::aspect::join::{FileMayMatchContext, MatchType, PackageMayMatchContext, PackageTypeIndex};
use crate::aspect::Aspect;
use crate::ast::{print_file, File};
use crate::parser::{GoParser, ParseError, SourceParser};
use crate::InjectorConfig;

pub use walk::IGNORE_DIRECTIVE;

#[derive(thiserror::Error, Debug)]
pub enum InjectError {
    #[error("failed to parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: ParseError,
    },

    #[error("{file}: aspect {aspect:?} failed: {source}")]
    Advice {
        file: String,
        aspect: String,
        #[source]
        source: AdviceError,
    },
}

/// Outcome of weaving one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectResult {
    pub name: String,
    pub modified: bool,
    /// Rewritten source, or the original text when nothing changed.
    pub source: String,
    /// Import path to alias of every package generated code references.
    pub references: BTreeMap<String, String>,
    /// Link-time dependencies added by injected declarations.
    pub links: BTreeSet<String>,
    /// Minimum Go language level the rewritten file requires.
    #[serde(serialize_with = "serialize_go_lang")]
    pub go_lang: Option<GoLangVersion>,
}

fn serialize_go_lang<S: serde::Serializer>(
    version: &Option<GoLangVersion>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match version {
        Some(version) => serializer.collect_str(version),
        None => serializer.serialize_none(),
    }
}

/// Per-aspect counters accumulated across every file an injector wove.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AspectStats {
    pub aspect_id: String,
    /// Nodes the join point matched.
    pub matches: u64,
    /// Advice applications that changed something.
    pub applications: u64,
    pub errors: u64,
}

impl AspectStats {
    pub fn new(aspect_id: impl Into<String>) -> Self {
        Self {
            aspect_id: aspect_id.into(),
            ..Default::default()
        }
    }
}

pub struct Injector {
    aspects: Vec<Aspect>,
    /// Definition index of each aspect's first advice.
    bases: Vec<usize>,
    config: InjectorConfig,
    stats: Vec<AspectStats>,
}

impl Injector {
    pub fn new(aspects: Vec<Aspect>, config: InjectorConfig) -> Self {
        let mut next = 0;
        let bases = aspects
            .iter()
            .map(|aspect| {
                let base = next;
                next += aspect.advice.len();
                base
            })
            .collect();
        let stats = aspects.iter().map(|aspect| AspectStats::new(&aspect.id)).collect();
        Self {
            aspects,
            bases,
            config,
            stats,
        }
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    pub fn aspects(&self) -> &[Aspect] {
        &self.aspects
    }

    pub fn stats(&self) -> &[AspectStats] {
        &self.stats
    }

    /// Weaves a package made of a single file.
    pub fn inject_file(&mut self, name: &str, source: &str) -> Result<InjectResult, InjectError> {
        let mut results = self.inject_package(&[(name.to_string(), source.to_string())])?;
        Ok(results.remove(0))
    }

    /// Weaves every file of a package. `files` pairs file names with their
    /// source; results come back in the same order.
    pub fn inject_package(&mut self, files: &[(String, String)]) -> Result<Vec<InjectResult>, InjectError> {
        let mut parser = GoParser::new().map_err(|source| InjectError::Parse {
            file: String::new(),
            source,
        })?;
        let aliases = BTreeMap::new();
        let mut parsed = Vec::with_capacity(files.len());
        for (name, source) in files {
            let file = parser
                .parse_file(source, &aliases)
                .map_err(|source| InjectError::Parse {
                    file: name.clone(),
                    source,
                })?;
            parsed.push(file);
        }

        let package_name = if self.config.package_name.is_empty() {
            parsed
                .first()
                .map(|file| file.package.name.clone())
                .unwrap_or_default()
        } else {
            self.config.package_name.clone()
        };
        let active = self.package_aspects(&parsed, &package_name);
        let index = PackageTypeIndex::from_files(&self.config.import_path, &parsed);

        let mut results = Vec::with_capacity(files.len());
        for ((name, source), mut file) in files.iter().zip(parsed) {
            let candidates: Vec<usize> = active
                .iter()
                .copied()
                .filter(|&i| {
                    let mut ctx = FileMayMatchContext::new(source, &package_name);
                    self.aspects[i].join_point.file_may_match(&mut ctx) != MatchType::NeverMatch
                })
                .collect();
            if candidates.is_empty() {
                debug!(file = %name, "no aspect may match, skipping");
                results.push(unchanged(name, source));
                continue;
            }

            let ctx = FileContext {
                config: &self.config,
                package_name: package_name.clone(),
                file_name: name.clone(),
                resolver: &index,
            };
            let mut state = FileState::new().map_err(|source| InjectError::Parse {
                file: name.clone(),
                source,
            })?;
            let mut weaver = AspectWeaver {
                file_name: name,
                aspects: &self.aspects,
                bases: &self.bases,
                candidates: &candidates,
                stats: &mut self.stats,
                modified: false,
            };
            walk::walk_file(&mut file, &ctx, &mut state, &mut weaver)?;
            if !weaver.modified {
                results.push(unchanged(name, source));
                continue;
            }
            results.push(self.finalize(name, file, state));
        }
        Ok(results)
    }

    /// Aspects that may apply somewhere in the package.
    fn package_aspects(&self, files: &[File], package_name: &str) -> Vec<usize> {
        let imports: BTreeSet<String> = files
            .iter()
            .flat_map(|file| file.imports().map(|import| import.path.clone()))
            .collect();
        let ctx = PackageMayMatchContext {
            import_path: &self.config.import_path,
            package_name,
            module_path: &self.config.module_path,
            imports: &imports,
            test_main: self.config.test_main,
            configuration: &self.config.configuration,
        };
        self.aspects
            .iter()
            .enumerate()
            .filter(|(_, aspect)| {
                if aspect.is_self_import(&self.config.import_path) {
                    debug!(aspect = %aspect.id, "skipping aspect that would import the woven package");
                    return false;
                }
                let possible = aspect.join_point.package_may_match(&ctx) != MatchType::NeverMatch;
                if !possible {
                    debug!(aspect = %aspect.id, package = %self.config.import_path, "package can't match");
                }
                possible
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn finalize(&self, name: &str, mut file: File, mut state: FileState) -> InjectResult {
        file.decls.extend(state.take_declarations());
        let import_path = &self.config.import_path;
        imports::unqualify(&mut file, import_path);
        let added = imports::add_imports(&mut file, state.references(), import_path);
        if let (Some(required), Some(available)) = (state.go_lang(), self.config.go_version) {
            if required > available {
                warn!(file = %name, %required, %available, "woven code needs a newer Go version than the module declares");
            }
        }
        info!(file = %name, imports = added.len(), "wove file");
        InjectResult {
            name: name.to_string(),
            modified: true,
            source: print_file(&file),
            references: state
                .references()
                .iter()
                .filter(|(path, _)| *path != import_path)
                .map(|(path, alias)| (path.clone(), alias.clone()))
                .collect(),
            links: state.links().clone(),
            go_lang: state.go_lang(),
        }
    }
}

fn unchanged(name: &str, source: &str) -> InjectResult {
    InjectResult {
        name: name.to_string(),
        modified: false,
        source: source.to_string(),
        references: BTreeMap::new(),
        links: BTreeSet::new(),
        go_lang: None,
    }
}

/// Applies the sorted advice of every aspect matching a node.
struct AspectWeaver<'a> {
    file_name: &'a str,
    aspects: &'a [Aspect],
    bases: &'a [usize],
    candidates: &'a [usize],
    stats: &'a mut [AspectStats],
    modified: bool,
}

impl<'a> walk::Weaver for AspectWeaver<'a> {
    type Plan = Vec<(usize, OrderedAdvice<'a>)>;
    type Error = InjectError;

    fn plan(&mut self, ctx: &AspectContext<'_>) -> Option<Self::Plan> {
        let aspects: &'a [Aspect] = self.aspects;
        let mut advice = Vec::new();
        let mut owners = Vec::new();
        for &i in self.candidates {
            let aspect = &aspects[i];
            if !aspect.join_point.matches(ctx) {
                continue;
            }
            self.stats[i].matches += 1;
            for ordered in aspect.ordered_advice(self.bases[i]) {
                owners.push((ordered.index, i));
                advice.push(ordered);
            }
        }
        if advice.is_empty() {
            return None;
        }
        sort_advice(&mut advice);
        let plan = advice
            .into_iter()
            .map(|ordered| {
                let owner = owners
                    .iter()
                    .find(|(index, _)| *index == ordered.index)
                    .map_or(0, |(_, owner)| *owner);
                (owner, ordered)
            })
            .collect();
        Some(plan)
    }

    fn apply(&mut self, plan: Self::Plan, ctx: &mut AdviceContext<'_>) -> Result<(), InjectError> {
        for (owner, ordered) in plan {
            match ordered.advice.apply(ctx) {
                Ok(true) => {
                    debug!(
                        aspect = ordered.aspect_id,
                        advice = ordered.advice.kind(),
                        node = %ctx.kind(),
                        "applied advice"
                    );
                    self.stats[owner].applications += 1;
                    self.modified = true;
                }
                Ok(false) => {}
                Err(source) => {
                    self.stats[owner].errors += 1;
                    return Err(InjectError::Advice {
                        file: self.file_name.to_string(),
                        aspect: ordered.aspect_id.to_string(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}
