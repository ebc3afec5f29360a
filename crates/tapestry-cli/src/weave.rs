//! The `weave` subcommand.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::ArgMatches;
use serde::Serialize;
use tapestry_core::{AspectStats, GoLangVersion, InjectResult, Injector, InjectorConfig};
use tracing::info;

/// Splits a `--set key=value` argument.
pub fn parse_setting(setting: &str) -> Result<(String, String)> {
    match setting.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => bail!("invalid setting {setting:?}, expected KEY=VALUE"),
    }
}

/// Reads the Go files named by `inputs`: files as given, directories by
/// their `.go` entries in name order. Every file name must be unique.
pub fn collect_sources(inputs: &[PathBuf]) -> Result<Vec<(String, String)>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries = Vec::new();
            for entry in fs::read_dir(input).with_context(|| format!("failed to list {}", input.display()))? {
                let path = entry?.path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == "go") {
                    entries.push(path);
                }
            }
            entries.sort();
            paths.extend(entries);
        } else {
            paths.push(input.clone());
        }
    }

    let mut seen = BTreeSet::new();
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let name = file_name(&path)?;
        if !seen.insert(name.clone()) {
            bail!("{name} is given more than once");
        }
        let source = fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        sources.push((name, source));
    }
    Ok(sources)
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} is not a file name", path.display()))
}

fn injector_config(matches: &ArgMatches) -> Result<InjectorConfig> {
    let mut configuration = BTreeMap::new();
    for setting in matches.get_many::<String>("set").into_iter().flatten() {
        let (key, value) = parse_setting(setting)?;
        configuration.insert(key, value);
    }
    let go_version = match matches.get_one::<String>("go-version") {
        Some(version) => Some(version.parse::<GoLangVersion>()?),
        None => None,
    };
    Ok(InjectorConfig {
        import_path: matches
            .get_one::<String>("import-path")
            .cloned()
            .ok_or_else(|| anyhow!("--import-path is required"))?,
        package_name: matches.get_one::<String>("package-name").cloned().unwrap_or_default(),
        module_path: matches.get_one::<String>("module-path").cloned().unwrap_or_default(),
        test_main: matches.get_flag("test-main"),
        configuration,
        go_version,
    })
}

#[derive(Serialize)]
struct FileSummary<'a> {
    name: &'a str,
    modified: bool,
    references: &'a BTreeMap<String, String>,
    links: &'a BTreeSet<String>,
    go_lang: Option<String>,
}

impl<'a> From<&'a InjectResult> for FileSummary<'a> {
    fn from(result: &'a InjectResult) -> Self {
        Self {
            name: &result.name,
            modified: result.modified,
            references: &result.references,
            links: &result.links,
            go_lang: result.go_lang.map(|version| version.to_string()),
        }
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    files: Vec<FileSummary<'a>>,
    aspects: &'a [AspectStats],
}

pub(crate) fn run(matches: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let aspects = crate::load_all(matches)?;
    let config = injector_config(matches)?;
    let inputs: Vec<PathBuf> = matches
        .get_many::<PathBuf>("inputs")
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    let out_dir = matches
        .get_one::<PathBuf>("out")
        .ok_or_else(|| anyhow!("--out is required"))?;

    let sources = collect_sources(&inputs)?;
    if sources.is_empty() {
        bail!("no Go files to weave");
    }
    let mut injector = Injector::new(aspects, config);
    let results = injector.inject_package(&sources)?;

    fs::create_dir_all(out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;
    for result in &results {
        let target = out_dir.join(&result.name);
        fs::write(&target, &result.source).with_context(|| format!("failed to write {}", target.display()))?;
    }
    let woven = results.iter().filter(|result| result.modified).count();
    info!(files = results.len(), woven, out = %out_dir.display(), "weave finished");

    if matches.get_flag("json") {
        let summary = Summary {
            files: results.iter().map(FileSummary::from).collect(),
            aspects: injector.stats(),
        };
        serde_json::to_writer_pretty(&mut *out, &summary)?;
        writeln!(out)?;
        return Ok(());
    }

    for result in &results {
        let status = if result.modified { "woven" } else { "unchanged" };
        writeln!(out, "{status:>9}  {}", result.name)?;
    }
    for stats in injector.stats() {
        writeln!(
            out,
            "{}: {} match(es), {} application(s)",
            stats.aspect_id, stats.matches, stats.applications
        )?;
    }
    writeln!(out, "{woven} of {} file(s) woven into {}", results.len(), out_dir.display())?;
    Ok(())
}
