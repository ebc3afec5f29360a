//! Tapestry CLI - weaves aspect files into Go packages.
//!
//! The binary is a thin wrapper around [`command`] and [`execute`]; both are
//! exposed so the subcommands can be driven in-process.

mod weave;

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tapestry_core::{fingerprint, load_aspects_from_path, Aspect};
use tracing::debug;

pub use weave::{collect_sources, parse_setting};

fn aspects_arg() -> Arg {
    Arg::new("aspects")
        .long("aspects")
        .short('a')
        .value_name("FILE")
        .help("Aspect configuration file (repeatable)")
        .required(true)
        .action(ArgAction::Append)
        .value_parser(clap::value_parser!(PathBuf))
}

/// The `tapestry` command line.
pub fn command() -> Command {
    Command::new("tapestry")
        .version(tapestry_core::VERSION)
        .about("Weaves declarative aspects into Go source files")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log every match and rewrite")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("weave")
                .about("Rewrites the files of a package and writes them to an output directory")
                .arg(aspects_arg())
                .arg(
                    Arg::new("import-path")
                        .long("import-path")
                        .value_name("PATH")
                        .help("Import path of the package being woven")
                        .required(true),
                )
                .arg(
                    Arg::new("module-path")
                        .long("module-path")
                        .value_name("PATH")
                        .help("Path of the main module, for module-relative package filters"),
                )
                .arg(
                    Arg::new("package-name")
                        .long("package-name")
                        .value_name("NAME")
                        .help("Declared package name; read from the sources when omitted"),
                )
                .arg(
                    Arg::new("go-version")
                        .long("go-version")
                        .value_name("VERSION")
                        .help("Go language version of the module, e.g. go1.22"),
                )
                .arg(
                    Arg::new("test-main")
                        .long("test-main")
                        .help("The package is a synthesized test main package")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("set")
                        .long("set")
                        .value_name("KEY=VALUE")
                        .help("Configuration value visible to join points and templates (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .short('o')
                        .value_name("DIR")
                        .help("Directory the woven files are written to")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the summary as JSON")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("inputs")
                        .value_name("FILE|DIR")
                        .help("Go source files or package directories")
                        .required(true)
                        .num_args(1..)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("fingerprint")
                .about("Prints the fingerprint of an aspect set")
                .arg(aspects_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Validates aspect files and lists their aspects")
                .arg(aspects_arg()),
        )
}

/// Parses `args` (including the program name) and runs the subcommand,
/// writing its report to `out`.
pub fn run<I, T>(args: I, out: &mut dyn Write) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    execute(&matches, out)
}

pub fn execute(matches: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    match matches.subcommand() {
        Some(("weave", sub)) => weave::run(sub, out),
        Some(("fingerprint", sub)) => {
            let aspects = load_all(sub)?;
            writeln!(out, "{}", fingerprint(&aspects))?;
            Ok(())
        }
        Some(("check", sub)) => check(sub, out),
        Some((other, _)) => bail!("unknown subcommand {other}"),
        None => bail!("no subcommand given"),
    }
}

/// Loads every `--aspects` file, in order. Aspect ids must be unique across
/// files.
pub(crate) fn load_all(matches: &ArgMatches) -> Result<Vec<Aspect>> {
    let mut aspects: Vec<Aspect> = Vec::new();
    for path in matches.get_many::<PathBuf>("aspects").into_iter().flatten() {
        let loaded = load_aspects_from_path(path)?;
        debug!(path = %path.display(), count = loaded.len(), "loaded aspect file");
        for aspect in loaded {
            if aspects.iter().any(|existing| existing.id == aspect.id) {
                bail!("duplicate aspect id {:?} in {}", aspect.id, path.display());
            }
            aspects.push(aspect);
        }
    }
    Ok(aspects)
}

fn check(matches: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let aspects = load_all(matches)?;
    for aspect in &aspects {
        let kinds: Vec<&str> = aspect.advice.iter().map(|advice| advice.kind()).collect();
        write!(out, "{}: {}", aspect.id, kinds.join(", "))?;
        let implied = aspect.implies_imported();
        if !implied.is_empty() {
            write!(out, " (requires {})", implied.join(", "))?;
        }
        writeln!(out)?;
    }
    writeln!(out, "{} aspect(s) OK", aspects.len())?;
    Ok(())
}
