//! # Tapestry Core
//!
//! Aspect-oriented source rewriting for Go packages:
//! - A decorated Go syntax tree with a tree-sitter backed parser and a printer
//! - A small algebra of Go type expressions matched structurally against the tree
//! - Join points (predicates over tree positions) and advice (rewrites)
//! - Code templates rendered against the matched node and spliced back in
//! - An injector that weaves a set of aspects into the files of a package
//!
//! Woven files are returned as new source text; nothing is written back to
//! the original files.

#![warn(clippy::all)]

pub mod aspect;
pub mod ast;
pub mod config;
pub mod fingerprint;
pub mod injector;
pub mod parser;
pub mod typed;

use std::collections::BTreeMap;

// Re-export commonly used types
pub use aspect::advice::{Advice, AdviceError};
pub use aspect::advice::code::{Template, TemplateError};
pub use aspect::context::GoLangVersion;
pub use aspect::join::Point;
pub use aspect::Aspect;
pub use config::{load_aspects, load_aspects_from_path, ConfigError};
pub use fingerprint::{fingerprint, Hashable, Hasher};
pub use injector::{AspectStats, InjectError, InjectResult, Injector};
pub use parser::{GoParser, ParseError, SourceParser};
pub use typed::{Type, TypeParseError};

/// Tapestry version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for Tapestry core components
pub fn init_tracing() {
    init_tracing_with("tapestry_core=info");
}

/// Initialize tracing with an explicit default directive. `RUST_LOG` still
/// takes precedence for anything it names.
pub fn init_tracing_with(directive: &str) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    match directive.parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(err) => eprintln!("ignoring invalid log directive {directive:?}: {err}"),
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Settings of one injection run: the package being woven and the ambient
/// facts join points can test.
#[derive(Debug, Clone)]
pub struct InjectorConfig {
    /// Import path of the package being woven
    pub import_path: String,
    /// Declared package name; taken from the parsed files when empty
    pub package_name: String,
    /// Path of the main module, for module-relative package filters
    pub module_path: String,
    /// Whether the package is a synthesized test main package
    pub test_main: bool,
    /// Key/value facts matched by the `configuration` join point
    pub configuration: BTreeMap<String, String>,
    /// Go language version of the enclosing module, if known
    pub go_version: Option<GoLangVersion>,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            import_path: "main".to_string(),
            package_name: String::new(),
            module_path: String::new(),
            test_main: false,
            configuration: BTreeMap::new(),
            go_version: None,
        }
    }
}

/// Error types for Tapestry core operations
#[derive(thiserror::Error, Debug)]
pub enum TapestryError {
    #[error("Type error: {0}")]
    Type(#[from] TypeParseError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Advice error: {0}")]
    Advice(#[from] AdviceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Injection error: {0}")]
    Inject(#[from] InjectError),
}

/// Result type for Tapestry core operations
pub type Result<T> = std::result::Result<T, TapestryError>;
