use std::io;

use anyhow::Result;
use tapestry_core::{init_tracing, init_tracing_with};

fn main() -> Result<()> {
    let matches = tapestry_cli::command().get_matches();

    if matches.get_flag("verbose") {
        init_tracing_with("tapestry_core=debug,tapestry_cli=debug");
    } else {
        init_tracing();
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    tapestry_cli::execute(&matches, &mut out)
}
