mod check;
mod decl;
mod dump;

use std::path::Path;
use std::process;

use rib_core::{Context, Diagnostic, Options, ParseSummary, Parser, RibError, Sink};

use crate::{report_error, OutputFormat};

pub(crate) use check::cmd_check;
pub(crate) use decl::cmd_decl;
pub(crate) use dump::cmd_dump;

/// Decode `file` inside a `Begin`/`End` pair. Exits on errors that leave the
/// context unusable.
pub(crate) fn decode_file<S: Sink>(
    file: &Path,
    options: Options,
    sink: S,
    output: OutputFormat,
    quiet: bool,
) -> (Context<S>, ParseSummary) {
    let run = || -> Result<(Context<S>, ParseSummary), RibError> {
        let mut ctx = Context::with_options(options, sink)?;
        ctx.begin()?;
        let summary = Parser::new(&mut ctx).parse_file(file)?;
        if !ctx.modes().is_empty() {
            ctx.end()?;
        }
        Ok((ctx, summary))
    };
    match run() {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

/// Write collected diagnostics to stderr, one line each.
pub(crate) fn print_diagnostics(diagnostics: &[Diagnostic], quiet: bool) {
    if quiet {
        return;
    }
    for d in diagnostics {
        eprintln!("{} [{}] {}", d.severity.as_str(), d.code.as_str(), d.message);
    }
}
