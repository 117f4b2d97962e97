use std::path::Path;
use std::process;

use rib_core::{NullSink, Options};

use super::{decode_file, print_diagnostics};
use crate::OutputFormat;

pub(crate) fn cmd_check(file: &Path, options: Options, output: OutputFormat, quiet: bool) {
    let (ctx, summary) = decode_file(file, options, NullSink, output, quiet);

    match output {
        OutputFormat::Json => {
            let diagnostics: Vec<_> = ctx.diagnostics().iter().map(|d| d.to_json_value()).collect();
            let report = serde_json::json!({
                "file": file.display().to_string(),
                "summary": summary,
                "diagnostics": diagnostics,
            });
            let json = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            print_diagnostics(ctx.diagnostics(), quiet);
            if !quiet {
                println!(
                    "{}: {} requests, {} accepted, {} rejected, {} errors",
                    file.display(),
                    summary.requests,
                    summary.accepted,
                    summary.rejected,
                    summary.errors
                );
                if summary.aborted {
                    println!("parsing aborted after the first error");
                }
            }
        }
    }

    if summary.errors > 0 {
        process::exit(1);
    }
}
