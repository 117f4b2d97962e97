use std::path::Path;
use std::process;

use rib_core::{Options, Recorder};

use super::{decode_file, print_diagnostics};
use crate::OutputFormat;

pub(crate) fn cmd_dump(file: &Path, options: Options, output: OutputFormat, quiet: bool) {
    let (ctx, summary) = decode_file(file, options, Recorder::new(), output, quiet);

    match output {
        OutputFormat::Json => {
            let diagnostics: Vec<_> = ctx.diagnostics().iter().map(|d| d.to_json_value()).collect();
            if !diagnostics.is_empty() && !quiet {
                let json = serde_json::to_string_pretty(&diagnostics)
                    .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
                eprintln!("{}", json);
            }
        }
        OutputFormat::Text => print_diagnostics(ctx.diagnostics(), quiet),
    }

    let recorder = ctx.into_sink();
    let json = serde_json::to_string_pretty(&recorder.calls)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
    println!("{}", json);

    if summary.errors > 0 {
        process::exit(1);
    }
}
