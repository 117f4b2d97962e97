mod commands;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use rib_core::{HandlerKind, Options};

use commands::{cmd_check, cmd_decl, cmd_dump};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// RIB scene-description stream checker.
#[derive(Parser)]
#[command(name = "rib", version, about = "RIB scene-description stream checker")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// TOML file with context options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip parameter count validation
    #[arg(long, global = true)]
    lenient: bool,

    /// Active color sample count
    #[arg(long, global = true)]
    color_samples: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a RIB file
    Check {
        /// Path to the RIB file (text or binary)
        file: PathBuf,
    },

    /// Print every decoded call of a RIB file as JSON
    Dump {
        /// Path to the RIB file (text or binary)
        file: PathBuf,
    },

    /// Parse a declaration grammar and print the result
    Decl {
        /// Declaration, e.g. "varying float[3] foo"
        grammar: String,
        /// Parameter name, when the grammar does not carry one
        #[arg(long)]
        name: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let options = match load_options(cli.config.as_deref(), cli.lenient, cli.color_samples) {
        Ok(o) => o,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Check { file } => cmd_check(&file, options, cli.output, cli.quiet),
        Commands::Dump { file } => cmd_dump(&file, options, cli.output, cli.quiet),
        Commands::Decl { grammar, name } => {
            cmd_decl(&grammar, name.as_deref(), &options, cli.output, cli.quiet)
        }
    }
}

/// Options from `--config` (or defaults collecting diagnostics), with the
/// command-line flags laid over them.
fn load_options(
    path: Option<&Path>,
    lenient: bool,
    color_samples: Option<usize>,
) -> Result<Options, String> {
    let mut options = match path {
        Some(p) => {
            let text = fs::read_to_string(p)
                .map_err(|e| format!("error reading config '{}': {}", p.display(), e))?;
            toml::from_str::<Options>(&text)
                .map_err(|e| format!("error parsing config '{}': {}", p.display(), e))?
        }
        None => Options {
            error_handler: HandlerKind::Collect,
            ..Options::default()
        },
    };
    if lenient {
        options.strict = false;
    }
    if let Some(n) = color_samples {
        if n == 0 {
            return Err("--color-samples must be at least 1".to_owned());
        }
        options.color_samples = n;
    }
    Ok(options)
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
