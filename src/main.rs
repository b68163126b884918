use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;

use walkassign::config::LowerConfig;
use walkassign::diagnostics::{LowerError, render_error};
use walkassign::ir::pretty::pretty_body;
use walkassign::runtime::RuntimeTable;
use walkassign::{Routine, lower_routine};

#[derive(Parser)]
#[command(name = "walkassign", version, about = "Assignment lowering for typed routine bodies")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower a routine serialized as JSON and print the result
    Lower {
        /// Routine file (.json)
        file: PathBuf,
        /// Lowering configuration (.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Source file the routine's spans point into, for diagnostics
        #[arg(long)]
        source: Option<PathBuf>,
        /// Print the lowered routine as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();
}

/// Returns the user-facing errors; the lowered routine is printed only when there are none.
fn run_lower(file: &Path, config: Option<&Path>, json: bool) -> Result<Vec<LowerError>, LowerError> {
    let config = match config {
        Some(path) => LowerConfig::load(path)?,
        None => LowerConfig::default(),
    };
    let mut routine = Routine::load(file)?;
    let runtime = RuntimeTable::new();
    let errors = lower_routine(&mut routine, &runtime, &config)?;
    if !errors.is_empty() {
        return Ok(errors);
    }
    if json {
        let text = serde_json::to_string_pretty(&routine)
            .map_err(|e| LowerError::input(format!("failed to serialize routine: {e}"), file.to_path_buf()))?;
        println!("{text}");
    } else {
        print!("{}", pretty_body(&routine.func, &routine.body));
    }
    Ok(Vec::new())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Lower { file, config, source, json } => {
            let source_text = source.as_deref().and_then(|p| std::fs::read_to_string(p).ok());
            let filename = source.as_deref().unwrap_or(&file).display().to_string();
            match run_lower(&file, config.as_deref(), json) {
                Ok(errors) if errors.is_empty() => {}
                Ok(errors) => {
                    for err in &errors {
                        render_error(source_text.as_deref(), &filename, err);
                    }
                    std::process::exit(1);
                }
                Err(err) => {
                    render_error(source_text.as_deref(), &filename, &err);
                    std::process::exit(1);
                }
            }
        }
    }
}
