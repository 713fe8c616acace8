//! SVM Compiler CLI
//!
//! Command-line interface for lowering checked program trees (JSON) to
//! stack VM intermediate programs.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use svmc::{CompilerConfig, OutputFormat};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "svmc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SVM compiler - lower checked programs to stack VM code", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower a checked program tree to an intermediate program
    Lower {
        /// Input program tree (JSON)
        input: PathBuf,

        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compiler configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format, overriding the configuration file
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Do not emit LINE source markers
        #[arg(long)]
        no_lines: bool,

        /// Log lowering progress to stderr
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Lower {
            input,
            output,
            config,
            format,
            no_lines,
            verbose,
        } => {
            init_logging(verbose);
            run_lower(&input, output.as_deref(), config.as_deref(), format, no_lines);
        }
        Commands::Completions { shell } => {
            run_completions(shell);
        }
    }
}

/// `RUST_LOG` decides what is logged unless `-v` asks for debug output
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,svmc=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "svmc", &mut io::stdout());
}

fn run_lower(
    input: &Path,
    output: Option<&Path>,
    config_path: Option<&Path>,
    format: Option<OutputFormat>,
    no_lines: bool,
) {
    let config = match config_path {
        Some(path) => match CompilerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => CompilerConfig::default(),
    };
    let mut config = match format {
        Some(format) => config.with_output_format(format),
        None => config,
    };
    if no_lines {
        config = config.with_line_markers(false);
    }

    let result = match output {
        Some(output) => svmc::compile_file(input, output, &config).map(|()| {
            info!(output = %output.display(), "wrote intermediate program");
        }),
        None => fs::read_to_string(input)
            .map_err(|e| format!("Failed to read source file: {}", e))
            .and_then(|source| svmc::compile_source(&source, &config))
            .map(|text| print!("{}", text)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
