//! mesh-supports: Command-line interface for support point generation.
//!
//! Loads an STL part, measures local wall width by ray probing and prints the
//! support points placed on thin, downward facing regions. Suitable for
//! scripting: every command can emit JSON.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_supports=info` - Stage summaries
//! - `RUST_LOG=mesh_supports=debug` - Detailed per-stage counts
//! - `RUST_LOG=mesh_supports::timing=info` - Performance timing
//! - `RUST_LOG=debug` - All debug output
//!
//! # Example
//!
//! ```bash
//! # Supports for a part, reproducible with a fixed seed
//! mesh-supports sample part.stl --seed 42
//!
//! # Custom parameters from a JSON file, JSON output
//! mesh-supports config --preset sla > sla.json
//! mesh-supports --format json sample part.stl --config sla.json -o supports.json
//!
//! # Inspect the probing directions in a mesh viewer
//! mesh-supports directions --cone-angle 90 --count 80 -o directions.stl
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use miette::Diagnostic;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{config, directions, info, sample};

/// mesh-supports - Support point placement for thin parts of 3D prints.
///
/// Measures local wall width of a mesh and places supports where it is thin.
#[derive(Parser)]
#[command(name = "mesh-supports")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Preset {
    /// Balanced defaults
    Default,
    /// Coarse mesh, few rays
    Fast,
    /// Fine resin printing
    Sla,
}

#[derive(Subcommand)]
enum Commands {
    /// Display mesh statistics
    Info {
        /// Input STL file
        input: PathBuf,
    },

    /// Generate support points for thin regions
    Sample {
        /// Input STL file
        input: PathBuf,

        /// JSON configuration file (overrides --preset)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Parameter preset
        #[arg(long, default_value = "default")]
        preset: Preset,

        /// Random seed for reproducible placement
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Write the points as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Drop radii and report positions only
        #[arg(long)]
        positions_only: bool,
    },

    /// Show the probing directions used for width estimation
    Directions {
        /// Apex angle of the probing cone in degrees
        #[arg(long, default_value = "120")]
        cone_angle: f64,

        /// Number of spiral samples
        #[arg(long, default_value = "60")]
        count: usize,

        /// Export the directions as an STL for visual inspection
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a configuration file for a preset
    Config {
        /// Parameter preset
        #[arg(long, default_value = "default")]
        preset: Preset,
    },
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "mesh_supports=info",
            2 => "mesh_supports=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Info { input } => info::run(input, &cli),
        Commands::Sample {
            input,
            config,
            preset,
            seed,
            output,
            positions_only,
        } => sample::run(
            input,
            config.as_deref(),
            *preset,
            *seed,
            output.as_deref(),
            *positions_only,
            &cli,
        ),
        Commands::Directions {
            cone_angle,
            count,
            output,
        } => directions::run(*cone_angle, *count, output.as_deref(), &cli),
        Commands::Config { preset } => config::run(*preset, &cli),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            if let Some(err) = e.downcast_ref::<mesh_supports::SupportError>() {
                eprintln!("{}: {}", "Error".red().bold(), err);
                eprintln!("  {}: {}", "Code".cyan(), err.code());
                if let Some(help) = err.help() {
                    eprintln!("  {}: {}", "Suggestion".green(), help);
                }
            } else {
                eprintln!("{}: {}", "Error".red().bold(), e);
                for cause in e.chain().skip(1) {
                    eprintln!("  {}: {}", "Caused by".yellow(), cause);
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
