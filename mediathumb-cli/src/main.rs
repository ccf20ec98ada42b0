//! mediathumb CLI - Command-line interface
//!
//! Operational front-end to the mediathumb library: generate derivatives for
//! one asset, run backfill and aging passes, and inspect configuration.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mediathumb::derivative::AssetId;

use commands::common::{BackfillTarget, GenerateKind};
use commands::config::ConfigCommands;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "mediathumb")]
#[command(version, about = "Generate and maintain media library thumbnails", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.mediathumb/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mirror log output to stdout
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug-level logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate derivatives for one asset
    Generate {
        /// Asset id from the media database
        asset_id: AssetId,

        /// Which derivatives to produce
        #[arg(long, value_enum, default_value = "all")]
        kind: GenerateKind,
    },

    /// Queue generation for assets missing a derivative and wait for it
    Backfill {
        /// Derivative to backfill
        #[arg(long, value_enum, default_value = "thumb")]
        kind: BackfillTarget,

        /// Maximum rows to queue (defaults to [background] query_limit)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Trim LCDs down to the aging threshold
    Age {
        /// List the LCDs that would be removed without deleting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show derivative cache status
    Status,

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Config { command } = cli.command {
        return commands::config::run(command, cli.config.as_deref());
    }

    let runner = CliRunner::new(cli.config.as_deref(), cli.verbose, cli.debug)?;
    match cli.command {
        Commands::Generate { asset_id, kind } => commands::generate::run(&runner, asset_id, kind),
        Commands::Backfill { kind, limit } => commands::backfill::run(&runner, kind, limit),
        Commands::Age { dry_run } => commands::age::run(&runner, dry_run),
        Commands::Status => commands::status::run(&runner),
        Commands::Config { .. } => Ok(()),
    }
}
