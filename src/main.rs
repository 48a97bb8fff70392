// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Fieldcapture CLI - capture records and stock movements in the vineyard

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "fieldcapture")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "FIELDCAPTURE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the block containing a location
    Resolve {
        /// Block catalog (JSON)
        #[arg(long)]
        catalog: PathBuf,

        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Validate a stock movement and print its ledger payload
    Movement {
        /// Asset catalog (JSON)
        #[arg(long)]
        assets: PathBuf,

        /// Asset id
        #[arg(long)]
        asset: String,

        /// Direction: add or subtract
        #[arg(long, default_value = "subtract")]
        direction: String,

        /// Unsigned quantity
        #[arg(long)]
        magnitude: String,

        /// Reason (purchase, usage, damaged, correction, ...)
        #[arg(long, default_value = "usage")]
        reason: String,

        /// Audit note
        #[arg(long)]
        note: Option<String>,

        /// Movement date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Compose a task or observation record
    Compose(commands::compose::ComposeArgs),

    /// Show the effective configuration
    Config {
        /// Single key to print
        key: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = fieldcapture::config::load(cli.config.as_deref())?;

    // Initialize logging; -v/-q win over the configured level
    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    match cli.command {
        Commands::Resolve { catalog, lat, lon } => {
            commands::resolve::run(&catalog, lat, lon, cli.json)
        }
        Commands::Movement { assets, asset, direction, magnitude, reason, note, date } => {
            commands::movement::run(commands::movement::MovementArgs {
                assets,
                asset,
                direction,
                magnitude,
                reason,
                note,
                date,
                json: cli.json,
            })
        }
        Commands::Compose(args) => {
            commands::compose::run(args, &config, cli.json)
        }
        Commands::Config { key } => {
            commands::config::run(&config, key.as_deref())
        }
        Commands::Completions { shell } => {
            commands::completions::run(shell, &mut Cli::command())
        }
    }
}
