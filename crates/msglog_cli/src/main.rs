//! MsgLog CLI
//!
//! Command-line tools for MsgLog files.
//!
//! # Commands
//!
//! - `inspect` - Display record count, seq range and torn tail size
//! - `verify` - Walk the record chain and fail on any damage
//! - `dump` - Print record headers starting at a sequence number
//! - `recover` - Truncate a torn tail so the log can be appended to again

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// MsgLog command-line tools.
#[derive(Parser)]
#[command(name = "msglog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display log statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify every record and back-link
    Verify {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print record headers
    Dump {
        /// First sequence number to print
        #[arg(long, default_value = "0")]
        from: u64,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<u64>,

        /// Also print payloads as hex
        #[arg(long)]
        payload: bool,
    },

    /// Truncate a torn tail left by a crash
    Recover,

    /// Show version information
    Version,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Log path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify { format } => {
            let path = cli.path.ok_or("Log path required for verify")?;
            if !commands::verify::run(&path, &format)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Dump {
            from,
            limit,
            payload,
        } => {
            let path = cli.path.ok_or("Log path required for dump")?;
            commands::dump::run(&path, from, limit, payload)?;
        }
        Commands::Recover => {
            let path = cli.path.ok_or("Log path required for recover")?;
            commands::recover::run(&path)?;
        }
        Commands::Version => {
            println!("MsgLog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("MsgLog Core v{}", msglog_core::VERSION);
        }
    }

    Ok(ExitCode::SUCCESS)
}
