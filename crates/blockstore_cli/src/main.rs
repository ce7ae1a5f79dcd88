//! Blockstore CLI
//!
//! Command-line tools for inspecting and maintaining a block store.
//!
//! # Commands
//!
//! - `check-config` - Load the configuration and build the backend
//! - `list` - List stored block IDs
//! - `stat` - Display block metadata
//! - `put` - Store a file as one block
//! - `get` - Read a block
//! - `rm` - Remove a block
//! - `verify` - Check every block against its content hash

mod commands;

use blockstore_backend::{load_block_backend, BackendConfig, BlockId};
use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Block store command-line tools.
#[derive(Parser)]
#[command(name = "blockstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the backend configuration file (TOML)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the configuration and build the backend
    CheckConfig,

    /// List stored block IDs
    List {
        /// Print only the number of blocks
        #[arg(long)]
        count: bool,
    },

    /// Display block metadata
    Stat {
        /// Block ID (40 lowercase hex characters)
        id: BlockId,

        /// Output format (text, json)
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Store a file as one block under its content hash
    Put {
        /// File to store
        file: PathBuf,
    },

    /// Read a block to stdout or a file
    Get {
        /// Block ID (40 lowercase hex characters)
        id: BlockId,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove a block
    Rm {
        /// Block ID (40 lowercase hex characters)
        id: BlockId,
    },

    /// Check every block against its content hash
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so `get` can stream block content on stdout
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("blockstore CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let path = cli
        .config
        .ok_or("Configuration file required (--config)")?;
    let config = BackendConfig::load(&path)?;
    let backend = load_block_backend(&config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::CheckConfig => commands::check_config::run(&backend, &mut out)?,
        Commands::List { count } => commands::list::run(&backend, count, &mut out)?,
        Commands::Stat { id, format } => commands::stat::run(&backend, &id, format, &mut out)?,
        Commands::Put { file } => commands::put::run(&backend, &file, &mut out)?,
        Commands::Get { id, output } => {
            commands::get::run(&backend, &id, output.as_deref(), &mut out)?
        }
        Commands::Rm { id } => commands::rm::run(&backend, &id, &mut out)?,
        Commands::Verify => commands::verify::run(&backend, &mut out)?,
        Commands::Version => {}
    }

    Ok(())
}
