//! scriptdock - run and hot-reload TypeScript/JavaScript tool scripts.

mod commands;
mod config;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tokio::task::LocalSet;
use tracing_subscriber::filter::EnvFilter;

use commands::{list::ListCommand, run::RunCommand, watch::WatchCommand};

#[derive(Parser)]
#[command(
    name = "scriptdock",
    version,
    about = "Load, run and hot-reload TypeScript/JavaScript tool scripts"
)]
struct Cli {
    /// Path to config file (default: scriptdock.toml in the current directory or an ancestor)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a script directory and reload it on change
    Watch(WatchCommand),

    /// Load every script once and list what registered
    List(ListCommand),

    /// Invoke an export of one script and print the JSON result
    Run(RunCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    let config = config::load_config(cli.config.as_deref())?;

    // The script engine is single-threaded, so every command runs on one LocalSet
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = LocalSet::new();

    local.block_on(&runtime, async move {
        match &cli.command {
            Commands::Watch(cmd) => cmd.run(&config).await,
            Commands::List(cmd) => cmd.run(&config).await,
            Commands::Run(cmd) => cmd.run(&config).await,
        }
    })
}
