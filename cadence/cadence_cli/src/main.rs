use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::config::ConfigArgs;
use commands::run::RunArgs;

/// Cadence command-line interface
///
/// Drives probe workloads through the Cadence executor and checks
/// executor configuration files.
#[derive(Parser)]
#[command(name = "cadence", author, version, about)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit probe tasks, wait, stop the executor and report outcomes
    Run(RunArgs),

    /// Validate a configuration file and print the effective settings
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match &cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Config(args) => commands::config::execute(args),
    }
}
