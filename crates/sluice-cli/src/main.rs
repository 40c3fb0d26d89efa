//! Sluice CLI - run, check, and inspect dataflow compositions.

mod commands;
mod report;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(author, version, about = "Sluice dataflow composition runner", long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a composition, firing triggers and printing telemetry
    Run(commands::run::RunArgs),

    /// Validate and compile a composition, printing its schedule
    Check(commands::check::CheckArgs),

    /// List available node classes and their ports
    Nodes(commands::nodes::NodesArgs),

    /// List factory and user compositions
    Compositions(commands::compositions::CompositionsArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Nodes(args) => commands::nodes::run(args),
        Commands::Compositions(args) => commands::compositions::run(args),
    }
}
