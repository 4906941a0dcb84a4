//! Replica CLI - workflow digital twins and fault-injection testing.
//!
//! Commands:
//! - `replica simulate` - Run one simulation of a workflow file
//! - `replica scenario` - Run a test scenario and report on it
//! - `replica templates` - List the fault template catalog

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::scenario::ScenarioArgs;
use commands::simulate::SimulateArgs;

#[derive(Parser)]
#[command(name = "replica")]
#[command(about = "Digital twins and fault-injection testing for workflow graphs")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// YAML file with `twin` and `faults` configuration sections
    #[arg(short, long, global = true, env = "REPLICA_CONFIG")]
    config: Option<String>,

    /// Seed for fault decisions and output jitter
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a workflow once against a fresh twin
    Simulate(SimulateArgs),

    /// Run a test scenario against a workflow
    Scenario(ScenarioArgs),

    /// List the built-in fault templates
    Templates {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = commands::Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate(args) => commands::simulate::run(&settings, cli.seed, &args).await,
        Commands::Scenario(args) => commands::scenario::run(&settings, cli.seed, &args).await,
        Commands::Templates { json } => commands::templates::run(&settings, json),
    }
}
