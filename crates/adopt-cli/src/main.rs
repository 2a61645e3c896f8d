//! adopt CLI - Command line interface for the campaign optimization engine
//!
//! Drives the learner offline: synthetic simulations, one-off
//! recommendations, batch training from recorded transitions and
//! checkpoint inspection.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unused_async)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_precision_loss)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::{recommend, simulate, stats, train};
use config::Config;

#[derive(Parser)]
#[command(name = "adopt")]
#[command(author, version, about = "adopt - reinforcement learning campaign optimizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./adopt.toml, then ~/.config/adopt/adopt.toml)
    #[arg(short, long, global = true, env = "ADOPT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the learner against synthetic campaigns
    Simulate(simulate::SimulateArgs),

    /// Recommend an optimization for a metrics snapshot
    Recommend(recommend::RecommendArgs),

    /// Train from recorded transitions
    Train(train::TrainArgs),

    /// Show learner statistics
    Stats(stats::StatsArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

fn init_tracing(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("adopt={level},adopt_rl={level},adopt_core={level}").into()
    });

    // stdout carries command output, logs go to stderr
    let json = config.logging.json;
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from adopt.env file (before parsing args)
    adopt_core::util::load_env_file();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(&config, cli.verbose);

    match cli.command {
        Commands::Simulate(args) => simulate::run(args, config).await,
        Commands::Recommend(args) => recommend::run(args, config).await,
        Commands::Train(args) => train::run(args, config).await,
        Commands::Stats(args) => stats::run(args, config).await,
        Commands::Config(cmd) => commands::config::run(cmd, config).await,
    }
}
