//! Configuration management commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::{Config, ENV_PREFIX};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Initialize configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,

        /// Where to write the file
        #[arg(default_value = "adopt.toml")]
        path: PathBuf,
    },
    /// Print the configuration file in use
    Path,
}

pub async fn run(cmd: ConfigCommands, config: Config) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(&config),
        ConfigCommands::Init { force, path } => init(&path, force),
        ConfigCommands::Path => {
            match &config.source {
                Some(path) => println!("{}", path.display()),
                None => println!("No configuration file found. Using defaults."),
            }
            Ok(())
        }
    }
}

fn show(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    match &config.source {
        Some(path) => println!("# Config file: {}", path.display()),
        None => println!("# No configuration file found. Using defaults."),
    }
    println!("# Environment overrides: {ENV_PREFIX}__<SECTION>__<KEY>\n");

    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    std::fs::write(path, Config::default_toml()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Configuration file created: {}", path.display());
    Ok(())
}
