//! Configuration loading for the adopt CLI
//!
//! Layers, lowest priority first: built-in defaults, an optional TOML file,
//! then `ADOPT__SECTION__KEY` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use adopt_rl::LearnerConfig;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "ADOPT";

/// Configuration for the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub learner: LearnerConfig,
    pub checkpoint: CheckpointConfig,

    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub path: PathBuf,
    /// Save the learner after commands that change it
    pub autosave: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: default_checkpoint_path(),
            autosave: true,
        }
    }
}

fn default_checkpoint_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("adopt").join("checkpoint.json"))
        .unwrap_or_else(|| PathBuf::from("adopt-checkpoint.json"))
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };
        Self::build(path.as_deref(), Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("learner.hidden_layers")
    }

    fn build(path: Option<&Path>, environment: Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(environment);

        let mut config: Config = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config
            .learner
            .validate()
            .context("Invalid [learner] configuration")?;
        config.source = path.map(Path::to_path_buf);
        Ok(config)
    }

    /// Find the configuration file
    fn find_config_file() -> Option<PathBuf> {
        // Check in order: ADOPT_CONFIG env, ./adopt.toml, ~/.config/adopt/adopt.toml
        if let Ok(path) = std::env::var("ADOPT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("adopt.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("adopt").join("adopt.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Default configuration rendered as TOML
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Config::default()).context("Failed to render default configuration")
    }
}
