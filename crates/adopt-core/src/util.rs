//! Utility functions for adopt
//!
//! Provides environment loading for the binaries.

use std::path::Path;

/// Load environment variables from the adopt env file if not already set.
/// Searches standard locations in order:
/// 1. /usr/local/etc/adopt/adopt.env
/// 2. User's config directory/adopt/adopt.env
/// 3. ~/.config/adopt/adopt.env
pub fn load_env_file() {
    let env_paths = [
        "/usr/local/etc/adopt/adopt.env".to_string(),
        dirs::config_dir()
            .map(|p| p.join("adopt/adopt.env").to_string_lossy().to_string())
            .unwrap_or_default(),
        dirs::home_dir()
            .map(|p| p.join(".config/adopt/adopt.env").to_string_lossy().to_string())
            .unwrap_or_default(),
    ];

    for path in &env_paths {
        if path.is_empty() {
            continue;
        }
        if Path::new(path).exists() {
            if let Ok(contents) = std::fs::read_to_string(path) {
                parse_env_file(&contents);
            }
            break;
        }
    }
}

/// Parse env file contents and set environment variables (only if not already set).
/// Supports formats:
/// - `KEY=value`
/// - `export KEY=value`
/// - `KEY="quoted value"`
/// - `KEY='single quoted'`
/// - Comments starting with #
pub fn parse_env_file(contents: &str) {
    for (key, value) in parse_env_pairs(contents) {
        if std::env::var(&key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

/// Extract `(key, value)` pairs from env file contents without touching the environment
pub fn parse_env_pairs(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.strip_prefix("export ").unwrap_or(line))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_pairs() {
        let contents = r#"
            # learner overrides
            ADOPT__LEARNER__BATCH_SIZE=64
            export ADOPT__LOGGING__LEVEL="debug"
            ADOPT__CHECKPOINT__PATH='/var/lib/adopt/dqn.json'
            =orphan
            not a pair
        "#;

        let pairs = parse_env_pairs(contents);
        assert_eq!(
            pairs,
            vec![
                ("ADOPT__LEARNER__BATCH_SIZE".to_string(), "64".to_string()),
                ("ADOPT__LOGGING__LEVEL".to_string(), "debug".to_string()),
                (
                    "ADOPT__CHECKPOINT__PATH".to_string(),
                    "/var/lib/adopt/dqn.json".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_parse_env_file_does_not_override() {
        std::env::set_var("TEST_ADOPT_PRESET", "original");
        std::env::remove_var("TEST_ADOPT_FRESH");

        parse_env_file("TEST_ADOPT_PRESET=changed\nTEST_ADOPT_FRESH=value");

        assert_eq!(std::env::var("TEST_ADOPT_PRESET").unwrap(), "original");
        assert_eq!(std::env::var("TEST_ADOPT_FRESH").unwrap(), "value");

        std::env::remove_var("TEST_ADOPT_PRESET");
        std::env::remove_var("TEST_ADOPT_FRESH");
    }
}
