//! Configuration file handling (`gleaner.toml`).
//!
//! Only the settings the core engine consumes live here: the global
//! auto-update policy driving the scheduler and the message-list display
//! preferences. Missing file or missing keys fall back to defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::messages::MessageHighlighter;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feeds: FeedsConfig,
    pub messages: MessagesConfig,
}

/// Global auto-update policy. Feeds in `GlobalInterval` mode are scheduled
/// whenever the global countdown elapses; the countdown is measured in
/// scheduler passes of `tick_secs` each.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    pub auto_update_enabled: bool,
    /// Number of scheduler passes between global updates.
    pub auto_update_interval: i64,
    /// Seconds between scheduler passes.
    pub tick_secs: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            auto_update_enabled: true,
            auto_update_interval: 15,
            tick_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Render message dates with `custom_date_format` instead of the locale
    /// default.
    pub use_custom_date: bool,
    /// chrono format string, e.g. `"%Y-%m-%d %H:%M"`.
    pub custom_date_format: String,
    pub highlighter: MessageHighlighter,
}

impl Config {
    /// Load configuration from a TOML file. A missing file yields defaults;
    /// a malformed file is an error (silently ignoring it would hide typos).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = Config::load(Path::new("/nonexistent/gleaner.toml")).unwrap();
        assert!(config.feeds.auto_update_enabled);
        assert_eq!(config.feeds.auto_update_interval, 15);
        assert!(!config.messages.use_custom_date);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [feeds]
            auto_update_interval = 5
        "#,
        )
        .unwrap();
        assert_eq!(config.feeds.auto_update_interval, 5);
        assert!(config.feeds.auto_update_enabled);
        assert_eq!(config.messages.highlighter, MessageHighlighter::NoHighlighting);
    }
}
