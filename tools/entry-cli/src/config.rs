//! CLI configuration.

use anyhow::{Context, Result};
use entry_core::EntryConfig;
use serde::{Deserialize, Serialize};

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Entry point configuration.
    #[serde(default)]
    pub entry: EntryConfig,

    /// Log output configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(path, &content)
    }

    /// Parse config content, choosing the format from the file extension.
    pub fn parse(path: &str, content: &str) -> Result<Self> {
        if path.ends_with(".json") {
            serde_json::from_str(content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_toml() {
        let config = CliConfig::parse(
            "entry.toml",
            r#"
[entry]
stream_timeout_ms = 2000
comment = "<!-- edge -->"
extra_crawler_patterns = ["acme-monitor"]

[logging]
filter = "entry=debug"
"#,
        )
        .unwrap();

        assert_eq!(config.entry.stream_timeout(), Duration::from_secs(2));
        assert_eq!(config.entry.abort_delay(), Duration::from_secs(3));
        assert_eq!(config.entry.comment, "<!-- edge -->");
        assert_eq!(config.entry.extra_crawler_patterns, vec!["acme-monitor"]);
        assert_eq!(config.entry.max_buffer_bytes, 8192);
        assert_eq!(config.logging.filter, "entry=debug");
    }

    #[test]
    fn test_parse_json() {
        let config =
            CliConfig::parse("entry.json", r#"{"entry": {"max_buffer_bytes": 64}}"#).unwrap();

        assert_eq!(config.entry.max_buffer_bytes, 64);
        assert_eq!(config.entry.content_type, "text/html");
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CliConfig::parse("entry.toml", "").unwrap();
        assert_eq!(config.entry, EntryConfig::default());
    }

    #[test]
    fn test_invalid_config_names_file() {
        let err = CliConfig::parse("broken.toml", "[entry\n").unwrap_err();
        assert!(format!("{:#}", err).contains("broken.toml"));
    }
}
