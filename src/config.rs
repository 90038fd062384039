//! Configuration file parser for ~/.config/chapel/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheme and host used to build CSV export URLs.
    pub export_host: String,

    /// Connect, read and overall timeout for one tab download, in seconds.
    pub request_timeout_secs: u64,

    /// Largest accepted export body, in bytes.
    pub max_response_bytes: usize,

    /// Sub-sheet index of the events tab.
    pub events_gid: u64,

    /// Sub-sheet index of the news tab.
    pub news_gid: u64,

    /// Sub-sheet index of the profile tab.
    pub profile_gid: u64,

    /// Background refresh interval in minutes. 0 = manual refresh only.
    pub refresh_interval_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export_host: "https://docs.google.com".to_string(),
            request_timeout_secs: 30,
            max_response_bytes: 10 * 1024 * 1024,
            events_gid: 0,
            news_gid: 0,
            profile_gid: 0,
            refresh_interval_minutes: 30,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Longest background refresh interval (one week).
    pub const MAX_REFRESH_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

    const KNOWN_KEYS: [&'static str; 7] = [
        "export_host",
        "request_timeout_secs",
        "max_response_bytes",
        "events_gid",
        "news_gid",
        "profile_gid",
        "refresh_interval_minutes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading so a corrupted file cannot exhaust memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        if config.refresh_interval_minutes > Self::MAX_REFRESH_INTERVAL_MINUTES {
            tracing::warn!(
                refresh_interval_minutes = config.refresh_interval_minutes,
                max = Self::MAX_REFRESH_INTERVAL_MINUTES,
                "Refresh interval too long, capping"
            );
        }
        tracing::info!(
            export_host = %config.export_host,
            refresh_interval_minutes = config.refresh_interval_minutes,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Background refresh period, capped at one week. `None` when disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        let minutes = self
            .refresh_interval_minutes
            .min(Self::MAX_REFRESH_INTERVAL_MINUTES);
        (minutes > 0).then(|| Duration::from_secs(minutes.saturating_mul(60)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export_host, "https://docs.google.com");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.events_gid, 0);
        assert_eq!(config.news_gid, 0);
        assert_eq!(config.profile_gid, 0);
        assert_eq!(config.refresh_interval_minutes, 30);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/chapel_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("chapel_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::parse("news_gid = 1234\n").unwrap();
        assert_eq!(config.news_gid, 1234);
        assert_eq!(config.events_gid, 0);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
export_host = "http://127.0.0.1:9000"
request_timeout_secs = 10
max_response_bytes = 2048
events_gid = 0
news_gid = 111
profile_gid = 222
refresh_interval_minutes = 0
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.export_host, "http://127.0.0.1:9000");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.max_response_bytes, 2048);
        assert_eq!(config.news_gid, 111);
        assert_eq!(config.profile_gid, 222);
        assert_eq!(config.refresh_interval_minutes, 0);
    }

    #[test]
    fn test_refresh_interval_is_capped() {
        let config = Config::parse(&format!("refresh_interval_minutes = {}\n", i64::MAX)).unwrap();
        assert_eq!(
            config.refresh_interval(),
            Some(Duration::from_secs(Config::MAX_REFRESH_INTERVAL_MINUTES * 60))
        );

        assert_eq!(
            Config::default().refresh_interval(),
            Some(Duration::from_secs(30 * 60))
        );
        let disabled = Config {
            refresh_interval_minutes: 0,
            ..Config::default()
        };
        assert_eq!(disabled.refresh_interval(), None);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("news_gid = 5\ntotally_fake_key = \"x\"\n").unwrap();
        assert_eq!(config.news_gid, 5);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("events_gid = \"first\"\n").is_err());
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        assert_eq!(Config::parse("   \n  \n  ").unwrap(), Config::default());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("chapel_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
