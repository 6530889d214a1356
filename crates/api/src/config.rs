//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::RetryConfig;
use projections::SynchronizerConfig;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset selects the in-memory store
/// - `COMMAND_MAX_ATTEMPTS`: attempts per command on version conflicts (default: `5`)
/// - `PROJECTION_POLL_INTERVAL_MS`: synchronizer poll interval (default: `250`)
/// - `PROJECTION_BATCH_SIZE`: events read per synchronizer request (default: `256`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub command_max_attempts: u32,
    pub projection_poll_interval: Duration,
    pub projection_batch_size: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        fn parse_with<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_with(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            command_max_attempts: parse_with(&lookup, "COMMAND_MAX_ATTEMPTS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.command_max_attempts),
            projection_poll_interval: parse_with(&lookup, "PROJECTION_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.projection_poll_interval),
            projection_batch_size: parse_with(&lookup, "PROJECTION_BATCH_SIZE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.projection_batch_size),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Retry policy for the command dispatcher.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.command_max_attempts,
            ..RetryConfig::default()
        }
    }

    /// Tuning for the projection synchronizer.
    pub fn synchronizer(&self) -> SynchronizerConfig {
        SynchronizerConfig {
            batch_size: self.projection_batch_size,
            poll_interval: self.projection_poll_interval,
            ..SynchronizerConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            command_max_attempts: 5,
            projection_poll_interval: Duration::from_millis(250),
            projection_batch_size: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.database_url, None);
        assert_eq!(config.command_max_attempts, 5);
        assert_eq!(config.projection_poll_interval, Duration::from_millis(250));
        assert_eq!(config.projection_batch_size, 256);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_addr_default() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_empty_lookup_uses_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.command_max_attempts, 5);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = from_pairs(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/inventory"),
            ("COMMAND_MAX_ATTEMPTS", "9"),
            ("PROJECTION_POLL_INTERVAL_MS", "40"),
            ("PROJECTION_BATCH_SIZE", "32"),
        ]);

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/inventory")
        );
        assert_eq!(config.retry().max_attempts, 9);
        assert_eq!(config.synchronizer().poll_interval, Duration::from_millis(40));
        assert_eq!(config.synchronizer().batch_size, 32);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("COMMAND_MAX_ATTEMPTS", "0"),
            ("PROJECTION_BATCH_SIZE", "-3"),
            ("DATABASE_URL", "  "),
        ]);

        assert_eq!(config.port, 3000);
        assert_eq!(config.command_max_attempts, 5);
        assert_eq!(config.projection_batch_size, 256);
        assert!(config.database_url.is_none());
    }
}
