use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Google News "headlines" topic for Korea, used when no `rss_url` is configured.
pub const DEFAULT_RSS_URL: &str = "https://news.google.com/rss/topics/CAAqJggKIiBDQkFTRWdvSUwyMHZNRFZxYUdjU0FtdHZHZ0pMVWlnQVAB?hl=ko&gl=KR&ceid=KR%3Ako";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub collector: CollectorConfig,
}

fn default_database_url() -> String {
    "sqlite:headlines.db?mode=rwc".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub rss_url: Option<String>,
    /// Delay between the end of one run and the start of the next, in seconds
    #[serde(default = "default_fixed_delay_secs")]
    pub fixed_delay_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub pub_date_fallback: PubDatePolicy,
}

fn default_enabled() -> bool {
    true
}

fn default_fixed_delay_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// What the parser does with an entry whose `pubDate` is missing or unparseable.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PubDatePolicy {
    /// Drop the entry and every article inside it.
    Skip,
    /// Keep the entry and stamp it with the current time (UTC).
    #[default]
    Now,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            rss_url: None,
            fixed_delay_secs: default_fixed_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            pub_date_fallback: PubDatePolicy::default(),
        }
    }
}

impl CollectorConfig {
    /// The configured feed URL, or the built-in one when unset or blank.
    pub fn resolved_rss_url(&self) -> &str {
        match self.rss_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url.trim(),
            _ => DEFAULT_RSS_URL,
        }
    }

    pub fn fixed_delay(&self) -> Duration {
        Duration::from_secs(self.fixed_delay_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            bind_address: default_bind_address(),
            collector: CollectorConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();

        assert_eq!(config.database_url, "sqlite:headlines.db?mode=rwc");
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert!(config.collector.enabled);
        assert_eq!(config.collector.fixed_delay_secs, 300);
        assert_eq!(config.collector.request_timeout_secs, 30);
        assert_eq!(config.collector.pub_date_fallback, PubDatePolicy::Now);
        assert_eq!(config.collector.resolved_rss_url(), DEFAULT_RSS_URL);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            database_url = "sqlite::memory:"
            bind_address = "127.0.0.1:8080"

            [collector]
            enabled = false
            rss_url = "https://example.com/rss"
            fixed_delay_secs = 60
            request_timeout_secs = 5
            pub_date_fallback = "skip"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert!(!config.collector.enabled);
        assert_eq!(config.collector.resolved_rss_url(), "https://example.com/rss");
        assert_eq!(config.collector.fixed_delay(), Duration::from_secs(60));
        assert_eq!(config.collector.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.collector.pub_date_fallback, PubDatePolicy::Skip);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/headlines.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let result = Config::from_str("this is not valid toml {{{");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_pub_date_policy_is_rejected() {
        let content = r#"
            [collector]
            pub_date_fallback = "sometimes"
        "#;

        assert!(Config::from_str(content).is_err());
    }

    #[test]
    fn test_blank_rss_url_falls_back_to_default() {
        let content = r#"
            [collector]
            rss_url = "   "
        "#;

        let config = Config::from_str(content).unwrap();
        assert_eq!(config.collector.resolved_rss_url(), DEFAULT_RSS_URL);
    }

    #[test]
    fn test_zero_durations_are_clamped() {
        let content = r#"
            [collector]
            fixed_delay_secs = 0
            request_timeout_secs = 0
        "#;

        let config = Config::from_str(content).unwrap();
        assert_eq!(config.collector.fixed_delay(), Duration::from_secs(1));
        assert_eq!(config.collector.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_collector_section_keeps_other_defaults() {
        let content = r#"
            [collector]
            fixed_delay_secs = 10
        "#;

        let config = Config::from_str(content).unwrap();
        assert!(config.collector.enabled);
        assert_eq!(config.collector.fixed_delay_secs, 10);
        assert_eq!(config.collector.request_timeout_secs, 30);
    }
}
