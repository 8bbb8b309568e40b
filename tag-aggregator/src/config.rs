//! Engine configuration.
//!
//! Values come from defaults, then an optional TOML file, then the
//! environment. The binary applies CLI flags last.

use crate::types::{AggregatorError, FetchConfig, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    E621,
    FurAffinity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Minimum gap between two requests to this source
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_throttle_ms() -> u64 {
    1000
}

fn default_timeout_seconds() -> u64 {
    30
}

impl SourceConfig {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            base_url: None,
            throttle_ms: default_throttle_ms(),
            page_size: None,
            user_agent: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            timeout_seconds: self.timeout_seconds,
            ..defaults
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-source item cap for one-shot random queries
    pub random_max: usize,
    /// Per-source item cap for each subscription refresh
    pub subscription_max: usize,
    /// Cache cap per source; the total cap is this times the source count
    pub cache_max: usize,
    /// Delay after each subscription and between poll ticks
    pub poller_latency_ms: u64,
    pub max_reply_lines: usize,
    pub database_url: Option<String>,
    /// Registration order matters: it drives concatenation and interleaving.
    pub sources: Vec<SourceConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            random_max: 120,
            subscription_max: 72,
            cache_max: 300,
            poller_latency_ms: 10_000,
            max_reply_lines: 5,
            database_url: None,
            sources: vec![
                SourceConfig::new(SourceKind::E621),
                SourceConfig::new(SourceKind::FurAffinity),
            ],
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path` if given, otherwise start from defaults, then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let content = std::fs::read_to_string(path)?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// `DATABASE_URL` sets the store; `E621_USER_AGENT` (or the older
    /// `E621_USER_AGENT_HEADER`) fills in e621 sources that have no explicit
    /// user agent.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(agent) = lookup("E621_USER_AGENT").or_else(|| lookup("E621_USER_AGENT_HEADER")) {
            for source in self.sources.iter_mut().filter(|s| s.kind == SourceKind::E621) {
                if source.user_agent.is_none() {
                    source.user_agent = Some(agent.clone());
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(AggregatorError::Config("at least one source must be configured".to_string()));
        }
        if self.cache_max == 0 {
            return Err(AggregatorError::Config("cache_max must be positive".to_string()));
        }
        // a smaller cache cannot hold one fetch, so the surplus would be re-sent every tick
        if self.cache_max < self.subscription_max {
            return Err(AggregatorError::Config(format!(
                "cache_max ({}) must be at least subscription_max ({})",
                self.cache_max, self.subscription_max
            )));
        }
        if self.max_reply_lines == 0 {
            return Err(AggregatorError::Config("max_reply_lines must be positive".to_string()));
        }
        for source in &self.sources {
            if let Some(base_url) = &source.base_url {
                let parsed = Url::parse(base_url)?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(AggregatorError::Config(format!("unsupported scheme in {}", base_url)));
                }
            }
            if source.page_size == Some(0) {
                return Err(AggregatorError::Config(format!("{:?} page_size must be positive", source.kind)));
            }
        }
        Ok(())
    }

    pub fn poller_latency(&self) -> Duration {
        Duration::from_millis(self.poller_latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_historical_tuning() {
        let config = EngineConfig::default();
        assert_eq!(config.random_max, 120);
        assert_eq!(config.subscription_max, 72);
        assert_eq!(config.cache_max, 300);
        assert_eq!(config.poller_latency(), Duration::from_secs(10));
        assert_eq!(config.max_reply_lines, 5);
        let kinds: Vec<_> = config.sources.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SourceKind::E621, SourceKind::FurAffinity]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_overrides_only_given_fields() {
        let config = EngineConfig::from_toml_str(
            r#"
            cache_max = 50
            poller_latency_ms = 1000

            [[sources]]
            kind = "furaffinity"
            base_url = "http://faexport.example.net"
            throttle_ms = 2500
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_max, 50);
        assert_eq!(config.subscription_max, 72);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].kind, SourceKind::FurAffinity);
        assert_eq!(config.sources[0].throttle(), Duration::from_millis(2500));
        assert_eq!(config.sources[0].timeout_seconds, 30);
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_reply_lines = 8").unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.max_reply_lines, 8);
    }

    #[test]
    fn env_sets_database_and_e621_agent() {
        let mut config = EngineConfig::default();
        config.apply_env(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/tags".to_string()),
            "E621_USER_AGENT" => Some("tagbot/1.0 (by someone)".to_string()),
            _ => None,
        });

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/tags"));
        assert_eq!(config.sources[0].fetch_config().user_agent, "tagbot/1.0 (by someone)");
        assert_eq!(config.sources[1].user_agent, None);
    }

    #[test]
    fn env_accepts_legacy_agent_variable() {
        let mut config = EngineConfig::default();
        config.apply_env(|key| match key {
            "E621_USER_AGENT_HEADER" => Some("oldbot/0.9".to_string()),
            _ => None,
        });
        assert_eq!(config.sources[0].fetch_config().user_agent, "oldbot/0.9");

        let mut config = EngineConfig::default();
        config.apply_env(|key| match key {
            "E621_USER_AGENT" => Some("newbot/1.0".to_string()),
            "E621_USER_AGENT_HEADER" => Some("oldbot/0.9".to_string()),
            _ => None,
        });
        assert_eq!(config.sources[0].fetch_config().user_agent, "newbot/1.0");
    }

    #[test]
    fn cache_must_hold_a_full_subscription_fetch() {
        let mut config = EngineConfig::default();
        config.cache_max = 1;
        config.subscription_max = 2;
        assert!(matches!(config.validate(), Err(AggregatorError::Config(_))));

        config.cache_max = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.cache_max = 0;
        assert!(matches!(config.validate(), Err(AggregatorError::Config(_))));

        let mut config = EngineConfig::default();
        config.sources.clear();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.sources[0].base_url = Some("ftp://e621.net".to_string());
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.sources[1].base_url = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(AggregatorError::InvalidUrl(_))));
    }
}
