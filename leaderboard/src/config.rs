use crate::model::Source;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Timeout cannot be 0: {0}")]
    ZeroTimeout(&'static str),

    #[error("Cache TTL cannot be 0: {0}")]
    ZeroTtl(&'static str),

    #[error("Unsupported relay scheme: {0}")]
    InvalidRelayScheme(String),
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct SourceConfig {
    /// Well-known address of the source's discovery endpoint
    pub bootstrap_url: Url,
}

/// How backend clusters are reached.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Per-request HTTP timeout, applied by the pooled client
    pub http_timeout_secs: u64,
    /// Deadline for one source's fetch inside an aggregated query,
    /// including relay discovery if it has to happen first
    pub fetch_timeout_secs: u64,
    /// Scheme used when a discovered relay address is a bare host
    pub relay_scheme: String,
    /// Overrides of the default bootstrap addresses. Sources without an
    /// entry use `http://init-{source}.turbo.trackmania.com/game/request.php`.
    pub sources: BTreeMap<Source, SourceConfig>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            http_timeout_secs: 10,
            fetch_timeout_secs: 15,
            relay_scheme: "https".into(),
            sources: BTreeMap::new(),
        }
    }
}

impl BackendConfig {
    pub fn bootstrap_url(&self, source: Source) -> String {
        self.sources
            .get(&source)
            .map(|config| config.bootstrap_url.to_string())
            .unwrap_or_else(|| source.default_bootstrap_url())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.http_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("http_timeout_secs"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("fetch_timeout_secs"));
        }
        if !matches!(self.relay_scheme.as_str(), "http" | "https") {
            return Err(ValidationError::InvalidRelayScheme(
                self.relay_scheme.clone(),
            ));
        }
        Ok(())
    }
}

/// Lifetimes of the in-memory cache entries.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub relay_ttl_secs: u64,
    pub zones_ttl_secs: u64,
    pub records_ttl_secs: u64,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            relay_ttl_secs: 24 * 60 * 60,
            zones_ttl_secs: 24 * 60 * 60,
            records_ttl_secs: 5 * 60,
            max_capacity: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn relay_ttl(&self) -> Duration {
        Duration::from_secs(self.relay_ttl_secs)
    }

    pub fn zones_ttl(&self) -> Duration {
        Duration::from_secs(self.zones_ttl_secs)
    }

    pub fn records_ttl(&self) -> Duration {
        Duration::from_secs(self.records_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, ttl) in [
            ("relay_ttl_secs", self.relay_ttl_secs),
            ("zones_ttl_secs", self.zones_ttl_secs),
            ("records_ttl_secs", self.records_ttl_secs),
        ] {
            if ttl == 0 {
                return Err(ValidationError::ZeroTtl(name));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.backend.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}
