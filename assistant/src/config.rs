use chat_relay::config::{UpstreamConfig, UpstreamConfigError};
use documents::config::DocumentsConfig;
use sentry::types::{Dsn, ParseDsnError};
use serde::Deserialize;
use shared::config::{Listener, ListenerError};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

#[derive(Deserialize, Debug)]
pub struct MetricsConfig {
    pub statsd_host: String,
    #[serde(default = "default_statsd_port")]
    pub statsd_port: u16,
}

fn default_statsd_port() -> u16 {
    8125
}

#[derive(Deserialize, Debug)]
pub struct LoggingConfig {
    #[serde(default)]
    pub sentry_dsn: Option<String>,
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            sentry_dsn: None,
            level: default_level(),
        }
    }
}

impl LoggingConfig {
    pub fn dsn(&self) -> Result<Option<Dsn>, ParseDsnError> {
        match self.sentry_dsn.as_deref().map(str::trim) {
            Some(dsn) if !dsn.is_empty() => Dsn::from_str(dsn).map(Some),
            _ => Ok(None),
        }
    }
}

fn default_access_keys() -> Vec<String> {
    vec!["demo-key-123".into()]
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default = "default_access_keys")]
    pub access_keys: Vec<String>,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads and validates the configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listener.validate()?;
        self.upstream.validate()?;
        if self.access_keys.iter().all(|key| key.trim().is_empty()) {
            return Err(ConfigError::NoAccessKeys);
        }
        self.logging.dsn()?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid listener: {0}")]
    Listener(#[from] ListenerError),
    #[error("invalid upstream: {0}")]
    Upstream(#[from] UpstreamConfigError),
    #[error("at least one access key must be configured")]
    NoAccessKeys,
    #[error("invalid sentry DSN: {0}")]
    SentryDsn(#[from] ParseDsnError),
}
