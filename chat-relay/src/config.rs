use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum UpstreamConfigError {
    #[error("upstream timeout must be greater than zero")]
    ZeroTimeout,
    #[error("upstream model must not be empty")]
    EmptyModel,
    #[error("unsupported upstream URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Settings for the OpenAI-compatible completion endpoint.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Full URL of the chat completion endpoint.
    pub url: Url,
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer credential. Chat requests are rejected while it is unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "deepseek-chat".into()
}

fn default_timeout_secs() -> u64 {
    60
}

impl UpstreamConfig {
    pub fn new(url: Url) -> Self {
        UpstreamConfig {
            url,
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn validate(&self) -> Result<(), UpstreamConfigError> {
        if self.timeout_secs == 0 {
            return Err(UpstreamConfigError::ZeroTimeout);
        }
        if self.model.trim().is_empty() {
            return Err(UpstreamConfigError::EmptyModel);
        }
        match self.url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(UpstreamConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The credential, if one is set and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
