use serde::Deserialize;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ListenerError {
    #[error("port cannot be 0")]
    InvalidPort,
    #[error("host cannot be empty")]
    EmptyHost,
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 8100,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ListenerError> {
        if self.port == 0 {
            return Err(ListenerError::InvalidPort);
        }
        if self.host.trim().is_empty() {
            return Err(ListenerError::EmptyHost);
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
