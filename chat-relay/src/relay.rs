use crate::config::UpstreamConfig;
use crate::error::RelayError;
use crate::metrics_defs::{RELAY_REQUESTS, RELAY_UPSTREAM_DURATION, RELAY_UPSTREAM_ERRORS};
use crate::request::{ChatRequest, CompletionRequest};
use crate::stream::{self, LineStream};
use serde::Serialize;
use serde_json::{Map, Value};
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Result of a synchronous chat request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Value,
}

impl ChatCompletion {
    /// Takes `choices[0].message.content` and `usage` out of a completion
    /// response, defaulting to an empty string and an empty object.
    pub fn from_response(body: &Value) -> Self {
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let usage = body
            .get("usage")
            .filter(|usage| !usage.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        ChatCompletion { content, usage }
    }
}

/// Forwards chat requests to the configured completion endpoint.
///
/// Cloning is cheap; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct ChatRelay {
    client: reqwest::Client,
    config: Arc<UpstreamConfig>,
}

impl ChatRelay {
    pub fn new(config: UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .build()?;
        Ok(ChatRelay {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub fn api_key_configured(&self) -> bool {
        self.config.api_key().is_some()
    }

    /// Opens an upstream event stream and relays it line by line.
    ///
    /// Only validation failures are returned as errors. Nothing is sent
    /// upstream until the returned stream is first polled, and dropping the
    /// stream closes the upstream connection. Failures after that point end
    /// the stream with a single `data: {"error": ...}` event.
    pub fn stream_chat(&self, request: &ChatRequest) -> Result<LineStream, RelayError> {
        let pending = self.prepare(request, true)?;
        counter!(RELAY_REQUESTS, "mode" => "stream").increment(1);
        Ok(stream::relay_lines(pending, self.config.timeout()))
    }

    /// Sends a non-streaming completion request and waits for the answer.
    pub async fn sync_chat(&self, request: &ChatRequest) -> Result<ChatCompletion, RelayError> {
        let pending = self.prepare(request, false)?;
        counter!(RELAY_REQUESTS, "mode" => "sync").increment(1);

        let result = self.complete(pending).await;
        if let Err(e) = &result {
            record_failure("sync", e);
        }
        result
    }

    async fn complete(
        &self,
        pending: reqwest::RequestBuilder,
    ) -> Result<ChatCompletion, RelayError> {
        let timeout_after = self.config.timeout();
        let response = open_upstream(pending, timeout_after, "sync").await?;
        let body: Value = timeout(timeout_after, response.json())
            .await
            .map_err(|_| RelayError::Timeout)?
            .map_err(|e| RelayError::from_reqwest(&e))?;
        Ok(ChatCompletion::from_response(&body))
    }

    /// Checks the request and builds the upstream call. The credential is
    /// checked before the messages.
    fn prepare(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::RequestBuilder, RelayError> {
        let api_key = self.config.api_key().ok_or(RelayError::MissingApiKey)?;
        if request.messages.is_empty() {
            return Err(RelayError::EmptyMessages);
        }

        tracing::debug!(
            messages = request.messages.len(),
            stream,
            model = %self.config.model,
            "Forwarding chat request"
        );
        Ok(self
            .client
            .post(self.config.url.clone())
            .bearer_auth(api_key)
            .json(&CompletionRequest::new(&self.config.model, request, stream)))
    }
}

/// Sends the request and waits for response headers. A non-success status is
/// turned into [`RelayError::Upstream`] carrying the raw response body.
pub(crate) async fn open_upstream(
    pending: reqwest::RequestBuilder,
    timeout_after: Duration,
    mode: &'static str,
) -> Result<reqwest::Response, RelayError> {
    let started = Instant::now();
    let response = timeout(timeout_after, pending.send())
        .await
        .map_err(|_| RelayError::Timeout)?
        .map_err(|e| RelayError::from_reqwest(&e))?;
    histogram!(RELAY_UPSTREAM_DURATION, "mode" => mode).record(started.elapsed().as_secs_f64());

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = timeout(timeout_after, response.text())
        .await
        .map_err(|_| RelayError::Timeout)?
        .map_err(|e| RelayError::from_reqwest(&e))?;
    Err(RelayError::Upstream { status, body })
}

pub(crate) fn record_failure(mode: &'static str, error: &RelayError) {
    counter!(RELAY_UPSTREAM_ERRORS, "mode" => mode, "kind" => error.kind()).increment(1);
    match error {
        RelayError::Upstream { status, body } => {
            tracing::warn!(mode, status = status.as_u16(), body = %body, "Upstream rejected chat request");
        }
        RelayError::Connection(detail) => {
            tracing::warn!(mode, error = %detail, "Could not reach upstream");
        }
        other => {
            tracing::warn!(mode, error = %other, "Chat relay failed");
        }
    }
}
