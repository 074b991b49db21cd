//! In-process completion endpoint for tests.

use crate::config::UpstreamConfig;
use crate::relay::ChatRelay;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use futures::stream;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub struct MockUpstream {
    base: Url,
    calls: Arc<AtomicUsize>,
    endless_dropped: Arc<AtomicBool>,
}

impl MockUpstream {
    /// Relay pointed at `path` on the mock, with a one second timeout.
    pub fn relay(&self, path: &str) -> ChatRelay {
        Self::relay_for(self.base.join(path).unwrap())
    }

    pub fn relay_for(url: Url) -> ChatRelay {
        ChatRelay::new(UpstreamConfig {
            url,
            model: "test-model".into(),
            api_key: Some("sk-test".into()),
            timeout_secs: 1,
        })
        .unwrap()
    }

    /// Number of requests the mock has received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether the mock has dropped the body of an `/endless` response,
    /// which happens once the client closes the connection.
    pub fn endless_dropped(&self) -> bool {
        self.endless_dropped.load(Ordering::SeqCst)
    }
}

pub async fn start_mock_upstream() -> MockUpstream {
    let calls = Arc::new(AtomicUsize::new(0));
    let endless_dropped = Arc::new(AtomicBool::new(false));
    let app = Router::new()
        .route("/endless", post(endless).with_state(endless_dropped.clone()))
        .route("/stream", post(events))
        .route("/malformed", post(malformed))
        .route("/stall", post(stall))
        .route("/slow", post(slow))
        .route("/error", post(error))
        .route("/limited", post(limited))
        .route("/echo", post(echo))
        .route("/empty", post(empty))
        .layer(middleware::from_fn_with_state(calls.clone(), count_calls));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream {
        base: Url::parse(&format!("http://{addr}/")).unwrap(),
        calls,
        endless_dropped,
    }
}

/// URL of a port nothing listens on.
pub async fn refused_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/v1/chat/completions")).unwrap()
}

async fn count_calls(
    State(calls): State<Arc<AtomicUsize>>,
    request: Request,
    next: Next,
) -> Response {
    calls.fetch_add(1, Ordering::SeqCst);
    next.run(request).await
}

fn event_stream(body: &'static str) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn events() -> Response {
    event_stream("data: {\"id\":1}\n\ndata: {\"id\":2}\r\n\r\ndata: [DONE]\n\n")
}

async fn malformed() -> Response {
    event_stream("data: {oops\n\n: keep-alive\n\ndata: [DONE]\n\n")
}

async fn stall() -> Response {
    let first = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(b"data: {\"id\":1}\n\n")) });
    let body = Body::from_stream(first.chain(stream::pending()));
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

/// Sets the flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Numbered events every 10ms until the body is dropped.
async fn endless(State(dropped): State<Arc<AtomicBool>>) -> Response {
    let events = stream::unfold((0u64, DropFlag(dropped)), |(n, flag)| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let event = Bytes::from(format!("data: {n}\n\n"));
        Some((Ok::<_, Infallible>(event), (n + 1, flag)))
    });
    ([(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(events)).into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(5)).await;
    event_stream("data: [DONE]\n\n")
}

async fn error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream \"exploded\"").into_response()
}

async fn limited() -> Response {
    (StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response()
}

/// Answers with the received body as content and the credential as usage.
async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": body.to_string()}}],
        "usage": {"authorization": authorization}
    }))
}

async fn empty() -> Json<Value> {
    Json(json!({}))
}
