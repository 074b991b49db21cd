use crate::auth::{AccessKeyValidator, extract_key, require_access_key};
use crate::errors::ApiError;
use crate::metrics_defs::{GATEWAY_REQUEST_DURATION, GATEWAY_REQUESTS};
use axum::body::{Body, Bytes};
use axum::extract::{MatchedPath, Query, Request, State};
use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chat_relay::{ChatCompletion, ChatRelay, ChatRequest, RelayError};
use documents::{ConfigResolver, ContextDocument, ToolsPromptDocument};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use shared::config::Listener;
use shared::{counter, histogram};
use std::any::Any;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

const VERSION: &str = "1.0.0";

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared, immutable state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<AccessKeyValidator>,
    pub resolver: Arc<ConfigResolver>,
    pub relay: ChatRelay,
}

impl AppState {
    pub fn new(validator: AccessKeyValidator, resolver: ConfigResolver, relay: ChatRelay) -> Self {
        AppState {
            validator: Arc::new(validator),
            resolver: Arc::new(resolver),
            relay,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/context", get(context))
        .route("/api/tools_prompt", get(tools_prompt))
        .route("/api/chat", post(chat))
        .route("/api/chat/sync", post(chat_sync))
        .route_layer(middleware::from_fn_with_state(
            state.validator.clone(),
            require_access_key,
        ));

    Router::new()
        .route("/api/verify", post(verify))
        .route("/api/health", get(health))
        .merge(protected)
        .fallback(not_found)
        .layer(middleware::from_fn(track_requests))
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

/// Serves the API until `shutdown` resolves, then drains open connections.
pub async fn serve<F>(listener: &Listener, state: AppState, shutdown: F) -> Result<(), GatewayError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    let listener = TcpListener::bind(listener.addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    counter!(GATEWAY_REQUESTS, "route" => route.clone(), "status" => status.clone()).increment(1);
    histogram!(GATEWAY_REQUEST_DURATION, "route" => route, "status" => status)
        .record(started.elapsed().as_secs_f64());
    response
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Handler panicked");
    ApiError::Internal.into_response()
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    api_key_configured: bool,
    version: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        api_key_configured: state.relay.api_key_configured(),
        version: VERSION,
    })
}

#[derive(Deserialize)]
struct VerifyRequest {
    #[serde(default)]
    key: Option<String>,
}

#[derive(Serialize)]
struct VerifyResponse {
    valid: bool,
    message: &'static str,
}

/// Checks a key from the headers or, failing that, from the JSON body.
async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<VerifyResponse>) {
    let valid = match extract_key(&headers) {
        Some(key) => state.validator.validate(Some(key)),
        None => {
            let body_key = serde_json::from_slice::<VerifyRequest>(&body)
                .ok()
                .and_then(|request| request.key);
            state.validator.validate(body_key.as_deref())
        }
    };

    if valid {
        let response = VerifyResponse {
            valid: true,
            message: "验证成功",
        };
        (StatusCode::OK, Json(response))
    } else {
        let response = VerifyResponse {
            valid: false,
            message: "秘钥无效或已过期",
        };
        (StatusCode::UNAUTHORIZED, Json(response))
    }
}

/// Query pairs in request order. Repeated keys are allowed.
type QueryPairs = Query<Vec<(String, String)>>;

/// The first value given for `name`, if any.
fn first_param<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

async fn context(State(state): State<AppState>, Query(pairs): QueryPairs) -> Json<ContextDocument> {
    let report_id = first_param(&pairs, "report_id");
    Json(state.resolver.context(report_id).await)
}

async fn tools_prompt(
    State(state): State<AppState>,
    Query(pairs): QueryPairs,
) -> Json<ToolsPromptDocument> {
    let prompt_id = first_param(&pairs, "prompt_id");
    Json(state.resolver.tools_prompt(prompt_id).await)
}

/// The upstream credential is checked before the body is looked at.
fn parse_chat_request(relay: &ChatRelay, body: &[u8]) -> Result<ChatRequest, ApiError> {
    if !relay.api_key_configured() {
        return Err(RelayError::MissingApiKey.into());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request = parse_chat_request(&state.relay, &body)?;
    let lines = state.relay.stream_chat(&request)?;

    let headers = [
        (header::CONTENT_TYPE, "text/event-stream"),
        (header::CACHE_CONTROL, "no-cache"),
        (header::CONNECTION, "keep-alive"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
    ];
    let body = Body::from_stream(lines.map(Ok::<_, Infallible>));
    Ok((headers, body).into_response())
}

async fn chat_sync(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatCompletion>, ApiError> {
    let request = parse_chat_request(&state.relay, &body)?;
    Ok(Json(state.relay.sync_chat(&request).await?))
}
