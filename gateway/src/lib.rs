//! HTTP front of the assistant.
//!
//! Public routes are `/api/health` and `/api/verify`. Every other route
//! requires an access key and is served by the document resolver or the chat
//! relay.

mod api;
pub mod auth;
mod errors;
pub mod metrics_defs;

pub use api::{AppState, GatewayError, router, serve};
pub use auth::AccessKeyValidator;
pub use errors::ApiError;
