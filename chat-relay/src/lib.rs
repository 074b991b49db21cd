//! Relays chat requests to an OpenAI-compatible completion endpoint.
//!
//! Two modes are supported. [`ChatRelay::stream_chat`] forwards the upstream
//! event stream line by line and reports failures in-band, as a final
//! `data: {"error": ...}` event. [`ChatRelay::sync_chat`] waits for the full
//! completion and reports failures as a [`RelayError`].

pub mod config;
mod error;
pub mod metrics_defs;
mod relay;
mod request;
mod stream;
#[cfg(test)]
mod testutils;

pub use error::RelayError;
pub use relay::{ChatCompletion, ChatRelay};
pub use request::{ChatMessage, ChatRequest, Role};
pub use stream::LineStream;
