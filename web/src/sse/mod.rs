//! SSE HTTP binding for the web layer.
//!
//! This module only adapts axum requests and streaming bodies to the
//! `sse::session::Transport` interface. The hub, registry and subscription
//! loop live in the `sse` crate.

pub mod handler;
pub(crate) mod transport;
