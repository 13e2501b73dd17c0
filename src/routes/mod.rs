//! HTTP gateway for the dashboard API.
//!
//! Each sibling module exports a subrouter; this gateway merges them and
//! attaches the shared [`Config`] state so `main.rs` only sees one router.
use axum::Router;

use crate::Config;

mod dashboard;
mod health;

// ---

pub fn router(config: Config) -> Router {
    // ---
    Router::new()
        .merge(dashboard::router())
        .merge(health::router())
        .with_state(config)
}
