//! LearnHub · Course Platform Backend
//!
//! - Axum REST API for courses, sections, content, progress and analytics
//! - In-memory repositories, optionally seeded from a TOML bank
//! - Serves the React SPA from a separate static host; this process is
//!   API-only
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   PLATFORM_CONFIG_PATH  : path to TOML config (bootstrap users + legacy courses)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod domain;
mod error;
mod config;
mod state;
mod access;
mod content;
mod progress;
mod users;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (in-memory stores, optional TOML bank).
  let state = Arc::new(AppState::new());

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "learnhub_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
