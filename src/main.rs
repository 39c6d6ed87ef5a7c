//! MasterIt · Adaptive Study Backend
//!
//! - Axum HTTP API for adaptive study sessions (diagnostic → connection → application)
//! - Heuristic or hosted (OpenAI-compatible) grading, chosen once at startup
//! - Curriculum generation and tutor chat through the same provider
//!
//! Important env variables:
//!   PORT                     : u16 (default 3000)
//!   MASTERIT_USE_REAL_AI     : "true" selects hosted grading
//!   MASTERIT_DATA_DIR        : directory for persisted entries (in-memory if unset)
//!   OPENAI_API_KEY           : enables OpenAI integration if present
//!   OPENAI_BASE_URL          : default "https://api.openai.com/v1"
//!   OPENAI_EVAL_MODEL        : default "gpt-4o-mini"
//!   OPENAI_CURRICULUM_MODEL  : default "gpt-4o-mini"
//!   OPENAI_CHAT_MODEL        : default "gpt-4o-mini"
//!   AGENT_CONFIG_PATH        : path to TOML config (prompts, scoring, heuristic, concepts)
//!   LOG_LEVEL                : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT               : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod seeds;
mod store;
mod profile;
mod openai;
mod grader;
mod session;
mod summary;
mod controller;
mod curriculum;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (store, profile, grader, OpenAI client, prompts).
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
  info!(target: "masterit_backend", %addr, grader = state.sessions.grader_name(), "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "masterit_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "masterit_backend", error = %e, "Cannot listen for Ctrl-C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "masterit_backend", "Shutdown signal received");
}
