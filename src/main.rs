//! notifyd — real-time notification delivery server.
//!
//! SSE push connections + notification store + replay-on-reconnect.

mod api;
mod auth;
mod config;
mod db;
mod error;
mod hub;
mod lifecycle;
mod registry;
mod replay;
mod sse;
mod state;
mod types;

use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use sqlx::Executor;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() {
    // Load .env if present (local dev).
    let _ = dotenvy::dotenv();

    let config = config::Config::from_env();

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.as_str())
        .with_target(true)
        .init();

    info!("notifyd starting");
    info!(listen = %config.listen_addr, instance = %config.server_instance);

    // ── Postgres ────────────────────────────────────────────
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to Postgres");

    // Run migration.
    info!("running migrations");
    pool.execute(include_str!("../migrations/001_init.sql"))
        .await
        .unwrap_or_else(|e| {
            // Migration may fail if tables exist — that's fine on restart.
            info!("migration note (may already exist): {e}");
            Default::default()
        });

    info!("database ready");

    // ── Shared state ────────────────────────────────────────
    let state = state::AppState::new(pool, config.clone());

    // ── Background tasks ────────────────────────────────────
    // Replay sweeper — reclaim cached events for long-disconnected users.
    lifecycle::spawn_replay_sweeper(Arc::clone(&state));

    // ── Routes ──────────────────────────────────────────────
    let app = Router::new()
        // Push stream.
        .route("/notifications/connect", get(sse::connect))
        // Store endpoints.
        .route("/notifications", get(api::list_notifications))
        .route("/notifications/read/{notification_id}", patch(api::mark_read))
        .route("/notifications/comment", post(api::create_comment_notification))
        .route("/notifications/party", post(api::create_party_notification))
        .route("/notifications/comment/{comment_id}", delete(api::delete_by_comment))
        .route("/notifications/party/{party_id}", delete(api::delete_by_party))
        // Health check (useful for K8s liveness probes).
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // ── Bind & serve ────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind");

    info!(addr = %config.listen_addr, "notifyd listening");

    axum::serve(listener, app)
        .await
        .expect("server error");
}

/// Liveness probe.
async fn healthz() -> &'static str {
    "ok"
}
