//! Background lifecycle tasks.
//!
//! **Replay sweeper** — periodically drops replay buckets for users who
//! have had no live connection for the retention window. Connection-level
//! cleanup happens inline at teardown; this task only reclaims the
//! user-scoped replay memory that deliberately outlives each connection.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::state::AppState;

/// Spawn the replay-cache sweeper. Scan interval and retention come from
/// config.
pub fn spawn_replay_sweeper(state: Arc<AppState>) {
    let interval_secs = state.config.replay_sweep_interval_secs;
    let retention = Duration::from_secs(state.config.replay_retention_secs);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let purged = state
                .replay
                .sweep(retention, |user_id| state.registry.has_connections(user_id));
            if purged > 0 {
                info!(purged, "purged stale replay buckets");
            }
        }
    });
}
