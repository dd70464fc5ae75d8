//! Shared server state — the store pool and the push subsystem.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::hub::NotificationHub;
use crate::registry::ConnectionRegistry;
use crate::replay::ReplayCache;

/// Shared state accessible from all handlers. The registry and replay cache
/// are constructed once here and handed to the hub by reference — no
/// process-global mutable state.
pub struct AppState {
    pub db: PgPool,
    pub registry: Arc<ConnectionRegistry>,
    pub replay: Arc<ReplayCache>,
    pub hub: NotificationHub,
    pub config: Config,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        let replay = Arc::new(ReplayCache::new(config.replay_capacity));
        let hub = NotificationHub::new(
            Arc::clone(&registry),
            Arc::clone(&replay),
            config.channel_capacity,
        );

        Arc::new(Self {
            db,
            registry,
            replay,
            hub,
            config,
        })
    }
}
