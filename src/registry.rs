//! Connection registry — concurrency-safe bookkeeping of live SSE channels.
//!
//! Two-level index: `connection_id → handle` for teardown and
//! `user_id → set of connection_ids` for fan-out. Both levels are DashMaps;
//! every operation is individually atomic, and a partially-removed pair
//! self-heals on the next idempotent remove for the same id.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::types::PushMessage;

/// One live push channel. Invariant: `connection_id` starts with
/// `{user_id}_` and is unique for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub user_id: i64,
    pub sender: mpsc::Sender<PushMessage>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionHandle>,
    by_user: DashMap<i64, HashSet<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new live channel under both index levels.
    pub fn register(&self, connection_id: String, user_id: i64, sender: mpsc::Sender<PushMessage>) {
        self.by_user
            .entry(user_id)
            .or_default()
            .insert(connection_id.clone());
        self.connections
            .insert(connection_id, ConnectionHandle { user_id, sender });
    }

    /// Snapshot of every live channel for a user, for fan-out.
    pub fn channels_for_user(&self, user_id: i64) -> Vec<(String, mpsc::Sender<PushMessage>)> {
        let ids: Vec<String> = match self.by_user.get(&user_id) {
            Some(set) => set.iter().cloned().collect(),
            None => return Vec::new(),
        };
        ids.into_iter()
            .filter_map(|id| {
                let sender = self.connections.get(&id).map(|h| h.sender.clone())?;
                Some((id, sender))
            })
            .collect()
    }

    /// Remove one connection from both levels. Idempotent; returns whether
    /// the connection was still registered.
    pub fn remove(&self, connection_id: &str) -> bool {
        let Some((_, handle)) = self.connections.remove(connection_id) else {
            return false;
        };
        if let Some(mut set) = self.by_user.get_mut(&handle.user_id) {
            set.remove(connection_id);
        }
        self.by_user.remove_if(&handle.user_id, |_, set| set.is_empty());
        true
    }

    /// Drop every connection a user holds. Returns the evicted ids; dropping
    /// their senders ends the corresponding streams.
    pub fn remove_all_for_user(&self, user_id: i64) -> Vec<String> {
        let Some((_, ids)) = self.by_user.remove(&user_id) else {
            return Vec::new();
        };
        for id in &ids {
            self.connections.remove(id);
        }
        ids.into_iter().collect()
    }

    pub fn has_connections(&self, user_id: i64) -> bool {
        self.by_user
            .get(&user_id)
            .map(|set| !set.is_empty())
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}
