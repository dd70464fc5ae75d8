//! Delivery hub — the subscribe / dispatch / teardown state machine.
//!
//! A connection moves OPENING → OPEN → CLOSED and is never reopened; a
//! reconnect allocates a fresh `connectionId = {userId}_{monotonicMillis}`.
//! Dispatch fans one notification out to every live channel of the receiver,
//! caching the payload for replay first; a failed send tears that one
//! connection down and the rest continue. Nothing here blocks, retries, or
//! surfaces a push failure to the request that created the notification.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::registry::ConnectionRegistry;
use crate::replay::ReplayCache;
use crate::types::{NotificationDto, PushMessage};

/// Strictly increasing wall-clock milliseconds, process-wide. Event ids for
/// one user are compared as strings, so equal-width, strictly increasing
/// millis keep lexical order equal to arrival order.
static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

pub(crate) fn next_event_millis() -> i64 {
    loop {
        let now = Utc::now().timestamp_millis();
        let last = LAST_MILLIS.load(Ordering::SeqCst);
        let next = now.max(last + 1);
        if LAST_MILLIS
            .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return next;
        }
    }
}

/// A freshly opened subscription: the id the hub registered and the receive
/// side of its push channel. The HTTP layer turns the receiver into the SSE
/// body stream.
pub struct Subscription {
    pub connection_id: String,
    pub receiver: mpsc::Receiver<PushMessage>,
}

#[derive(Clone)]
pub struct NotificationHub {
    registry: Arc<ConnectionRegistry>,
    replay: Arc<ReplayCache>,
    channel_capacity: usize,
}

impl NotificationHub {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        replay: Arc<ReplayCache>,
        channel_capacity: usize,
    ) -> Self {
        Self {
            registry,
            replay,
            channel_capacity,
        }
    }

    /// Open a new push connection for a user.
    ///
    /// Any prior connections of the same user are evicted first — one active
    /// subscription lineage per user. The new channel immediately carries a
    /// synthetic hello event (id = connectionId, keeps the transport warm and
    /// seeds the client's `Last-Event-ID`), then the replayed events strictly
    /// after `last_event_id` when one was presented.
    pub fn subscribe(&self, user_id: i64, last_event_id: &str) -> Subscription {
        let evicted = self.registry.remove_all_for_user(user_id);
        if !evicted.is_empty() {
            info!(user_id, evicted = evicted.len(), "re-subscribe evicted prior connections");
        }

        let connection_id = format!("{user_id}_{}", next_event_millis());
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        self.registry.register(connection_id.clone(), user_id, tx.clone());
        self.replay.touch_user(user_id);

        let hello = PushMessage {
            id: connection_id.clone(),
            data: format!("EventStream created. [userId={user_id}]"),
        };
        let _ = tx.try_send(hello);

        if !last_event_id.is_empty() {
            let missed = self.replay.events_since(user_id, last_event_id);
            if !missed.is_empty() {
                info!(user_id, count = missed.len(), "replaying missed events");
            }
            for (id, data) in missed {
                if tx.try_send(PushMessage { id, data }).is_err() {
                    warn!(
                        user_id,
                        connection_id = %connection_id,
                        "push buffer filled during replay, truncating catch-up"
                    );
                    break;
                }
            }
        }

        info!(user_id, connection_id = %connection_id, "subscribed");
        Subscription {
            connection_id,
            receiver: rx,
        }
    }

    /// Fan one freshly created notification out to every live channel of the
    /// receiver. The payload is cached for replay before any send is
    /// attempted; a failed send (closed or full channel) tears down exactly
    /// that connection and never affects the others or the caller.
    pub fn dispatch(&self, receiver_id: i64, payload: &NotificationDto) {
        let data = match serde_json::to_string(payload) {
            Ok(data) => data,
            Err(e) => {
                error!(receiver_id, "failed to serialize push payload: {e}");
                return;
            }
        };
        let event_id = format!("{receiver_id}_{}", next_event_millis());
        self.replay.put(receiver_id, event_id.clone(), data.clone());

        let channels = self.registry.channels_for_user(receiver_id);
        if channels.is_empty() {
            debug!(receiver_id, event_id = %event_id, "no live connections for receiver");
            return;
        }
        for (connection_id, sender) in channels {
            let message = PushMessage {
                id: event_id.clone(),
                data: data.clone(),
            };
            if let Err(e) = sender.try_send(message) {
                warn!(connection_id = %connection_id, "push failed ({e}), tearing down connection");
                self.teardown(&connection_id);
            }
        }
    }

    /// Close out one connection. Idempotent; runs on client disconnect, idle
    /// timeout, and failed sends. The user's replay entries survive so a
    /// reconnect can still catch up — the sweeper reclaims them later.
    pub fn teardown(&self, connection_id: &str) {
        if self.registry.remove(connection_id) {
            info!(connection_id = %connection_id, "connection torn down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NotificationDto;

    fn dto(id: i64, content: &str) -> NotificationDto {
        NotificationDto {
            id,
            title: "New comment on your post".into(),
            content: content.into(),
            comment_id: Some(5),
            party_id: None,
            actor_id: Some(3),
            notification_type: "COMMENT".into(),
            created_at: "2026.08.07 12:00".into(),
            is_read: false,
        }
    }

    fn hub_with(capacity: usize) -> (NotificationHub, Arc<ConnectionRegistry>, Arc<ReplayCache>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let replay = Arc::new(ReplayCache::new(64));
        let hub = NotificationHub::new(Arc::clone(&registry), Arc::clone(&replay), capacity);
        (hub, registry, replay)
    }

    #[test]
    fn event_millis_are_strictly_increasing() {
        let a = next_event_millis();
        let b = next_event_millis();
        let c = next_event_millis();
        assert!(a < b && b < c);
        // Equal-width decimal ids compare the same lexically and numerically.
        assert!(format!("42_{a}") < format!("42_{b}"));
    }

    #[tokio::test]
    async fn subscribe_emits_hello_event_first() {
        let (hub, _registry, _replay) = hub_with(8);
        let mut sub = hub.subscribe(42, "");

        let hello = sub.receiver.recv().await.unwrap();
        assert_eq!(hello.id, sub.connection_id);
        assert!(hello.data.contains("userId=42"));
        assert!(sub.connection_id.starts_with("42_"));
    }

    #[tokio::test]
    async fn dispatch_reaches_every_connection_of_the_user() {
        let (hub, registry, _replay) = hub_with(8);
        // Two concurrent channels for user 7, registered directly — the
        // registry supports N per user even though subscribe enforces a
        // single lineage.
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        registry.register("7_100".into(), 7, tx1);
        registry.register("7_200".into(), 7, tx2);

        hub.dispatch(7, &dto(1, "game tonight?"));

        let m1 = rx1.recv().await.unwrap();
        let m2 = rx2.recv().await.unwrap();
        assert_eq!(m1, m2);
        let body: serde_json::Value = serde_json::from_str(&m1.data).unwrap();
        assert_eq!(body["id"], 1);
        assert_eq!(body["title"], "New comment on your post");
        assert_eq!(body["content"], "game tonight?");
        assert_eq!(body["type"], "COMMENT");
    }

    #[tokio::test]
    async fn failed_send_tears_down_only_that_connection() {
        let (hub, registry, _replay) = hub_with(8);
        let (tx_broken, rx_broken) = mpsc::channel(8);
        let (tx_live, mut rx_live) = mpsc::channel(8);
        registry.register("7_100".into(), 7, tx_broken);
        registry.register("7_200".into(), 7, tx_live);
        drop(rx_broken); // client went away

        hub.dispatch(7, &dto(2, "still on?"));

        let delivered = rx_live.recv().await.unwrap();
        assert!(delivered.data.contains("still on?"));
        let remaining = registry.channels_for_user(7);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, "7_200");
    }

    #[tokio::test]
    async fn write_failure_on_sole_connection_empties_the_registry() {
        let (hub, registry, _replay) = hub_with(8);
        let sub = hub.subscribe(42, "");
        drop(sub.receiver);

        hub.dispatch(42, &dto(3, "gone"));
        assert!(registry.channels_for_user(42).is_empty());
    }

    #[tokio::test]
    async fn slow_client_counts_as_a_failed_send() {
        // Capacity 1: the hello event fills the buffer and the client never
        // drains it.
        let (hub, registry, _replay) = hub_with(1);
        let _sub = hub.subscribe(42, "");
        assert_eq!(registry.channels_for_user(42).len(), 1);

        hub.dispatch(42, &dto(4, "too slow"));
        assert!(registry.channels_for_user(42).is_empty());
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let (hub, registry, _replay) = hub_with(8);
        let sub = hub.subscribe(42, "");

        hub.teardown(&sub.connection_id);
        hub.teardown(&sub.connection_id);
        assert!(registry.channels_for_user(42).is_empty());
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn re_subscribe_leaves_exactly_the_new_connection() {
        let (hub, registry, _replay) = hub_with(8);
        let first = hub.subscribe(42, "");
        let second = hub.subscribe(42, "");

        let live = registry.channels_for_user(42);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, second.connection_id);
        assert_ne!(first.connection_id, second.connection_id);

        // The evicted channel is closed: after draining its hello event the
        // old stream sees end-of-channel.
        let mut first = first;
        let _hello = first.receiver.recv().await.unwrap();
        assert!(first.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn reconnect_replays_events_after_last_event_id() {
        let (hub, _registry, _replay) = hub_with(8);
        let mut first = hub.subscribe(42, "");
        let _hello = first.receiver.recv().await.unwrap();

        hub.dispatch(42, &dto(1, "first"));
        hub.dispatch(42, &dto(2, "second"));
        let seen = first.receiver.recv().await.unwrap();
        assert!(seen.data.contains("first"));

        // Reconnect presenting the last event the client actually saw.
        let mut second = hub.subscribe(42, &seen.id);
        let hello = second.receiver.recv().await.unwrap();
        assert_eq!(hello.id, second.connection_id);
        let replayed = second.receiver.recv().await.unwrap();
        assert!(replayed.data.contains("second"));
        assert!(replayed.id.as_str() > seen.id.as_str());
    }

    #[tokio::test]
    async fn replay_covers_events_dispatched_while_fully_disconnected() {
        let (hub, _registry, _replay) = hub_with(8);
        let mut first = hub.subscribe(42, "");
        let hello = first.receiver.recv().await.unwrap();
        hub.teardown(&first.connection_id);

        // Created while the user had no live connection at all.
        hub.dispatch(42, &dto(9, "missed me"));

        let mut second = hub.subscribe(42, &hello.id);
        let _hello = second.receiver.recv().await.unwrap();
        let replayed = second.receiver.recv().await.unwrap();
        assert!(replayed.data.contains("missed me"));
    }

    #[tokio::test]
    async fn empty_last_event_id_skips_replay() {
        let (hub, _registry, _replay) = hub_with(8);
        let mut first = hub.subscribe(42, "");
        let _hello = first.receiver.recv().await.unwrap();
        hub.dispatch(42, &dto(1, "old news"));
        hub.teardown(&first.connection_id);

        let mut second = hub.subscribe(42, "");
        let _hello = second.receiver.recv().await.unwrap();
        assert!(second.receiver.try_recv().is_err());
    }
}
