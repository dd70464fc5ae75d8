//! Replay cache — recently dispatched events, kept so a reconnecting client
//! can catch up from its `Last-Event-ID`.
//!
//! Entries are scoped by user, not by connection: they survive re-subscribe
//! eviction and connection teardown, which is what makes reconnect replay
//! reachable at all. A bucket exists only for users who have subscribed at
//! least once; the sweeper reclaims buckets once the user has had no live
//! connection for the retention window. Event ids are ordered strings
//! (`{userId}_{monotonicMillis}`), so the per-user BTreeMap iterates in
//! arrival order and `Last-Event-ID` filtering is a range scan.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedEvent {
    payload: String,
}

#[derive(Debug)]
struct UserBucket {
    events: BTreeMap<String, CachedEvent>,
    /// Last subscribe or cached dispatch; drives retention.
    touched_at: DateTime<Utc>,
}

impl UserBucket {
    fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            touched_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct ReplayCache {
    buckets: DashMap<i64, UserBucket>,
    /// Max events retained per user; oldest evicted first.
    capacity: usize,
}

impl ReplayCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity,
        }
    }

    /// Ensure the user has a bucket. Called at subscribe time; only users
    /// with a bucket accumulate cached events.
    pub fn touch_user(&self, user_id: i64) {
        self.buckets
            .entry(user_id)
            .and_modify(|b| b.touched_at = Utc::now())
            .or_insert_with(UserBucket::new);
    }

    /// Cache one dispatched event under the user's bucket. No-op for users
    /// who have never subscribed.
    pub fn put(&self, user_id: i64, event_id: String, payload: String) {
        let Some(mut bucket) = self.buckets.get_mut(&user_id) else {
            return;
        };
        bucket.touched_at = Utc::now();
        bucket.events.insert(event_id, CachedEvent { payload });
        while bucket.events.len() > self.capacity {
            let Some(oldest) = bucket.events.keys().next().cloned() else {
                break;
            };
            bucket.events.remove(&oldest);
            debug!(user_id, event_id = %oldest, "replay capacity reached, dropped oldest event");
        }
    }

    /// Cached events with `event_id > last_event_id`, ascending.
    pub fn events_since(&self, user_id: i64, last_event_id: &str) -> Vec<(String, String)> {
        let Some(bucket) = self.buckets.get(&user_id) else {
            return Vec::new();
        };
        bucket
            .events
            .range::<str, _>((Bound::Excluded(last_event_id), Bound::Unbounded))
            .map(|(id, event)| (id.clone(), event.payload.clone()))
            .collect()
    }

    /// Full purge of a user's cached events.
    pub fn remove_user(&self, user_id: i64) {
        self.buckets.remove(&user_id);
    }

    /// Drop buckets whose user has no live connection and whose last
    /// activity is older than `retention`. Returns the purged-bucket count.
    pub fn sweep(&self, retention: Duration, has_live_connection: impl Fn(i64) -> bool) -> usize {
        let before = self.buckets.len();
        let now = Utc::now();
        self.buckets.retain(|user_id, bucket| {
            if has_live_connection(*user_id) {
                return true;
            }
            let idle = (now - bucket.touched_at).to_std().unwrap_or_default();
            idle <= retention
        });
        before - self.buckets.len()
    }

    pub fn user_count(&self) -> usize {
        self.buckets.len()
    }
}
