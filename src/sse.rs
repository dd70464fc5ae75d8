//! SSE connect handler — the long-lived half of the push subsystem.
//!
//! Flow per connection:
//! 1. Resolve the user and the optional `Last-Event-ID` header
//! 2. Subscribe on the hub (evicts the prior lineage, queues hello + replay)
//! 3. Stream queued push messages as SSE events until the channel closes,
//!    the idle timeout elapses, or the client goes away
//! 4. A drop guard runs teardown exactly once, whichever way the stream dies

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};

use crate::auth::AuthedUser;
use crate::hub::{NotificationHub, Subscription};
use crate::state::AppState;

/// Axum handler for GET /notifications/connect.
pub async fn connect(
    State(state): State<Arc<AppState>>,
    AuthedUser(user_id): AuthedUser,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Absent header behaves as the empty string: no replay.
    let last_event_id = headers
        .get("last-event-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_string();

    let Subscription {
        connection_id,
        receiver,
    } = state.hub.subscribe(user_id, &last_event_id);

    let guard = TeardownGuard {
        hub: state.hub.clone(),
        connection_id,
    };
    let idle_timeout = Duration::from_secs(state.config.sse_timeout_secs);

    // The stream selects between "next pushed message" and the idle timeout.
    // Ok(None) means the channel closed (eviction or teardown); Err means
    // the timeout elapsed. Either way the stream ends and the guard fires.
    let stream = stream::unfold((receiver, guard), move |(mut rx, guard)| async move {
        match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(msg)) => {
                let event = Event::default().id(msg.id).data(msg.data);
                Some((Ok(event), (rx, guard)))
            }
            Ok(None) => None,
            Err(_) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Runs teardown when the SSE stream is dropped — covers client disconnect,
/// idle timeout, and channel close alike. Teardown is idempotent, so firing
/// after an eviction already removed the connection is harmless.
struct TeardownGuard {
    hub: NotificationHub,
    connection_id: String,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.hub.teardown(&self.connection_id);
    }
}
