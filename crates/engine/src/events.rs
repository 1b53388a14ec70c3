//! In-process event bus for engine-level events.
//!
//! [`EngineEventBus`] is the publish/subscribe hub the presentation
//! layer listens on. Backed by a `tokio::sync::broadcast` channel so
//! any number of subscribers independently receive every event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use certbox_core::path::ObjectPath;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// A state change the presentation layer cares about.
#[derive(Debug, Clone, Serialize)]
pub struct EngineEvent {
    /// What happened.
    pub kind: EngineEventKind,
    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

/// The engine-level event variants.
#[derive(Debug, Clone, Serialize)]
pub enum EngineEventKind {
    /// A local generator job was dispatched.
    LocalJobStarted {
        job: ObjectPath,
        /// Display name, when the job is known to the object tree.
        name: Option<String>,
    },

    /// A local generator job finished and its result was recorded.
    LocalJobCompleted {
        job: ObjectPath,
        result: ObjectPath,
    },

    /// Every local generator job has run; the desired job list and
    /// run list are final and the object tree has been rebuilt.
    LocalJobsCompleted,

    /// The object tree was discovered anew.
    ObjectTreeRebuilt {
        /// Number of objects in the fresh tree.
        objects: usize,
    },
}

impl EngineEvent {
    /// Stamp an event with the current time.
    pub fn new(kind: EngineEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// In-process fan-out bus for [`EngineEvent`]s.
pub struct EngineEventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EngineEventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed events are
    /// dropped and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently
    /// dropped.
    pub fn publish(&self, kind: EngineEventKind) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(EngineEvent::new(kind));
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EngineEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EngineEventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(EngineEventKind::ObjectTreeRebuilt { objects: 12 });

        let event = rx.recv().await.unwrap();
        assert_matches!(event.kind, EngineEventKind::ObjectTreeRebuilt { objects: 12 });
    }

    #[tokio::test]
    async fn each_subscriber_sees_every_event() {
        let bus = EngineEventBus::default();
        let mut rx_a = bus.subscribe();
        let mut rx_b = bus.subscribe();

        bus.publish(EngineEventKind::LocalJobsCompleted);

        assert_matches!(rx_a.recv().await.unwrap().kind, EngineEventKind::LocalJobsCompleted);
        assert_matches!(rx_b.recv().await.unwrap().kind, EngineEventKind::LocalJobsCompleted);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EngineEventBus::default();
        bus.publish(EngineEventKind::LocalJobsCompleted);
    }
}
