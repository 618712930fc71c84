//! In-process publish-subscribe event bus.
//!
//! Handlers publish an [`EventEntry`] after the corresponding row has been
//! appended to `event_logs`; subscribers (the WebSocket observer, tests)
//! receive events in emission order and are isolated from each other. If a
//! subscriber falls behind it skips ahead to the newest events rather than
//! blocking publishers.

use loreforge_types::EventEntry;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel.
///
/// A subscriber lagging by more than this many events receives a
/// [`broadcast::error::RecvError::Lagged`] and resumes from the newest.
const BUS_CAPACITY: usize = 256;

/// The engine's event bus. Cheap to clone; all clones share one channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEntry>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(BUS_CAPACITY)
    }

    /// Create a bus with an explicit capacity (tests).
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Fire-and-forget: a bus with no subscribers drops
    /// the event silently, which is the normal headless case.
    pub fn publish(&self, event: EventEntry) {
        let receivers = self.tx.receiver_count();
        if self.tx.send(event).is_err() {
            tracing::trace!(receivers, "event dropped: no subscribers");
        }
    }

    /// Subscribe to the event stream from this point forward.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEntry> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
