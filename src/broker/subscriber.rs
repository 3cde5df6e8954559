use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};
use uuid::Uuid;

use crate::broker::event::Event;

/// Identifies a subscriber within its topic's subscriber set.
pub type SubscriberId = Uuid;

/// A delivery endpoint for one attached consumer.
///
/// The owning event stream pushes events into the queue; exactly one
/// consumer (the transport session) drains it. The queue is unbounded, so
/// the stream never blocks on a slow consumer. When the stream drops its
/// sending half the queue is closed for good and `next_event` returns
/// `None` once the remaining events are drained.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    events: UnboundedReceiver<Event>,
}

impl Subscriber {
    pub(crate) fn new(id: SubscriberId, events: UnboundedReceiver<Event>) -> Self {
        Self { id, events }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next event. Returns `None` once the queue has been
    /// closed by the owning stream and fully drained.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Returns an already-queued event without waiting, or `None` if the
    /// queue is currently empty or closed.
    pub fn try_next(&mut self) -> Option<Event> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Whether the owning stream has closed this subscriber's queue.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}
