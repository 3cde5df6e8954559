use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::broker::event::Event;
use crate::broker::subscriber::{Subscriber, SubscriberId};
use crate::utils::error::BrokerError;

/// A point-in-time snapshot of a stream's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    /// Subscribers currently registered.
    pub subscribers: usize,
    /// Events published over the stream's lifetime.
    pub events_published: usize,
}

enum Command {
    Subscribe {
        reply: oneshot::Sender<Subscriber>,
    },
    Unsubscribe {
        id: SubscriberId,
    },
    Publish {
        event: Event,
    },
    Stats {
        reply: oneshot::Sender<StreamStats>,
    },
    Shutdown,
}

/// Handle to one topic's broadcast actor.
///
/// Every operation is forwarded over a bounded command channel to a worker
/// task that owns the subscriber set and event history outright, so the
/// actor needs no locking: commands are applied one at a time, in the order
/// the worker accepted them. That single-consumer serialization is also what
/// makes broadcast order identical to publish order for every subscriber.
///
/// Shutdown is terminal: the worker evicts every subscriber and exits, and
/// any further operation through a retained handle fails with
/// [`BrokerError::StreamClosed`].
#[derive(Debug, Clone)]
pub struct EventStream {
    name: String,
    commands: mpsc::Sender<Command>,
}

impl EventStream {
    /// Spawns the worker task for `topic` and returns its handle. A
    /// `command_buffer` of zero is treated as one: `mpsc::channel` rejects
    /// zero capacities, and the spawn may run inside the registry's
    /// get-or-create critical section.
    pub fn spawn(topic: &str, command_buffer: usize) -> Self {
        let (commands, inbox) = mpsc::channel(command_buffer.max(1));
        let worker = StreamWorker {
            topic: topic.to_string(),
            inbox,
            subscribers: HashMap::new(),
            history: Vec::new(),
        };
        tokio::spawn(worker.run());
        Self {
            name: topic.to_string(),
            commands,
        }
    }

    /// The topic this stream serves.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a new subscriber and returns its delivery endpoint. The
    /// caller suspends until the worker has acknowledged the registration.
    pub async fn add_subscriber(&self) -> Result<Subscriber, BrokerError> {
        let (reply, registered) = oneshot::channel();
        self.commands
            .send(Command::Subscribe { reply })
            .await
            .map_err(|_| self.closed())?;
        registered.await.map_err(|_| self.closed())
    }

    /// Removes a subscriber and closes its queue. Removing an id that is
    /// not registered is a no-op.
    pub async fn remove_subscriber(&self, id: SubscriberId) -> Result<(), BrokerError> {
        self.commands
            .send(Command::Unsubscribe { id })
            .await
            .map_err(|_| self.closed())
    }

    /// Broadcasts an event to every currently registered subscriber, in
    /// subscriber-set iteration order.
    pub async fn publish(&self, event: Event) -> Result<(), BrokerError> {
        self.commands
            .send(Command::Publish { event })
            .await
            .map_err(|_| self.closed())
    }

    /// Current subscriber and history counts.
    pub async fn stats(&self) -> Result<StreamStats, BrokerError> {
        let (reply, stats) = oneshot::channel();
        self.commands
            .send(Command::Stats { reply })
            .await
            .map_err(|_| self.closed())?;
        stats.await.map_err(|_| self.closed())
    }

    /// Evicts every subscriber and stops the worker permanently.
    pub async fn shutdown(&self) -> Result<(), BrokerError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| self.closed())
    }

    /// Whether `other` is a handle to the same worker.
    pub fn same_stream(&self, other: &EventStream) -> bool {
        self.commands.same_channel(&other.commands)
    }

    fn closed(&self) -> BrokerError {
        BrokerError::StreamClosed(self.name.clone())
    }
}

/// The actor side of an [`EventStream`]: sole owner of the subscriber set
/// and history.
struct StreamWorker {
    topic: String,
    inbox: mpsc::Receiver<Command>,
    subscribers: HashMap<SubscriberId, mpsc::UnboundedSender<Event>>,
    // Append-only record of everything published; not replayed to late
    // joiners.
    history: Vec<Event>,
}

impl StreamWorker {
    async fn run(mut self) {
        while let Some(command) = self.inbox.recv().await {
            match command {
                Command::Subscribe { reply } => self.add_subscriber(reply),
                Command::Unsubscribe { id } => self.remove_subscriber(id),
                Command::Publish { event } => self.broadcast(event),
                Command::Stats { reply } => {
                    let _ = reply.send(StreamStats {
                        subscribers: self.subscribers.len(),
                        events_published: self.history.len(),
                    });
                }
                Command::Shutdown => {
                    self.remove_all_subscribers();
                    break;
                }
            }
        }
        debug!(topic = %self.topic, "event stream stopped");
    }

    fn add_subscriber(&mut self, reply: oneshot::Sender<Subscriber>) {
        let id = SubscriberId::new_v4();
        let (sender, queue) = mpsc::unbounded_channel();
        self.subscribers.insert(id, sender);
        info!(
            topic = %self.topic,
            subscriber = %id,
            registered = self.subscribers.len(),
            "subscriber added"
        );
        // The requester may have gone away while the command was queued; the
        // next broadcast will evict the orphaned entry.
        let _ = reply.send(Subscriber::new(id, queue));
    }

    fn remove_subscriber(&mut self, id: SubscriberId) {
        // Dropping the sender closes the subscriber's queue.
        if self.subscribers.remove(&id).is_some() {
            info!(
                topic = %self.topic,
                subscriber = %id,
                registered = self.subscribers.len(),
                "subscriber removed"
            );
        }
    }

    fn remove_all_subscribers(&mut self) {
        let evicted = self.subscribers.len();
        self.subscribers.clear();
        info!(topic = %self.topic, evicted, "all subscribers removed");
    }

    fn broadcast(&mut self, event: Event) {
        self.history.push(event.clone());
        let mut gone = Vec::new();
        for (id, sender) in &self.subscribers {
            if sender.send(event.clone()).is_err() {
                gone.push(*id);
            }
        }
        // A failed send means the consumer dropped its endpoint; evict it so
        // the set only holds live subscribers.
        for id in gone {
            warn!(topic = %self.topic, subscriber = %id, "subscriber gone, evicting");
            self.remove_subscriber(id);
        }
    }
}
