use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::broker::event::Event;
use crate::broker::stream::EventStream;
use crate::utils::error::BrokerError;

const DEFAULT_COMMAND_BUFFER: usize = 64;

/// Maps topic names to their event streams.
///
/// A stream is created lazily on the first subscriber reference to its
/// topic. Lookup and creation happen inside a single locked critical
/// section, so concurrent first callers always end up sharing one stream.
/// The lock is never held across a publish: the handle is cloned out and
/// the forward happens after release.
#[derive(Debug)]
pub struct Registry {
    topics: Mutex<HashMap<String, EventStream>>,
    command_buffer: usize,
}

impl Registry {
    pub fn new(command_buffer: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            command_buffer,
        }
    }

    /// Returns the stream for `topic`, creating and starting it if this is
    /// the topic's first reference.
    pub fn get_or_create(&self, topic: &str) -> EventStream {
        let mut topics = self.topics.lock().unwrap();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| {
                info!(topic, "creating event stream");
                EventStream::spawn(topic, self.command_buffer)
            })
            .clone()
    }

    /// Forwards an event to `topic`'s stream. Publishing to a topic that
    /// was never referenced is a silent no-op and does not create the
    /// topic: only subscriber attachment spins up a stream.
    pub async fn publish(&self, topic: &str, event: Event) -> Result<(), BrokerError> {
        let stream = self.topics.lock().unwrap().get(topic).cloned();
        match stream {
            Some(stream) => stream.publish(event).await,
            None => {
                debug!(topic, "publish to unknown topic dropped");
                Ok(())
            }
        }
    }

    /// Stops `topic`'s stream, closing every subscriber queue, and removes
    /// it from the registry. Unknown topics are a no-op. A later
    /// `get_or_create` for the same name starts a fresh stream.
    pub async fn shutdown(&self, topic: &str) -> Result<(), BrokerError> {
        let stream = self.topics.lock().unwrap().remove(topic);
        match stream {
            Some(stream) => stream.shutdown().await,
            None => Ok(()),
        }
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.lock().unwrap().contains_key(topic)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.lock().unwrap().len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_BUFFER)
    }
}
