//! The `broker` module is the core of the fan-out system: events, the
//! per-subscriber delivery queues, the per-topic broadcast actor, and the
//! registry that maps topic names to running actors.
//!
//! All topic state is owned by the topic's actor task and mutated only from
//! its command loop; the registry's map is the one piece of shared state
//! guarded by a lock, and only for the get-or-create critical section.

pub mod event;
pub mod registry;
pub mod stream;
pub mod subscriber;

pub use event::Event;
pub use registry::Registry;
pub use stream::{EventStream, StreamStats};
pub use subscriber::{Subscriber, SubscriberId};
