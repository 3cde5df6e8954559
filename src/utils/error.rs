//! The `error` module defines the error types surfaced by the broker core.
//!
//! The core's taxonomy is deliberately narrow: publishing to an unknown
//! topic is defined as a no-op, topic-name resolution failures belong to
//! the transport layer, and the only failure the core itself can produce
//! is an operation against a stream whose worker has stopped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// The target stream's worker has exited (terminal shutdown); the
    /// handle used for this operation is stale.
    #[error("event stream for topic `{0}` is no longer running")]
    StreamClosed(String),
}
