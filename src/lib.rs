//! # ssecast
//!
//! `ssecast` is a minimalist, in-memory publish/subscribe broker that fans
//! out events to long-lived subscriber connections over the Server-Sent
//! Events text protocol. Producers publish named-topic events; every
//! subscriber attached to a topic receives every event published after it
//! joined, in publication order.
//!
//! ## Core Modules
//!
//! - `broker`: the per-topic broadcast actors and the registry that creates
//!   and looks them up under concurrent access.
//! - `config`: loading and merging server configuration.
//! - `transport`: the HTTP/SSE server that attaches subscribers and accepts
//!   producer posts.
//! - `utils`: shared utilities, such as error handling.

pub mod broker;
pub mod config;
pub mod transport;
pub mod utils;
