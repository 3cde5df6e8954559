//! The `transport` module is the boundary between the broker core and the
//! network: a minimal HTTP/1.1 server that attaches subscribers via
//! `GET /events?topic=<name>` and streams SSE records at them, and accepts
//! producer posts via `POST /publish?topic=<name>`.
//!
//! Topic-name extraction and malformed-request reporting live here; the
//! core only ever sees resolved topic strings.

pub mod http;
pub mod message;

#[cfg(test)]
mod tests;
