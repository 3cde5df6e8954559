//! The `utils` module collects shared definitions used across `ssecast`,
//! currently the broker error type.

pub mod error;
