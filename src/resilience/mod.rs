//! Resilience patterns for the live stream
//!
//! Provides the reconnect backoff policy used by the connection supervisor.

pub mod backoff;

pub use backoff::{BackoffConfig, BackoffStrategy, ReconnectBackoff};
