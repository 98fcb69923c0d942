//! Error types for threat-stream
//!
//! ## Table of Contents
//! - **StreamError**: Main error enum covering all failure modes
//! - **Result**: Type alias for `Result<T, StreamError>`
//!
//! The live-stream core never hands these to its caller: transport failures
//! are absorbed into the supervisor's connection state. They surface from
//! configuration loading, transport setup and the dashboard API client.

use thiserror::Error;

use crate::api::ApiError;

/// Result type alias for threat-stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Main error type for threat-stream operations
#[derive(Error, Debug)]
pub enum StreamError {
    /// Configuration error during loading or builder setup
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure (HTTP stream, WebSocket)
    #[error("transport error: {0}")]
    Transport(String),

    /// Dashboard backend API failure
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Metrics collection or export failure
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Generic IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StreamError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a metrics error
    pub fn metrics(msg: impl Into<String>) -> Self {
        Self::Metrics(msg.into())
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<prometheus::Error> for StreamError {
    fn from(err: prometheus::Error) -> Self {
        Self::Metrics(err.to_string())
    }
}

impl From<toml::de::Error> for StreamError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
