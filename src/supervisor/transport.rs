//! Transport abstraction
//!
//! ## Table of Contents
//! - **Transport**: Opens one live session against an endpoint
//! - **FrameStream**: Text frames of an open session
//! - **TransportKind**: Built-in transports selectable from config

use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use super::sse::SseTransport;
use super::websocket::WebSocketTransport;
use crate::error::{Result, StreamError};

/// Text frames of one open session.
///
/// `Some(Err(_))` is a transport failure and `None` a close; both end the
/// session.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Opens live sessions against an endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session. Resolves once the connection is established.
    async fn open(&self, endpoint: &str) -> Result<FrameStream>;

    /// Transport name for identification
    fn name(&self) -> &str;
}

/// Type alias for shared transports
pub type BoxedTransport = Arc<dyn Transport>;

/// Built-in transport selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Server-Sent Events over HTTP
    #[default]
    Sse,
    /// WebSocket text frames
    WebSocket,
}

impl TransportKind {
    /// Construct the transport
    pub fn build(&self) -> Result<BoxedTransport> {
        Ok(match self {
            TransportKind::Sse => Arc::new(SseTransport::new()?),
            TransportKind::WebSocket => Arc::new(WebSocketTransport::new()),
        })
    }

    /// Config name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Sse => "sse",
            TransportKind::WebSocket => "websocket",
        }
    }
}

impl FromStr for TransportKind {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sse" | "eventsource" => Ok(TransportKind::Sse),
            "websocket" | "ws" => Ok(TransportKind::WebSocket),
            other => Err(StreamError::config(format!("unknown transport: {}", other))),
        }
    }
}
