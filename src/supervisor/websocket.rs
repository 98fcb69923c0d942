//! WebSocket transport
//!
//! Text messages are frames. Binary messages are accepted when they hold
//! UTF-8. A close frame ends the session.

use async_trait::async_trait;
use futures::{future, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::transport::{FrameStream, Transport};
use crate::error::{Result, StreamError};

/// WebSocket transport over tokio-tungstenite
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create a transport
    pub fn new() -> Self {
        Self
    }
}

/// Map one message to a frame, if it carries one
fn frame_from_message(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.as_str().to_owned()),
        Message::Binary(data) => String::from_utf8(data.to_vec()).ok(),
        _ => None,
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, endpoint: &str) -> Result<FrameStream> {
        let (socket, response) = connect_async(endpoint).await?;
        debug!(endpoint = %endpoint, status = %response.status(), "WebSocket opened");

        let frames = socket
            .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
            .filter_map(|message| {
                future::ready(match message {
                    Ok(message) => frame_from_message(message).map(Ok),
                    Err(e) => Some(Err(StreamError::from(e))),
                })
            });

        Ok(Box::pin(frames))
    }

    fn name(&self) -> &str {
        "websocket"
    }
}
