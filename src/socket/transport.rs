//! WebSocket Transport Layer
//!
//! Single responsibility: connect to a WebSocket endpoint and move text frames.
//! No knowledge of conversations, reconnection or session state.

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, protocol::Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use crate::error::{ClientError, Result};

/// Type alias for the WebSocket send half
pub type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>, Message>;

/// Type alias for the WebSocket receive half
pub type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// What the receive half produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A data frame, decoded as text
    Frame(String),
    /// The peer closed the connection
    Closed { reason: Option<String> },
}

/// A connected WebSocket transport.
///
/// Can only be constructed via `Transport::connect()`, so holding one means
/// the handshake has completed.
pub struct Transport {
    sink: WsSink,
    stream: WsStream,
}

impl Transport {
    /// Connect to a WebSocket endpoint.
    pub async fn connect(url: &str) -> Result<Self> {
        debug!(url = %url, "Connecting to WebSocket");

        let mut request = url
            .into_client_request()
            .map_err(|e| ClientError::WebSocket(format!("Invalid request for {}: {}", url, e)))?;
        request
            .headers_mut()
            .insert("Origin", HeaderValue::from_static("http://localhost"));

        let (ws, _) = connect_async_with_config(request, None, false)
            .await
            .map_err(|e| ClientError::WebSocket(format!("WebSocket connect failed: {}", e)))?;

        let (sink, stream) = ws.split();

        debug!(url = %url, "WebSocket connected");
        Ok(Self { sink, stream })
    }

    /// Split into separate sink and stream for concurrent send/receive.
    pub fn split(self) -> (WsSink, WsStream) {
        (self.sink, self.stream)
    }
}

/// Send a text frame on a split sink.
pub async fn send_text(sink: &mut WsSink, text: String) -> Result<()> {
    sink.send(Message::Text(text))
        .await
        .map_err(|e| ClientError::WebSocket(format!("Failed to send: {}", e)))
}

/// Send a Close frame and flush the sink.
pub async fn close(sink: &mut WsSink) -> Result<()> {
    sink.send(Message::Close(None))
        .await
        .map_err(|e| ClientError::WebSocket(format!("Failed to close: {}", e)))?;
    sink.close()
        .await
        .map_err(|e| ClientError::WebSocket(format!("Failed to close: {}", e)))
}

/// Receive the next data frame from a split stream.
///
/// Binary frames are decoded as (lossy) UTF-8. Control frames are skipped;
/// pongs are answered by tungstenite.
pub async fn recv(stream: &mut WsStream) -> Result<Inbound> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(Inbound::Frame(text)),
            Some(Ok(Message::Binary(data))) => {
                return Ok(Inbound::Frame(String::from_utf8_lossy(&data).into_owned()))
            }
            Some(Ok(Message::Close(frame))) => {
                return Ok(Inbound::Closed {
                    reason: frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty()),
                })
            }
            Some(Ok(_)) => continue, // Ping, pong, raw frames
            Some(Err(e)) => return Err(ClientError::WebSocket(format!("WebSocket error: {}", e))),
            None => return Ok(Inbound::Closed { reason: None }),
        }
    }
}
