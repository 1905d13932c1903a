//! Channel Transport
//!
//! Abstraction over the persistent connection carrying channel frames, and
//! the WebSocket implementation used in production.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::error::TransportError;
use super::messages::Frame;

/// Opens connections to a channel URL
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, TransportError>;
}

/// An established connection
#[async_trait]
pub trait Connection: Send {
    /// Wait for the next data frame
    ///
    /// Returns `None` once the peer has closed the connection.
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;

    /// Close the connection, best effort
    async fn close(&mut self);
}

/// WebSocket transport (`ws://` and `wss://`)
#[derive(Debug, Default, Clone)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, TransportError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::trace!(url = %url, status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(WsConnection { stream }))
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A live WebSocket connection
pub struct WsConnection {
    stream: WsStream,
}

#[async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        while let Some(result) = self.stream.next().await {
            match result {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Ok(Message::Binary(bytes)) => return Some(Ok(Frame::Binary(bytes.to_vec()))),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                    // tungstenite answers pings itself
                    continue;
                }
                Ok(Message::Close(frame)) => {
                    if let Some(frame) = frame {
                        tracing::debug!(
                            code = u16::from(frame.code),
                            reason = %frame.reason.as_str(),
                            "Server closed channel"
                        );
                    }
                    return None;
                }
                Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => return None,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "Error while closing channel");
        }
    }
}
