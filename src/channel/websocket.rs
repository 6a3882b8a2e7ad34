//! WebSocket transport for the messaging channel.
//!
//! Connects with `tokio-tungstenite`, splits the stream, forwards text
//! frames and close codes into the channel event loop, and exposes the
//! write half as the [`Transport`].

use async_trait::async_trait;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::channel::transport::{Connector, EventSink, Transport};
use crate::error::ChannelError;

/// Close code reported when the connection drops without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Production [`Connector`] over WebSocket.
#[derive(Debug, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        address: &str,
        sink: EventSink,
    ) -> Result<Box<dyn Transport>, ChannelError> {
        let (stream, _response) =
            connect_async(address)
                .await
                .map_err(|e| ChannelError::ConnectFailed {
                    endpoint: address.to_string(),
                    reason: e.to_string(),
                })?;

        let (write, mut read) = stream.split();

        // The handshake completed, so the connection is open.
        sink.opened();

        // Reader task: forward inbound frames until the stream ends.
        let reader_sink = sink.clone();
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => reader_sink.frame(text.to_string()),
                    Ok(Message::Close(frame)) => {
                        let code = frame
                            .map(|f| u16::from(f.code))
                            .unwrap_or(ABNORMAL_CLOSURE);
                        reader_sink.closed(code);
                        return;
                    }
                    // Binary/ping/pong frames are not part of the protocol.
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "WebSocket read error");
                        reader_sink.closed(ABNORMAL_CLOSURE);
                        return;
                    }
                }
            }
            reader_sink.closed(ABNORMAL_CLOSURE);
        });

        Ok(Box::new(WebSocketTransport { write }))
    }
}

/// Write half of a live WebSocket connection.
struct WebSocketTransport {
    write: SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ChannelError::SendFailed {
                reason: e.to_string(),
            })
    }

    async fn close(&mut self, code: u16) -> Result<(), ChannelError> {
        self.write
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: "".into(),
            })))
            .await
            .map_err(|e| ChannelError::SendFailed {
                reason: e.to_string(),
            })
    }
}
