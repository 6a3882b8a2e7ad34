//! Transport seam for the messaging channel.
//!
//! The state machine never touches a socket directly: it opens connections
//! through a [`Connector`] and writes through the [`Transport`] it returns,
//! while the transport reports lifecycle events back through an
//! [`EventSink`]. Tests substitute an in-memory connector; production uses
//! [`WebSocketConnector`](crate::channel::WebSocketConnector).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChannelError;

/// Close code for a normal, caller-initiated closure. Suppresses the
/// retry policy.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Lifecycle events a transport reports to the channel event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection finished opening and can carry frames.
    Opened,
    /// A text frame arrived.
    Frame(String),
    /// The connection closed with the given close code.
    Closed { code: u16 },
}

/// Hands transport events to the channel event loop, stamped with the
/// generation of the connection that produced them so events from a
/// replaced transport can be ignored.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, TransportEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn opened(&self) {
        let _ = self.tx.send((self.generation, TransportEvent::Opened));
    }

    pub fn frame(&self, text: String) {
        let _ = self.tx.send((self.generation, TransportEvent::Frame(text)));
    }

    pub fn closed(&self, code: u16) {
        let _ = self.tx.send((self.generation, TransportEvent::Closed { code }));
    }
}

/// Write half of a live connection.
#[async_trait]
pub trait Transport: Send {
    /// Transmit one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

    /// Close the connection with the given close code.
    async fn close(&mut self, code: u16) -> Result<(), ChannelError>;
}

/// Opens connections for the channel.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `address`.
    ///
    /// Implementations report `Opened`, inbound `Frame`s, and the final
    /// `Closed` through the sink; the returned transport is the write half.
    async fn connect(
        &self,
        address: &str,
        sink: EventSink,
    ) -> Result<Box<dyn Transport>, ChannelError>;
}
