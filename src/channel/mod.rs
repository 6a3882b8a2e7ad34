//! Resilient messaging channel.
//!
//! Maintains a long-lived connection to the messaging server, routes
//! inbound frames into observable chat state, and recovers from dropped
//! connections with a bounded constant-interval retry policy.
//!
//! ```text
//! ChannelClient ──commands──> event loop ──connect──> Connector
//!                                 │                      │
//!                                 │<──opened/frame/closed─┘ (EventSink)
//!                                 │
//!                                 ├──frames──> MessageRouter ──> ChatState
//!                                 └──status──> ConnectionStatus
//! ```
//!
//! The caller-facing [`ChannelClient`] is fire-and-forget: every method
//! enqueues a command and returns; state is observed through snapshots.

pub mod client;
pub mod protocol;
pub mod router;
pub mod transport;
pub mod websocket;

pub use client::{ChannelClient, ConnectionStatus};
pub use protocol::{AgentMessage, ChatEntry, ChatMessage, TypingUser};
pub use router::{ChatState, MessageRouter};
pub use transport::{Connector, EventSink, Transport, TransportEvent, NORMAL_CLOSURE};
pub use websocket::WebSocketConnector;
