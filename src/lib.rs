//! talkwire: structured chat messaging over a resilient channel.
//!
//! Two subsystems:
//!
//! - [`markup`] turns markdown-flavored message text into a structured
//!   document tree (blocks of inline segments) suitable for rendering.
//!   Parsing is tolerant: malformed input degrades, it never fails.
//! - [`channel`] maintains the connection to the messaging server,
//!   routes inbound frames into observable chat state, and reconnects
//!   with a bounded constant-interval retry policy.
//!
//! ```no_run
//! use talkwire::channel::{ChannelClient, ChatEntry};
//! use talkwire::config::ChannelConfig;
//! use talkwire::markup::MarkdownParser;
//! use talkwire::session::Session;
//!
//! # async fn run() {
//! let config = ChannelConfig::new("wss://chat.example.com/ws");
//! let session = Session::new("u-1", "alice", "token");
//! let client = ChannelClient::over_websocket(config, Some(session));
//! client.connect();
//!
//! let parser = MarkdownParser::new();
//! for entry in client.messages().await {
//!     if let ChatEntry::Agent(message) = entry {
//!         let _document = parser.parse(&message.content);
//!     }
//! }
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod markup;
pub mod session;

pub use channel::ChannelClient;
pub use config::ChannelConfig;
pub use error::Error;
pub use markup::{BlockNode, InlineSegment, MarkdownParser};
pub use session::Session;
