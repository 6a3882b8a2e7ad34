//! Wire protocol for the messaging channel.
//!
//! Every frame is a JSON envelope `{ "type": <discriminant>, "data": {..} }`.
//! Field names follow the server's wire format exactly (camelCase `roomId`
//! next to snake_case `created_at`); serde renames keep the Rust side tidy.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Envelope discriminants.
pub mod kind {
    pub const AGENT_MESSAGE: &str = "agent_message";
    pub const USER_MESSAGE: &str = "user_message";
    pub const TYPING: &str = "typing";
    pub const STOP_TYPING: &str = "stop_typing";
    pub const ERROR: &str = "error";
}

/// Raw inbound envelope. The payload stays untyped until the discriminant
/// is known.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A message authored by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(rename = "agentId", default)]
    pub agent_id: Option<String>,
    pub sender: String,
    pub created_at: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
}

/// A message authored by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
    pub sender: String,
    pub created_at: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
}

/// One entry in the message log. The `type` tag is forced by the router
/// when it appends, regardless of what the payload carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEntry {
    User(ChatMessage),
    Agent(AgentMessage),
}

/// Payload of inbound `typing` frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypingEvent {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
}

/// Payload of inbound `stop_typing` frames (no username on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StopTypingEvent {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
}

/// Payload of inbound `error` frames.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// A user currently typing, keyed by (userId, roomId).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypingUser {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
}

impl From<TypingEvent> for TypingUser {
    fn from(event: TypingEvent) -> Self {
        Self {
            user_id: event.user_id,
            username: event.username,
            room_id: event.room_id,
        }
    }
}

/// Build a `user_message` envelope with the sender identity and a
/// client-generated timestamp.
pub fn user_message_frame(session: &Session, content: &str, room_id: &str) -> serde_json::Value {
    serde_json::json!({
        "type": kind::USER_MESSAGE,
        "data": {
            "content": content,
            "roomId": room_id,
            "sender": session.username,
            "senderId": session.user_id,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "type": "user",
        }
    })
}

/// Build a `typing` or `stop_typing` envelope.
pub fn typing_frame(session: &Session, room_id: &str, is_typing: bool) -> serde_json::Value {
    serde_json::json!({
        "type": if is_typing { kind::TYPING } else { kind::STOP_TYPING },
        "data": {
            "userId": session.user_id,
            "username": session.username,
            "roomId": room_id,
        }
    })
}
