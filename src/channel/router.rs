//! Inbound frame routing.
//!
//! Classifies inbound payloads by their `type` discriminant and updates
//! the two observable collections: the message log and the active-typists
//! set. One bad frame never affects the next — malformed JSON and
//! unrecognized discriminants are logged and discarded.

use std::sync::Arc;
use std::time::Duration;

// tokio's Instant, not std's: TTL sweeps must follow the tokio clock.
use tokio::time::Instant;

use tokio::sync::RwLock;

use crate::channel::protocol::{
    kind, AgentMessage, ChatEntry, Envelope, ErrorPayload, StopTypingEvent, TypingEvent,
    TypingUser,
};

/// Observable chat state fed by the router.
///
/// The message log is append-only from the router's perspective and
/// clearable by the caller. The typing set is keyed by (userId, roomId);
/// entries remember when they were inserted so stale ones can be swept.
pub struct ChatState {
    messages: RwLock<Vec<ChatEntry>>,
    typing: RwLock<Vec<(TypingUser, Instant)>>,
}

impl ChatState {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            typing: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of the message log in arrival order.
    pub async fn messages(&self) -> Vec<ChatEntry> {
        self.messages.read().await.clone()
    }

    /// Clear the message log.
    pub async fn clear_messages(&self) {
        self.messages.write().await.clear();
    }

    /// Snapshot of users currently typing.
    pub async fn typing_users(&self) -> Vec<TypingUser> {
        self.typing
            .read()
            .await
            .iter()
            .map(|(user, _)| user.clone())
            .collect()
    }

    /// Remove typing entries older than `ttl`.
    pub async fn expire_stale_typing(&self, ttl: Duration) {
        let now = Instant::now();
        self.typing
            .write()
            .await
            .retain(|(_, inserted)| now.duration_since(*inserted) < ttl);
    }

    async fn push_entry(&self, entry: ChatEntry) {
        self.messages.write().await.push(entry);
    }

    /// Insert a typist unless an entry with the same (userId, roomId)
    /// already exists.
    async fn add_typist(&self, user: TypingUser) {
        let mut typing = self.typing.write().await;
        let exists = typing
            .iter()
            .any(|(u, _)| u.user_id == user.user_id && u.room_id == user.room_id);
        if !exists {
            typing.push((user, Instant::now()));
        }
    }

    /// Remove every entry matching the (userId, roomId) pair.
    async fn remove_typist(&self, user_id: &str, room_id: &str) {
        self.typing
            .write()
            .await
            .retain(|(u, _)| !(u.user_id == user_id && u.room_id == room_id));
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes inbound frames into [`ChatState`].
pub struct MessageRouter {
    state: Arc<ChatState>,
}

impl MessageRouter {
    pub fn new(state: Arc<ChatState>) -> Self {
        Self { state }
    }

    /// Dispatch one raw inbound frame. Side effects only; never fails.
    pub async fn route(&self, raw: &str) {
        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed inbound frame");
                return;
            }
        };

        match envelope.kind.as_str() {
            kind::AGENT_MESSAGE => match serde_json::from_value::<AgentMessage>(envelope.data) {
                Ok(message) => {
                    tracing::debug!(room = %message.room_id, "Agent message received");
                    // The role tag is forced to "agent" by the entry variant,
                    // whatever the payload claimed.
                    self.state.push_entry(ChatEntry::Agent(message)).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping invalid agent_message payload");
                }
            },
            kind::TYPING => match serde_json::from_value::<TypingEvent>(envelope.data) {
                Ok(event) => self.state.add_typist(event.into()).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping invalid typing payload");
                }
            },
            kind::STOP_TYPING => match serde_json::from_value::<StopTypingEvent>(envelope.data) {
                Ok(event) => {
                    self.state
                        .remove_typist(&event.user_id, &event.room_id)
                        .await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping invalid stop_typing payload");
                }
            },
            kind::ERROR => match serde_json::from_value::<ErrorPayload>(envelope.data) {
                Ok(payload) => {
                    tracing::error!(
                        error = %payload.error,
                        message = payload.message.as_deref().unwrap_or(""),
                        "Server error frame"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping invalid error payload");
                }
            },
            other => {
                tracing::warn!(kind = other, "Unrecognized message type");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn router() -> (MessageRouter, Arc<ChatState>) {
        let state = Arc::new(ChatState::new());
        (MessageRouter::new(Arc::clone(&state)), state)
    }

    fn agent_frame(content: &str, room: &str) -> String {
        serde_json::json!({
            "type": "agent_message",
            "data": {
                "content": content,
                "sender": "helper-bot",
                "created_at": "2026-01-01T00:00:00Z",
                "roomId": room,
            }
        })
        .to_string()
    }

    fn typing_frame(user: &str, room: &str) -> String {
        serde_json::json!({
            "type": "typing",
            "data": { "userId": user, "username": user, "roomId": room }
        })
        .to_string()
    }

    fn stop_typing_frame(user: &str, room: &str) -> String {
        serde_json::json!({
            "type": "stop_typing",
            "data": { "userId": user, "roomId": room }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_agent_message_appended_with_agent_role() {
        let (router, state) = router();
        router.route(&agent_frame("hello", "r1")).await;

        let messages = state.messages().await;
        assert_eq!(messages.len(), 1);
        let ChatEntry::Agent(msg) = &messages[0] else {
            panic!("expected agent entry");
        };
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.room_id, "r1");
    }

    #[tokio::test]
    async fn test_message_log_preserves_order() {
        let (router, state) = router();
        router.route(&agent_frame("first", "r")).await;
        router.route(&agent_frame("second", "r")).await;

        let messages = state.messages().await;
        assert_eq!(messages.len(), 2);
        let ChatEntry::Agent(first) = &messages[0] else {
            panic!()
        };
        assert_eq!(first.content, "first");
    }

    #[tokio::test]
    async fn test_clear_messages() {
        let (router, state) = router();
        router.route(&agent_frame("hello", "r")).await;
        state.clear_messages().await;
        assert!(state.messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_typing_is_single_entry() {
        let (router, state) = router();
        router.route(&typing_frame("u1", "r1")).await;
        router.route(&typing_frame("u1", "r1")).await;

        assert_eq!(state.typing_users().await.len(), 1);
    }

    #[tokio::test]
    async fn test_same_user_different_rooms_are_separate() {
        let (router, state) = router();
        router.route(&typing_frame("u1", "r1")).await;
        router.route(&typing_frame("u1", "r2")).await;

        assert_eq!(state.typing_users().await.len(), 2);
    }

    #[tokio::test]
    async fn test_stop_typing_empties_matching_pair() {
        let (router, state) = router();
        router.route(&typing_frame("u1", "r1")).await;
        router.route(&typing_frame("u1", "r1")).await;
        router.route(&stop_typing_frame("u1", "r1")).await;

        assert!(state.typing_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_typing_leaves_other_rooms() {
        let (router, state) = router();
        router.route(&typing_frame("u1", "r1")).await;
        router.route(&typing_frame("u1", "r2")).await;
        router.route(&stop_typing_frame("u1", "r1")).await;

        let typing = state.typing_users().await;
        assert_eq!(typing.len(), 1);
        assert_eq!(typing[0].room_id, "r2");
    }

    #[tokio::test]
    async fn test_malformed_json_is_discarded() {
        let (router, state) = router();
        router.route("{not json at all").await;
        router.route(&agent_frame("still works", "r")).await;

        assert_eq!(state.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_kind_mutates_nothing() {
        let (router, state) = router();
        router
            .route(r#"{"type":"presence_update","data":{"userId":"u"}}"#)
            .await;

        assert!(state.messages().await.is_empty());
        assert!(state.typing_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_error_frame_mutates_nothing() {
        let (router, state) = router();
        router
            .route(r#"{"type":"error","data":{"error":"room full","message":"try later"}}"#)
            .await;

        assert!(state.messages().await.is_empty());
        assert!(state.typing_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_payload_for_known_kind_is_discarded() {
        let (router, state) = router();
        // agent_message with no content field.
        router
            .route(r#"{"type":"agent_message","data":{"roomId":"r"}}"#)
            .await;

        assert!(state.messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_expire_stale_typing() {
        let (router, state) = router();
        router.route(&typing_frame("u1", "r1")).await;

        // A zero TTL makes every entry stale.
        state.expire_stale_typing(Duration::ZERO).await;
        assert!(state.typing_users().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_age_on_the_tokio_clock() {
        let (router, state) = router();
        router.route(&typing_frame("u1", "r1")).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        state.expire_stale_typing(Duration::from_secs(10)).await;
        assert!(state.typing_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_expire_keeps_fresh_entries() {
        let (router, state) = router();
        router.route(&typing_frame("u1", "r1")).await;

        state.expire_stale_typing(Duration::from_secs(60)).await;
        assert_eq!(state.typing_users().await.len(), 1);
    }
}
