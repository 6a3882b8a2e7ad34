//! Channel connection lifecycle.
//!
//! One event loop owns the transport, the retry timer, and the connection
//! phase. Caller commands, transport events, and timer expiry all land on
//! the same queue and are handled in arrival order:
//!
//! ```text
//! connect()/send()/reconnect()  --\
//! transport opened/frame/closed ---+--> event loop --> ChatState
//! retry timer expiry            --/        |
//!                                          v
//!                                  ConnectionStatus
//! ```
//!
//! No caller-facing operation blocks; outcomes are observed through
//! [`ConnectionStatus`] and [`ChatState`]. A non-normal close schedules a
//! reconnect at a constant interval until the attempt ceiling is reached;
//! after that the error flag stays set until `reconnect()` is called.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::channel::protocol::{self, ChatEntry, TypingUser};
use crate::channel::router::{ChatState, MessageRouter};
use crate::channel::transport::{Connector, EventSink, TransportEvent, NORMAL_CLOSURE};
use crate::channel::websocket::WebSocketConnector;
use crate::config::ChannelConfig;
use crate::session::Session;

/// Connection phase of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Observable connection state.
///
/// Thread-safe via atomics and an async lock, mirroring how the event
/// loop publishes without ever blocking a reader.
pub struct ConnectionStatus {
    connected: AtomicBool,
    retry_scheduled: AtomicBool,
    retry_attempts: AtomicU32,
    error: RwLock<Option<String>>,
}

impl ConnectionStatus {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            retry_scheduled: AtomicBool::new(false),
            retry_attempts: AtomicU32::new(0),
            error: RwLock::new(None),
        }
    }

    /// Whether the channel is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Whether a reconnect timer is pending.
    pub fn retry_scheduled(&self) -> bool {
        self.retry_scheduled.load(Ordering::Relaxed)
    }

    /// Automatic reconnect attempts made since the last successful open.
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts.load(Ordering::Relaxed)
    }

    /// The current connection error, if any.
    pub async fn connection_error(&self) -> Option<String> {
        self.error.read().await.clone()
    }

    async fn set_error(&self, error: Option<&str>) {
        *self.error.write().await = error.map(str::to_string);
    }
}

/// Commands and events processed by the event loop.
enum Command {
    Connect,
    Disconnect,
    Reconnect,
    Send(serde_json::Value),
    SendUserMessage { content: String, room_id: String },
    SendTyping { room_id: String, is_typing: bool },
    CredentialChanged(Option<Session>),
    VisibilityResumed,
    RetryElapsed,
    Shutdown,
}

/// Handle to a messaging channel.
///
/// All methods return immediately; the event loop applies them in order.
/// Dropping the handle shuts the loop down, cancelling any pending retry
/// timer and closing the transport.
pub struct ChannelClient {
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<ConnectionStatus>,
    chat: Arc<ChatState>,
    config: ChannelConfig,
}

impl ChannelClient {
    /// Create a client over the given connector. Does not connect; call
    /// [`connect`](Self::connect) (or wait for a credential change).
    pub fn new(
        config: ChannelConfig,
        session: Option<Session>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let status = Arc::new(ConnectionStatus::new());
        let chat = Arc::new(ChatState::new());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();

        let event_loop = EventLoop {
            config: config.clone(),
            connector,
            session,
            status: Arc::clone(&status),
            router: MessageRouter::new(Arc::clone(&chat)),
            commands: commands_rx,
            self_tx: commands_tx.clone(),
            transport_rx,
            transport_tx,
            transport: None,
            generation: 0,
            phase: Phase::Disconnected,
            retry_timer: None,
        };
        tokio::spawn(event_loop.run());

        Self {
            commands: commands_tx,
            status,
            chat,
            config,
        }
    }

    /// Create a client over the production WebSocket transport.
    pub fn over_websocket(config: ChannelConfig, session: Option<Session>) -> Self {
        Self::new(config, session, Arc::new(WebSocketConnector))
    }

    /// Open the connection. No-op without a credential or when already open.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Close the connection with a normal closure and cancel any pending
    /// retry. Idempotent.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Disconnect, reset the retry counter, and connect again after a short
    /// fixed delay. The manual override for an exhausted retry budget.
    pub fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect);
    }

    /// Transmit a raw envelope. Dropped with a warning unless the channel
    /// is open — at-most-once, best-effort delivery.
    pub fn send(&self, payload: serde_json::Value) {
        let _ = self.commands.send(Command::Send(payload));
    }

    /// Send a `user_message` envelope for the current session.
    pub fn send_user_message(&self, content: impl Into<String>, room_id: impl Into<String>) {
        let _ = self.commands.send(Command::SendUserMessage {
            content: content.into(),
            room_id: room_id.into(),
        });
    }

    /// Send a `typing` or `stop_typing` envelope for the current session.
    pub fn send_typing(&self, room_id: impl Into<String>, is_typing: bool) {
        let _ = self.commands.send(Command::SendTyping {
            room_id: room_id.into(),
            is_typing,
        });
    }

    /// Convenience for `send_typing(room_id, false)`.
    pub fn send_stop_typing(&self, room_id: impl Into<String>) {
        self.send_typing(room_id, false);
    }

    /// Replace the credential. `Some` connects, `None` disconnects.
    pub fn credential_changed(&self, session: Option<Session>) {
        let _ = self.commands.send(Command::CredentialChanged(session));
    }

    /// Opportunistic recovery when the host UI becomes visible again:
    /// connects if a credential is present and the channel is not open.
    pub fn visibility_resumed(&self) {
        let _ = self.commands.send(Command::VisibilityResumed);
    }

    /// Stop the event loop, cancelling the retry timer and closing the
    /// transport.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Observable connection state.
    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Whether the channel is currently open.
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// The current connection error, if any.
    pub async fn connection_error(&self) -> Option<String> {
        self.status.connection_error().await
    }

    /// Snapshot of the message log.
    pub async fn messages(&self) -> Vec<ChatEntry> {
        self.chat.messages().await
    }

    /// Clear the message log.
    pub async fn clear_messages(&self) {
        self.chat.clear_messages().await;
    }

    /// Snapshot of users currently typing.
    pub async fn typing_users(&self) -> Vec<TypingUser> {
        self.chat.typing_users().await
    }

    /// Sweep typing entries older than the configured TTL.
    pub async fn expire_stale_typing(&self) {
        self.chat.expire_stale_typing(self.config.typing_ttl()).await;
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// Whether the event loop keeps running after a command.
#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

struct EventLoop {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    session: Option<Session>,
    status: Arc<ConnectionStatus>,
    router: MessageRouter,
    commands: mpsc::UnboundedReceiver<Command>,
    self_tx: mpsc::UnboundedSender<Command>,
    transport_rx: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
    transport_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    transport: Option<Box<dyn crate::channel::transport::Transport>>,
    /// Generation of the current transport; events stamped with an older
    /// generation belong to a replaced connection and are ignored.
    generation: u64,
    phase: Phase,
    retry_timer: Option<JoinHandle<()>>,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle_command(command).await == Flow::Stop {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                Some((generation, event)) = self.transport_rx.recv() => {
                    self.handle_transport(generation, event).await;
                }
            }
        }
        self.teardown().await;
    }

    async fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Connect => self.connect().await,
            Command::Disconnect => self.disconnect().await,
            Command::Reconnect => {
                self.disconnect().await;
                self.status.retry_attempts.store(0, Ordering::Relaxed);
                self.schedule_retry(self.config.manual_reconnect_delay());
            }
            Command::Send(payload) => self.transmit(payload).await,
            Command::SendUserMessage { content, room_id } => {
                match &self.session {
                    Some(session) => {
                        let frame = protocol::user_message_frame(session, &content, &room_id);
                        self.transmit(frame).await;
                    }
                    None => tracing::warn!("No session; dropping user message"),
                }
            }
            Command::SendTyping { room_id, is_typing } => match &self.session {
                Some(session) => {
                    let frame = protocol::typing_frame(session, &room_id, is_typing);
                    self.transmit(frame).await;
                }
                None => tracing::warn!("No session; dropping typing update"),
            },
            Command::CredentialChanged(session) => {
                self.session = session;
                if self.session.is_some() {
                    self.connect().await;
                } else {
                    self.disconnect().await;
                }
            }
            Command::VisibilityResumed => {
                if self.session.is_some() && self.phase != Phase::Open {
                    tracing::debug!("UI visible again, attempting to reconnect");
                    self.connect().await;
                }
            }
            Command::RetryElapsed => {
                self.status.retry_scheduled.store(false, Ordering::Relaxed);
                self.retry_timer = None;
                self.connect().await;
            }
            Command::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    async fn handle_transport(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation {
            tracing::trace!(generation, "Ignoring event from replaced transport");
            return;
        }
        match event {
            TransportEvent::Opened => {
                self.phase = Phase::Open;
                self.status.connected.store(true, Ordering::Relaxed);
                self.status.retry_attempts.store(0, Ordering::Relaxed);
                self.status.set_error(None).await;
                tracing::info!("Channel connected");
            }
            TransportEvent::Frame(text) => {
                self.router.route(&text).await;
            }
            TransportEvent::Closed { code } => {
                tracing::debug!(code, "Channel connection closed");
                self.transport = None;
                self.phase = Phase::Disconnected;
                self.status.connected.store(false, Ordering::Relaxed);

                if code != NORMAL_CLOSURE {
                    self.status.set_error(Some("Connection lost")).await;
                    self.schedule_retry_if_allowed();
                }
            }
        }
    }

    /// Open a new transport. No-op without a credential or when already
    /// open.
    async fn connect(&mut self) {
        let Some(session) = &self.session else {
            tracing::warn!("No credential available, skipping channel connection");
            return;
        };
        if self.phase == Phase::Open {
            tracing::debug!("Channel already connected");
            return;
        }

        let address = format!(
            "{}?token={}",
            self.config.endpoint,
            urlencoding::encode(session.token())
        );

        self.generation += 1;
        let sink = EventSink::new(self.generation, self.transport_tx.clone());
        self.phase = Phase::Connecting;
        tracing::debug!(endpoint = %self.config.endpoint, "Opening channel connection");

        match self.connector.connect(&address, sink).await {
            Ok(transport) => {
                self.transport = Some(transport);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open channel connection");
                self.phase = Phase::Disconnected;
                self.status
                    .set_error(Some("Failed to open channel connection"))
                    .await;
                self.schedule_retry_if_allowed();
            }
        }
    }

    /// Close the transport with a normal closure, cancel any pending retry,
    /// and clear the error state. Idempotent.
    async fn disconnect(&mut self) {
        self.cancel_retry_timer();

        if let Some(mut transport) = self.transport.take() {
            self.phase = Phase::Closing;
            // Invalidate in-flight events from this transport.
            self.generation += 1;
            if let Err(e) = transport.close(NORMAL_CLOSURE).await {
                tracing::debug!(error = %e, "Error closing transport");
            }
        }

        self.phase = Phase::Disconnected;
        self.status.connected.store(false, Ordering::Relaxed);
        self.status.set_error(None).await;
    }

    /// Schedule an automatic retry unless the attempt ceiling is reached.
    fn schedule_retry_if_allowed(&mut self) {
        let attempts = self.status.retry_attempts();
        if attempts < self.config.max_reconnect_attempts {
            self.status
                .retry_attempts
                .store(attempts + 1, Ordering::Relaxed);
            tracing::info!(
                attempt = attempts + 1,
                max = self.config.max_reconnect_attempts,
                "Scheduling reconnect"
            );
            self.schedule_retry(self.config.retry_interval());
        } else {
            tracing::error!("Max reconnection attempts reached");
        }
    }

    /// Start the retry timer, replacing any pending one. The timer is an
    /// exclusively owned resource; two live timers could double-connect.
    fn schedule_retry(&mut self, delay: Duration) {
        self.cancel_retry_timer();
        let tx = self.self_tx.clone();
        self.status.retry_scheduled.store(true, Ordering::Relaxed);
        self.retry_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::RetryElapsed);
        }));
    }

    fn cancel_retry_timer(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
        self.status.retry_scheduled.store(false, Ordering::Relaxed);
    }

    /// Serialize and transmit a frame if the channel is open; otherwise
    /// drop it with a warning.
    async fn transmit(&mut self, payload: serde_json::Value) {
        if self.phase != Phase::Open {
            tracing::warn!("Channel is not connected, dropping outbound message");
            return;
        }
        let Some(transport) = self.transport.as_mut() else {
            tracing::warn!("Channel is not connected, dropping outbound message");
            return;
        };
        if let Err(e) = transport.send_text(payload.to_string()).await {
            tracing::warn!(error = %e, "Failed to send frame");
        }
    }

    async fn teardown(&mut self) {
        self.disconnect().await;
    }
}
