//! Client side of the real-time channel.
//!
//! A single driver task owns the connection and walks an explicit state
//! machine: disconnected -> connecting -> connected, with bounded
//! exponential-backoff reconnects on transport failure. The caller holds a
//! cheap handle; connect, emit and disconnect never block, and outcomes
//! arrive as [`ChannelEvent`]s.

use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{conversation_room, room_name, ClientCommand, PresenceStatus, ServerEvent};
use crate::auth;

pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(20_000);
pub const DEFAULT_TYPING_IDLE: Duration = Duration::from_secs(3);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings for the channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Transport endpoint, e.g. `ws://127.0.0.1:8080/ws`.
    pub endpoint: String,
    /// Bearer credential issued by the auth service.
    pub token: String,
    pub user_id: String,
    /// Consecutive transport failures tolerated before giving up.
    pub reconnect_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub handshake_timeout: Duration,
    pub typing_idle: Duration,
}

impl ChannelConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            user_id: user_id.into(),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            typing_idle: DEFAULT_TYPING_IDLE,
        }
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Everything the channel reports back to its owner.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    /// A reconnect is scheduled after `delay`. `attempt` counts consecutive
    /// transport failures so far.
    Reconnecting { attempt: u32, delay: Duration },
    /// A typed event arrived from the server.
    Event(ServerEvent),
    /// The credential is expired or was rejected; reconnecting is pointless
    /// until the caller re-authenticates. Never consumes a retry attempt.
    AuthRequired,
    /// The retry budget is exhausted. Emitted exactly once, after which the
    /// channel stays disconnected.
    Failed(String),
}

enum Command {
    Emit(ClientCommand),
    Typing(String),
    StopTyping(String),
    Disconnect,
}

/// Handle to a running channel. Dropping it tears the connection down and
/// cancels all pending timers.
pub struct Channel {
    user_id: String,
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl Channel {
    /// Spawn the driver task and begin connecting. Events arrive on the
    /// returned receiver.
    pub fn connect(config: ChannelConfig) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let user_id = config.user_id.clone();
        let task = tokio::spawn(run(config, cmd_rx, event_tx, state_tx));

        (
            Self {
                user_id,
                cmd_tx,
                state_rx,
                task,
            },
            event_rx,
        )
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch handle for callers that render connectivity affordances.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Send a raw command. Dropped silently unless connected.
    pub fn emit(&self, command: ClientCommand) {
        let _ = self.cmd_tx.send(Command::Emit(command));
    }

    pub fn join_room(&self, room: &str) {
        self.emit(ClientCommand::JoinRoom {
            room: room.to_string(),
        });
    }

    pub fn leave_room(&self, room: &str) {
        self.emit(ClientCommand::LeaveRoom {
            room: room.to_string(),
        });
    }

    pub fn join_conversation(&self, conversation_id: &str) {
        self.join_room(&conversation_room(conversation_id));
    }

    pub fn leave_conversation(&self, conversation_id: &str) {
        self.leave_room(&conversation_room(conversation_id));
    }

    /// Room shared with one other user, identical from both sides.
    pub fn user_room(&self, other_user_id: &str) -> String {
        room_name("user", &[self.user_id.as_str(), other_user_id])
    }

    pub fn send_message(&self, recipient_id: &str, content: &str) {
        self.emit(ClientCommand::SendMessage {
            recipient_id: recipient_id.to_string(),
            content: content.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    pub fn update_status(&self, status: PresenceStatus) {
        self.emit(ClientCommand::UserStatus { status });
    }

    /// Report a keystroke in a conversation. The first call per idle period
    /// emits `typing_start`; the idle timer re-arms on every call and emits
    /// `typing_stop` exactly once when it lapses.
    pub fn typing(&self, conversation_id: &str) {
        let _ = self.cmd_tx.send(Command::Typing(conversation_id.to_string()));
    }

    /// Stop typing immediately instead of waiting out the idle timer.
    pub fn stop_typing(&self, conversation_id: &str) {
        let _ = self
            .cmd_tx
            .send(Command::StopTyping(conversation_id.to_string()));
    }

    /// User-initiated disconnect; supersedes any pending reconnect and is
    /// exempt from auto-reconnect.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Exit {
    Manual,
    Lost,
    AuthRejected,
}

async fn run(
    config: ChannelConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    state_tx: watch::Sender<ConnectionState>,
) {
    let mut failures: u32 = 0;

    loop {
        // A dead credential short-circuits before the transport is touched
        // and does not count against the retry budget.
        if auth::token_is_expired(&config.token) {
            let _ = state_tx.send(ConnectionState::Disconnected);
            let _ = events.send(ChannelEvent::AuthRequired);
            return;
        }

        let _ = state_tx.send(ConnectionState::Connecting);
        let url = format!(
            "{}?token={}&userId={}",
            config.endpoint, config.token, config.user_id
        );

        let failure_reason = match timeout(config.handshake_timeout, connect_async(url.as_str()))
            .await
        {
            Ok(Ok((stream, _response))) => {
                failures = 0;
                let _ = state_tx.send(ConnectionState::Connected);
                let _ = events.send(ChannelEvent::Connected);

                let exit = drive(stream, &config, &mut cmd_rx, &events).await;
                let _ = state_tx.send(ConnectionState::Disconnected);
                let _ = events.send(ChannelEvent::Disconnected);
                match exit {
                    Exit::Manual => return,
                    Exit::AuthRejected => {
                        let _ = events.send(ChannelEvent::AuthRequired);
                        return;
                    }
                    Exit::Lost => "connection lost".to_string(),
                }
            }
            Ok(Err(err)) if is_auth_rejection(&err) => {
                let _ = state_tx.send(ConnectionState::Disconnected);
                let _ = events.send(ChannelEvent::AuthRequired);
                return;
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => "handshake timed out".to_string(),
        };

        failures += 1;
        if failures >= config.reconnect_attempts.max(1) {
            let _ = state_tx.send(ConnectionState::Disconnected);
            let _ = events.send(ChannelEvent::Failed(failure_reason));
            return;
        }

        let delay = backoff_delay(&config, failures - 1);
        tracing::debug!(attempt = failures, ?delay, "scheduling reconnect");
        let _ = events.send(ChannelEvent::Reconnecting {
            attempt: failures,
            delay,
        });

        tokio::select! {
            _ = sleep(delay) => {}
            _ = wait_for_disconnect(&mut cmd_rx) => {
                // Manual disconnect supersedes the pending reconnect.
                let _ = state_tx.send(ConnectionState::Disconnected);
                let _ = events.send(ChannelEvent::Disconnected);
                return;
            }
        }
    }
}

/// delay = min(base * 2^exponent, cap)
fn backoff_delay(config: &ChannelConfig, exponent: u32) -> Duration {
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    config
        .base_delay
        .saturating_mul(factor)
        .min(config.max_delay)
}

/// Swallow commands during backoff; only a disconnect (or a dropped handle)
/// is meaningful while there is no transport.
async fn wait_for_disconnect(cmd_rx: &mut mpsc::UnboundedReceiver<Command>) {
    loop {
        match cmd_rx.recv().await {
            Some(Command::Disconnect) | None => return,
            Some(_) => {}
        }
    }
}

struct TypingState {
    conversation_id: String,
    deadline: Instant,
}

async fn drive(
    stream: WsStream,
    config: &ChannelConfig,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<ChannelEvent>,
) -> Exit {
    let (mut sink, mut source) = stream.split();
    let mut typing: Option<TypingState> = None;

    loop {
        // A dormant far-future deadline keeps the select arm well-formed
        // while nobody is typing; the `if` guard keeps it from firing.
        let typing_deadline = typing
            .as_ref()
            .map(|t| t.deadline)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));

        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            let _ = events.send(ChannelEvent::Event(event));
                        }
                        Err(err) => tracing::debug!("ignoring unknown server frame: {}", err),
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let auth_rejected = frame
                        .as_ref()
                        .map(|f| is_auth_close(&f.reason))
                        .unwrap_or(false);
                    return if auth_rejected { Exit::AuthRejected } else { Exit::Lost };
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return Exit::Lost,
            },
            command = cmd_rx.recv() => match command {
                Some(Command::Emit(cmd)) => {
                    if send_command(&mut sink, &cmd).await.is_err() {
                        return Exit::Lost;
                    }
                }
                Some(Command::Typing(conversation_id)) => {
                    let already_typing = typing
                        .as_ref()
                        .map(|t| t.conversation_id == conversation_id)
                        .unwrap_or(false);
                    if !already_typing {
                        if let Some(previous) = typing.take() {
                            // Switched conversations mid-typing.
                            let stop = ClientCommand::TypingStop {
                                conversation_id: previous.conversation_id,
                            };
                            if send_command(&mut sink, &stop).await.is_err() {
                                return Exit::Lost;
                            }
                        }
                        let start = ClientCommand::TypingStart {
                            conversation_id: conversation_id.clone(),
                        };
                        if send_command(&mut sink, &start).await.is_err() {
                            return Exit::Lost;
                        }
                    }
                    typing = Some(TypingState {
                        conversation_id,
                        deadline: Instant::now() + config.typing_idle,
                    });
                }
                Some(Command::StopTyping(conversation_id)) => {
                    let matches_current = typing
                        .as_ref()
                        .map(|t| t.conversation_id == conversation_id)
                        .unwrap_or(false);
                    if matches_current {
                        typing = None;
                        let stop = ClientCommand::TypingStop { conversation_id };
                        if send_command(&mut sink, &stop).await.is_err() {
                            return Exit::Lost;
                        }
                    }
                }
                Some(Command::Disconnect) | None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Exit::Manual;
                }
            },
            _ = sleep_until(typing_deadline), if typing.is_some() => {
                if let Some(state) = typing.take() {
                    let stop = ClientCommand::TypingStop {
                        conversation_id: state.conversation_id,
                    };
                    if send_command(&mut sink, &stop).await.is_err() {
                        return Exit::Lost;
                    }
                }
            }
        }
    }
}

async fn send_command<S>(sink: &mut S, command: &ClientCommand) -> Result<(), ()>
where
    S: SinkExt<WsMessage> + Unpin,
{
    let json = serde_json::to_string(command).map_err(|_| ())?;
    sink.send(WsMessage::Text(json)).await.map_err(|_| ())
}

fn is_auth_rejection(err: &tungstenite::Error) -> bool {
    match err {
        tungstenite::Error::Http(response) => response.status().as_u16() == 401,
        _ => false,
    }
}

fn is_auth_close(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    reason.contains("token") || reason.contains("auth")
}
