//! The session driver: one task owning the transport, the timers, and
//! the state machine.
//!
//! Everything happens on a single logical thread of control. Each event
//! — a frame, a timer firing, a user command — runs to completion before
//! the next is processed, so transitions never interleave. The only
//! blocking operations (ticket fetch, connect) are awaits inside the
//! same task, and a close or exit is always processable between them.
//!
//! Timers are scoped to the connection attempt they guard: the auth
//! timeout lives inside one attempt and dies with it, so a stale timer
//! can never fire against a torn-down session. Anything that *does*
//! straggle is rejected by the machine's generation check.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tradecast_protocol::{
    AccountSnapshot, Applied, Candle, CandleStore, ClientFrame, ServerFrame,
};

use crate::machine::{CloseVerdict, RetryVerdict, SessionMachine, SessionState};
use crate::ticket::{SessionTicket, TicketSource};

type Transport = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for the real-time client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Total connection attempts before the session blocks.
    /// Default: 5.
    pub max_auth_retries: u32,

    /// How long to wait for the authentication ack after presenting the
    /// descriptor. Default: 8 seconds.
    pub auth_timeout: Duration,

    /// Pause between a failed attempt and the next one.
    /// Default: 3 seconds.
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_auth_retries: 5,
            auth_timeout: Duration::from_secs(8),
            retry_delay: Duration::from_secs(3),
        }
    }
}

/// What the owning view receives from the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Transport open, descriptor presented, awaiting the ack.
    Connected,
    /// Handshake complete; data frames follow.
    Authenticated,
    /// Retry budget spent — the user-facing "server busy" condition.
    Busy,
    /// The backend rejected the handshake. Verbatim message; no retry.
    AuthRejected(String),
    /// The initial historical candle window (sorted, deduplicated).
    Window(Vec<Candle>),
    /// One applied incremental candle.
    Candle(Candle),
    /// A fresh account snapshot. Last message wins.
    Wallet(AccountSnapshot),
    /// The session ended. `needs_settlement` asks the view to run the
    /// end-of-session finalization flow before navigating away.
    Closed { needs_settlement: bool },
}

/// What the owning view can ask the driver to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Open a long position. Forwarded only while authenticated.
    Long,
    /// Open a short position. Forwarded only while authenticated.
    Short,
    /// Close the open position. Forwarded only while authenticated.
    ClosePosition,
    /// Ask the backend to end the stream from its side.
    Stop,
    /// Record that end-of-session finalization has already run.
    MarkFinalized,
    /// Manual exit: tear the session down deterministically.
    Exit,
}

/// Handle to a running real-time session.
///
/// Owned exclusively by the view that created it. Dropping the handle
/// aborts the driver task; calling [`exit`](Self::exit) first gives the
/// driver the chance to close the transport deliberately.
#[derive(Debug)]
pub struct RealtimeSession {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: tokio::task::JoinHandle<()>,
}

impl RealtimeSession {
    /// Spawns a driver for the given stream URL on the current runtime.
    pub fn spawn<T: TicketSource>(url: &str, tickets: T, config: ClientConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let machine = SessionMachine::new(config.max_auth_retries);
        let driver = Driver {
            url: url.to_string(),
            tickets,
            config,
            machine,
            store: CandleStore::new(),
            ticket: None,
            events: event_tx,
        };
        let task = tokio::spawn(driver.run(command_rx));

        Self {
            events: event_rx,
            commands: command_tx,
            task,
        }
    }

    /// The next session event, or `None` once the driver has stopped.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Sends a command to the driver. Safe to call at any time; commands
    /// that don't apply to the current state are discarded.
    pub fn command(&self, command: SessionCommand) {
        let _ = self.commands.send(command);
    }

    /// Manual exit. Idempotent — repeated calls are harmless.
    pub fn exit(&self) {
        self.command(SessionCommand::Exit);
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// What a finished connection attempt means for the outer loop.
enum Next {
    /// Reconnect under the given generation after the retry delay.
    Retry { generation: u64 },
    /// The session reached a terminal state; stop driving.
    Done,
}

struct Driver<T> {
    url: String,
    tickets: T,
    config: ClientConfig,
    machine: SessionMachine,
    store: CandleStore,
    ticket: Option<SessionTicket>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<T: TicketSource> Driver<T> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        let Some(mut generation) = self.machine.begin_connect() else {
            return;
        };

        loop {
            match self.attempt(generation, &mut commands).await {
                Next::Retry { generation: next } => {
                    generation = next;
                    if !self.wait_retry_delay(&mut commands).await {
                        return;
                    }
                }
                Next::Done => return,
            }
        }
    }

    /// One connection attempt: ticket, connect, handshake, stream.
    async fn attempt(
        &mut self,
        generation: u64,
        commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Next {
        let sealed = match self.current_ticket().await {
            Ok(sealed) => sealed,
            Err(e) => {
                // No descriptor, no handshake. Surfaced verbatim like an
                // explicit rejection; never retried.
                if self.machine.on_auth_rejected(generation) {
                    self.emit(SessionEvent::AuthRejected(e.to_string()));
                    self.emit(SessionEvent::Closed {
                        needs_settlement: false,
                    });
                }
                return Next::Done;
            }
        };

        let mut ws = match tokio_tungstenite::connect_async(self.url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                tracing::debug!(error = %e, "stream connect failed");
                return self.handle_close(generation);
            }
        };

        if !self.machine.on_open(generation) {
            let _ = ws.close(None).await;
            return Next::Done;
        }

        // First frame after open: the sealed descriptor.
        let hello = ClientFrame::Hello {
            encrypted_token: sealed,
        };
        if ws.send(Message::text(hello.encode())).await.is_err() {
            return self.handle_close(generation);
        }
        self.emit(SessionEvent::Connected);

        // Guards the AuthPending phase only; dies with this attempt.
        let auth_deadline = tokio::time::sleep(self.config.auth_timeout);
        tokio::pin!(auth_deadline);

        loop {
            tokio::select! {
                () = &mut auth_deadline,
                    if self.machine.state() == SessionState::AuthPending =>
                {
                    match self.machine.on_auth_timeout(generation) {
                        RetryVerdict::Retry { generation: next } => {
                            // Forced close. The machine already moved to a
                            // new generation, so this socket's close event
                            // is stale and cannot double-count the retry.
                            let _ = ws.close(None).await;
                            tracing::info!(
                                retry = self.machine.retry_count(),
                                "auth timed out, reconnecting"
                            );
                            return Next::Retry { generation: next };
                        }
                        RetryVerdict::Blocked => {
                            let _ = ws.close(None).await;
                            tracing::warn!("auth retry budget spent, blocking");
                            self.emit(SessionEvent::Busy);
                            return Next::Done;
                        }
                        RetryVerdict::Stale => {}
                    }
                }

                command = commands.recv() => {
                    match command {
                        Some(SessionCommand::Exit) | None => {
                            self.machine.teardown();
                            let _ = ws.close(None).await;
                            self.emit(SessionEvent::Closed {
                                needs_settlement: false,
                            });
                            return Next::Done;
                        }
                        Some(SessionCommand::MarkFinalized) => {
                            self.machine.mark_finalized();
                        }
                        Some(command) => self.forward(&mut ws, command).await,
                    }
                }

                frame = ws.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(next) =
                                self.handle_frame(generation, &mut ws, text.as_str()).await
                            {
                                return next;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return self.handle_close(generation);
                        }
                        // Ping/pong and binary frames are not part of the
                        // protocol.
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "stream error");
                            return self.handle_close(generation);
                        }
                    }
                }
            }
        }
    }

    /// Classifies and applies one inbound text frame. `Some` ends the
    /// attempt.
    async fn handle_frame(
        &mut self,
        generation: u64,
        ws: &mut Transport,
        text: &str,
    ) -> Option<Next> {
        match ServerFrame::decode(text) {
            ServerFrame::AuthAck => {
                if self.machine.on_auth_ack(generation) {
                    self.emit(SessionEvent::Authenticated);
                    // Request the initial historical window.
                    if ws.send(Message::text(ClientFrame::Start.encode())).await.is_err() {
                        return Some(self.handle_close(generation));
                    }
                } else {
                    tracing::debug!("late auth ack discarded");
                }
            }
            ServerFrame::AuthRejected(message) => {
                if self.machine.on_auth_rejected(generation) {
                    let _ = ws.close(None).await;
                    tracing::warn!(%message, "auth rejected by backend");
                    self.emit(SessionEvent::AuthRejected(message));
                    self.emit(SessionEvent::Closed {
                        needs_settlement: false,
                    });
                    return Some(Next::Done);
                }
                tracing::debug!(%message, "error frame discarded outside handshake");
            }
            ServerFrame::Window(candles) => {
                if self.machine.state() == SessionState::Authenticated {
                    self.store.load_window(candles);
                    self.emit(SessionEvent::Window(self.store.candles().to_vec()));
                } else {
                    tracing::debug!("window frame discarded outside Authenticated");
                }
            }
            ServerFrame::Update(candle) => {
                if self.machine.state() == SessionState::Authenticated {
                    match self.store.apply(candle) {
                        Applied::Dropped => {
                            tracing::debug!(time = candle.time, "stale candle dropped");
                        }
                        _ => self.emit(SessionEvent::Candle(candle)),
                    }
                } else {
                    tracing::debug!("candle frame discarded outside Authenticated");
                }
            }
            ServerFrame::Wallet(snapshot) => {
                if self.machine.state() == SessionState::Authenticated {
                    self.emit(SessionEvent::Wallet(snapshot));
                } else {
                    tracing::debug!("wallet frame discarded outside Authenticated");
                }
            }
            ServerFrame::Unrecognized => {
                tracing::debug!(frame = text, "unrecognized frame discarded");
            }
        }
        None
    }

    /// The transport closed (or never opened) under `generation`.
    fn handle_close(&mut self, generation: u64) -> Next {
        match self.machine.on_transport_closed(generation) {
            CloseVerdict::Retry { generation } => {
                tracing::info!(
                    retry = self.machine.retry_count(),
                    "stream dropped, reconnecting"
                );
                Next::Retry { generation }
            }
            CloseVerdict::Blocked => {
                tracing::warn!("retry budget spent, blocking");
                self.emit(SessionEvent::Busy);
                Next::Done
            }
            CloseVerdict::Closed { needs_settlement } => {
                self.emit(SessionEvent::Closed { needs_settlement });
                Next::Done
            }
            CloseVerdict::Stale => Next::Done,
        }
    }

    /// Forwards a trade intent. Only legal while authenticated; anything
    /// else is discarded.
    async fn forward(&mut self, ws: &mut Transport, command: SessionCommand) {
        if self.machine.state() != SessionState::Authenticated {
            tracing::debug!(?command, "command discarded outside Authenticated");
            return;
        }
        let frame = match command {
            SessionCommand::Long => ClientFrame::Long,
            SessionCommand::Short => ClientFrame::Short,
            SessionCommand::ClosePosition => ClientFrame::ClosePosition,
            SessionCommand::Stop => ClientFrame::Stop,
            // Handled before forwarding.
            SessionCommand::MarkFinalized | SessionCommand::Exit => return,
        };
        if ws.send(Message::text(frame.encode())).await.is_err() {
            tracing::debug!(?command, "send failed; close will follow");
        }
    }

    /// Sleeps out the retry delay while staying responsive to an exit.
    /// Returns `false` when the session was torn down during the wait.
    async fn wait_retry_delay(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
    ) -> bool {
        let delay = tokio::time::sleep(self.config.retry_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                () = &mut delay => return true,
                command = commands.recv() => match command {
                    Some(SessionCommand::Exit) | None => {
                        self.machine.teardown();
                        self.emit(SessionEvent::Closed {
                            needs_settlement: false,
                        });
                        return false;
                    }
                    Some(SessionCommand::MarkFinalized) => {
                        self.machine.mark_finalized();
                    }
                    Some(command) => {
                        tracing::debug!(?command, "command discarded while reconnecting");
                    }
                },
            }
        }
    }

    /// Reuses the held ticket while unexpired, otherwise fetches a
    /// fresh one.
    async fn current_ticket(&mut self) -> Result<String, crate::ClientError> {
        if let Some(ticket) = &self.ticket {
            if ticket.is_fresh() {
                return Ok(ticket.encrypted_token.clone());
            }
        }
        let ticket = self.tickets.fetch().await?;
        let sealed = ticket.encrypted_token.clone();
        self.ticket = Some(ticket);
        Ok(sealed)
    }

    fn emit(&self, event: SessionEvent) {
        // A dropped receiver means the view is gone; the driver notices
        // via the closed command channel and stops on its own.
        let _ = self.events.send(event);
    }
}
