//! Integration tests for the real-time session driver against a fake
//! streaming backend (an in-process WebSocket listener).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tradecast_client::{
    ClientConfig, ClientError, RealtimeSession, SessionCommand, SessionEvent, SessionTicket,
    TicketSource,
};

// =========================================================================
// Fake backend
// =========================================================================

/// How the fake backend treats each connection.
#[derive(Clone, Copy)]
enum Mode {
    /// Ack the handshake, answer `start` with a window + updates + a
    /// wallet frame, then either close or keep serving until `stop`.
    Stream { close_after: bool },
    /// Accept, swallow the hello, never reply.
    Silent,
    /// Silent until the given attempt number (1-based), acking from
    /// then on.
    AckFromAttempt(usize),
    /// Send an explicit error frame instead of an ack.
    Reject(&'static str),
}

struct Backend {
    url: String,
    attempts: Arc<AtomicUsize>,
    hellos: Arc<std::sync::Mutex<Vec<String>>>,
}

async fn spawn_backend(mode: Mode) -> Backend {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = listener.local_addr().expect("should have local addr");
    let attempts = Arc::new(AtomicUsize::new(0));
    let hellos = Arc::new(std::sync::Mutex::new(Vec::new()));

    let task_attempts = Arc::clone(&attempts);
    let task_hellos = Arc::clone(&hellos);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let attempt = task_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let hellos = Arc::clone(&task_hellos);
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };

                // First frame: the sealed descriptor.
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        hellos.lock().unwrap().push(text.to_string());
                    }
                    _ => return,
                }

                let ack = match mode {
                    Mode::Stream { .. } => true,
                    Mode::Silent => false,
                    Mode::AckFromAttempt(n) => attempt >= n,
                    Mode::Reject(message) => {
                        let _ = ws
                            .send(Message::text(format!(r#"{{"error": "{message}"}}"#)))
                            .await;
                        return;
                    }
                };

                if !ack {
                    // Hold the connection open without replying; the
                    // client's auth timeout does the rest.
                    while ws.next().await.is_some() {}
                    return;
                }

                if ws
                    .send(Message::text(r#"{"authenticated": true}"#))
                    .await
                    .is_err()
                {
                    return;
                }

                let close_after = matches!(mode, Mode::Stream { close_after: true });
                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    match text.as_str() {
                        "start" => {
                            for frame in [
                                r#"{"type": "prices", "window": [
                                    {"time": 100, "open": 10, "high": 11, "low": 9, "close": 10.5},
                                    {"time": 110, "open": 10.5, "high": 12, "low": 10, "close": 11}
                                ]}"#,
                                // Live candle ticking: replaces t=110.
                                r#"{"time": 110, "open": 10.5, "high": 12.5, "low": 10, "close": 12}"#,
                                // Stale: must be dropped, no event.
                                r#"{"time": 90, "open": 9, "high": 10, "low": 8, "close": 9.5}"#,
                                // New candle.
                                r#"{"time": 120, "open": 12, "high": 13, "low": 11.5, "close": 12.5}"#,
                                r#"{"type": "wallet", "wallet": {"balance_total": 1000.0, "balance_free": 400.0, "direction": "long"}}"#,
                            ] {
                                if ws.send(Message::text(frame)).await.is_err() {
                                    return;
                                }
                            }
                            if close_after {
                                let _ = ws.close(None).await;
                                return;
                            }
                        }
                        "stop" => {
                            let _ = ws.close(None).await;
                            return;
                        }
                        _ => {}
                    }
                }
            });
        }
    });

    Backend {
        url: format!("ws://{addr}"),
        attempts,
        hellos,
    }
}

// =========================================================================
// Helpers
// =========================================================================

#[derive(Clone)]
struct StaticTickets;

impl TicketSource for StaticTickets {
    async fn fetch(&self) -> Result<SessionTicket, ClientError> {
        Ok(SessionTicket {
            encrypted_token: "sealed-blob".into(),
            expires_at: Utc::now() + chrono::Duration::minutes(5),
        })
    }
}

#[derive(Clone)]
struct FailingTickets;

impl TicketSource for FailingTickets {
    async fn fetch(&self) -> Result<SessionTicket, ClientError> {
        Err(ClientError::TicketUnavailable(
            "issuance endpoint returned 502".into(),
        ))
    }
}

/// Short timers so no test waits for wall-clock seconds.
fn fast_config(max_auth_retries: u32) -> ClientConfig {
    ClientConfig {
        max_auth_retries,
        auth_timeout: Duration::from_millis(100),
        retry_delay: Duration::from_millis(10),
    }
}

async fn next_event(session: &mut RealtimeSession) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), session.next_event())
        .await
        .expect("timed out waiting for a session event")
        .expect("driver stopped unexpectedly")
}

// =========================================================================
// Happy path
// =========================================================================

#[tokio::test]
async fn test_handshake_and_stream_ingestion() {
    let backend = spawn_backend(Mode::Stream { close_after: true }).await;
    let mut session = RealtimeSession::spawn(&backend.url, StaticTickets, fast_config(5));

    assert_eq!(next_event(&mut session).await, SessionEvent::Connected);
    assert_eq!(next_event(&mut session).await, SessionEvent::Authenticated);

    let SessionEvent::Window(candles) = next_event(&mut session).await else {
        panic!("expected the initial window");
    };
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].time, 100);
    assert_eq!(candles[1].time, 110);

    // The t=110 update replaces the live candle; the stale t=90 update
    // is dropped without an event; t=120 appends.
    let SessionEvent::Candle(candle) = next_event(&mut session).await else {
        panic!("expected the replaced live candle");
    };
    assert_eq!(candle.time, 110);
    assert_eq!(candle.close, 12.0);

    let SessionEvent::Candle(candle) = next_event(&mut session).await else {
        panic!("expected the appended candle");
    };
    assert_eq!(candle.time, 120);

    let SessionEvent::Wallet(snapshot) = next_event(&mut session).await else {
        panic!("expected a wallet snapshot");
    };
    assert_eq!(snapshot.balance_total, 1000.0);

    // The backend closed an authenticated session: finalization is owed.
    assert_eq!(
        next_event(&mut session).await,
        SessionEvent::Closed {
            needs_settlement: true
        }
    );

    // The descriptor went out verbatim as the first frame.
    let hellos = backend.hellos.lock().unwrap();
    assert_eq!(hellos.len(), 1);
    let hello: serde_json::Value = serde_json::from_str(&hellos[0]).unwrap();
    assert_eq!(hello["encrypted_token"], "sealed-blob");
}

// =========================================================================
// Retry budget
// =========================================================================

#[tokio::test]
async fn test_silent_backend_exhausts_budget_into_busy() {
    let backend = spawn_backend(Mode::Silent).await;
    let mut session = RealtimeSession::spawn(&backend.url, StaticTickets, fast_config(3));

    for attempt in 1..=3 {
        assert_eq!(
            next_event(&mut session).await,
            SessionEvent::Connected,
            "attempt {attempt} should reach the handshake"
        );
    }
    assert_eq!(next_event(&mut session).await, SessionEvent::Busy);

    // Blocked is terminal: no further connections are attempted.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_ack_on_final_attempt_authenticates() {
    // Timeouts on attempts 1–4, ack on attempt 5: the client reaches
    // Authenticated without exceeding five total attempts.
    let backend = spawn_backend(Mode::AckFromAttempt(5)).await;
    let mut session = RealtimeSession::spawn(&backend.url, StaticTickets, fast_config(5));

    loop {
        match next_event(&mut session).await {
            SessionEvent::Connected => {}
            SessionEvent::Authenticated => break,
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert_eq!(backend.attempts.load(Ordering::SeqCst), 5);
    session.exit();
    loop {
        match next_event(&mut session).await {
            SessionEvent::Closed { needs_settlement } => {
                assert!(!needs_settlement);
                break;
            }
            // Stream frames may already be queued behind the ack.
            SessionEvent::Window(_) | SessionEvent::Candle(_) | SessionEvent::Wallet(_) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
}

// =========================================================================
// Explicit rejection
// =========================================================================

#[tokio::test]
async fn test_rejection_surfaces_verbatim_without_retry() {
    let backend = spawn_backend(Mode::Reject("session expired")).await;
    let mut session = RealtimeSession::spawn(&backend.url, StaticTickets, fast_config(5));

    assert_eq!(next_event(&mut session).await, SessionEvent::Connected);
    assert_eq!(
        next_event(&mut session).await,
        SessionEvent::AuthRejected("session expired".into())
    );
    assert_eq!(
        next_event(&mut session).await,
        SessionEvent::Closed {
            needs_settlement: false
        }
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        backend.attempts.load(Ordering::SeqCst),
        1,
        "an explicit rejection must not be retried"
    );
}

#[tokio::test]
async fn test_ticket_failure_closes_without_connecting() {
    let backend = spawn_backend(Mode::Silent).await;
    let mut session = RealtimeSession::spawn(&backend.url, FailingTickets, fast_config(5));

    let SessionEvent::AuthRejected(message) = next_event(&mut session).await else {
        panic!("expected the issuance failure to surface");
    };
    assert!(message.contains("502"));
    assert_eq!(
        next_event(&mut session).await,
        SessionEvent::Closed {
            needs_settlement: false
        }
    );
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 0);
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test]
async fn test_manual_exit_needs_no_settlement() {
    let backend = spawn_backend(Mode::Stream { close_after: false }).await;
    let mut session = RealtimeSession::spawn(&backend.url, StaticTickets, fast_config(5));

    assert_eq!(next_event(&mut session).await, SessionEvent::Connected);
    assert_eq!(next_event(&mut session).await, SessionEvent::Authenticated);
    // Drain the initial window before exiting.
    let SessionEvent::Window(_) = next_event(&mut session).await else {
        panic!("expected the initial window");
    };

    session.exit();
    // Deliberate exit: the close must not be mistaken for a
    // backend-initiated disconnect.
    loop {
        match next_event(&mut session).await {
            SessionEvent::Closed { needs_settlement } => {
                assert!(!needs_settlement, "manual exit must not owe settlement");
                break;
            }
            // In-flight data frames may still be queued; drain them.
            SessionEvent::Candle(_) | SessionEvent::Wallet(_) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_exit_is_idempotent() {
    let backend = spawn_backend(Mode::Stream { close_after: false }).await;
    let mut session = RealtimeSession::spawn(&backend.url, StaticTickets, fast_config(5));

    assert_eq!(next_event(&mut session).await, SessionEvent::Connected);
    assert_eq!(next_event(&mut session).await, SessionEvent::Authenticated);

    session.exit();
    session.exit();
    session.exit();

    let mut closed = 0;
    loop {
        match tokio::time::timeout(Duration::from_millis(300), session.next_event()).await {
            Ok(Some(SessionEvent::Closed { .. })) => closed += 1,
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }
    assert_eq!(closed, 1, "repeated exits must produce exactly one close");
}

#[tokio::test]
async fn test_finalized_session_closes_clean() {
    let backend = spawn_backend(Mode::Stream { close_after: false }).await;
    let mut session = RealtimeSession::spawn(&backend.url, StaticTickets, fast_config(5));

    assert_eq!(next_event(&mut session).await, SessionEvent::Connected);
    assert_eq!(next_event(&mut session).await, SessionEvent::Authenticated);

    // The view settled early; the backend-initiated close that follows
    // `stop` must not ask for settlement again.
    session.command(SessionCommand::MarkFinalized);
    session.command(SessionCommand::Stop);

    loop {
        match next_event(&mut session).await {
            SessionEvent::Closed { needs_settlement } => {
                assert!(!needs_settlement, "finalized session owes nothing");
                break;
            }
            SessionEvent::Window(_) | SessionEvent::Candle(_) | SessionEvent::Wallet(_) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
}
