//! The session state machine, as a pure value.
//!
//! Every flag the connection lifecycle depends on lives in one struct,
//! mutated only through the transition methods below. This is a state
//! machine with six states:
//!
//! ```text
//!   Idle ──→ Connecting ──→ AuthPending ──→ Authenticated ──→ Closed
//!                ↑               │  │
//!                └──(timeout,    │  └──(explicit rejection)──→ Closed
//!                    < budget)───┘
//!                                └──(timeout, budget spent)──→ Blocked
//! ```
//!
//! # Generations
//!
//! Every transition that abandons a transport bumps a generation
//! counter, and every event carries the generation it was observed
//! under. A stale-generation event is ignored — so the forced close of
//! a timed-out socket can never double-fire the disconnect path, and a
//! late authentication ack for an abandoned attempt can never resurrect
//! a session. Stale events are rejected structurally rather than by
//! hoping an old callback went out of scope.
//!
//! The machine is pure: no timers, no sockets, no I/O. The driver owns
//! those and asks the machine what each event means.

use std::time::Instant;

/// Lifecycle states of a real-time session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has happened yet.
    Idle,
    /// A transport is being opened (first attempt or retry).
    Connecting,
    /// Transport open, sealed descriptor sent, awaiting the ack.
    AuthPending,
    /// Handshake complete; data frames are ingested in this state only.
    Authenticated,
    /// Retry budget spent. Terminal; surfaced as a "server busy"
    /// condition, never retried further.
    Blocked,
    /// Terminal close (rejection, disconnect, or manual exit).
    Closed,
}

/// What an authentication timeout means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Budget remains: force-close the old transport and reconnect
    /// under the new generation.
    Retry { generation: u64 },
    /// Budget spent: terminal busy state, no further attempts.
    Blocked,
    /// The timeout belonged to an abandoned attempt; ignore it.
    Stale,
}

/// What a transport close means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseVerdict {
    /// The close belonged to an abandoned transport; ignore it.
    Stale,
    /// Dropped mid-handshake: same bounded retry budget as a timeout.
    Retry { generation: u64 },
    /// Dropped mid-handshake with no budget left.
    Blocked,
    /// The session is over. `needs_settlement` is set when an
    /// authenticated session ended without being finalized and the
    /// close was not a manual exit.
    Closed { needs_settlement: bool },
}

/// One real-time session's lifecycle, owned by a single driver task.
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    retry_count: u32,
    max_retries: u32,
    generation: u64,
    last_auth_attempt_at: Option<Instant>,
    finalized: bool,
    manual_exit: bool,
}

impl SessionMachine {
    /// Creates a machine in `Idle` with the given retry budget (total
    /// connection attempts, not re-attempts).
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: SessionState::Idle,
            retry_count: 0,
            max_retries,
            generation: 0,
            last_auth_attempt_at: None,
            finalized: false,
            manual_exit: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The current generation. Events observed under an older value are
    /// stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the descriptor was last presented, if an attempt was made.
    pub fn last_auth_attempt_at(&self) -> Option<Instant> {
        self.last_auth_attempt_at
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// `Idle/Closed → Connecting`: start (or explicitly restart) the
    /// session. Returns the generation the new attempt runs under, or
    /// `None` when connecting is not legal from the current state.
    pub fn begin_connect(&mut self) -> Option<u64> {
        match self.state {
            SessionState::Idle | SessionState::Closed => {
                // An explicit reconnect is a fresh session: the old
                // finalization/exit flags must not leak into it.
                self.finalized = false;
                self.manual_exit = false;
                self.retry_count = 0;
                self.state = SessionState::Connecting;
                self.generation += 1;
                Some(self.generation)
            }
            _ => None,
        }
    }

    /// `Connecting → AuthPending`: the transport opened. Returns `true`
    /// when the caller should send the descriptor and arm the auth
    /// timeout.
    pub fn on_open(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != SessionState::Connecting {
            return false;
        }
        self.state = SessionState::AuthPending;
        self.last_auth_attempt_at = Some(Instant::now());
        true
    }

    /// `AuthPending → Authenticated`: the backend acknowledged. Resets
    /// the retry counter. A late ack — stale generation, or the machine
    /// no longer in `AuthPending` — is ignored and returns `false`:
    /// there is no path to `Authenticated` from `Connecting` or
    /// `Closed`.
    pub fn on_auth_ack(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != SessionState::AuthPending {
            return false;
        }
        self.state = SessionState::Authenticated;
        self.retry_count = 0;
        true
    }

    /// `Connecting/AuthPending → Closed`: the backend (or the issuance
    /// path) rejected the attempt outright. Not retried; the caller
    /// surfaces the error verbatim. Returns `false` for stale events.
    pub fn on_auth_rejected(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        match self.state {
            SessionState::Connecting | SessionState::AuthPending => {
                self.state = SessionState::Closed;
                true
            }
            _ => false,
        }
    }

    /// The auth timeout fired before an ack arrived.
    ///
    /// Below the budget this moves back to `Connecting` under a **new**
    /// generation, so the forced close of the timed-out transport is
    /// stale by construction and cannot fire the disconnect path. At
    /// the budget it moves to the terminal `Blocked` state.
    pub fn on_auth_timeout(&mut self, generation: u64) -> RetryVerdict {
        if generation != self.generation || self.state != SessionState::AuthPending {
            return RetryVerdict::Stale;
        }
        self.retry_count += 1;
        if self.retry_count >= self.max_retries {
            self.state = SessionState::Blocked;
            return RetryVerdict::Blocked;
        }
        self.state = SessionState::Connecting;
        self.generation += 1;
        RetryVerdict::Retry {
            generation: self.generation,
        }
    }

    /// The transport closed (or failed to open).
    ///
    /// From `Authenticated` this ends the session, reporting whether
    /// finalization is still owed. Mid-handshake it spends the same
    /// retry budget as a timeout. Anything else is stale.
    pub fn on_transport_closed(&mut self, generation: u64) -> CloseVerdict {
        if generation != self.generation {
            return CloseVerdict::Stale;
        }
        match self.state {
            SessionState::Authenticated => {
                self.state = SessionState::Closed;
                CloseVerdict::Closed {
                    needs_settlement: !self.finalized && !self.manual_exit,
                }
            }
            SessionState::Connecting | SessionState::AuthPending => {
                self.retry_count += 1;
                if self.retry_count >= self.max_retries {
                    self.state = SessionState::Blocked;
                    return CloseVerdict::Blocked;
                }
                self.state = SessionState::Connecting;
                self.generation += 1;
                CloseVerdict::Retry {
                    generation: self.generation,
                }
            }
            _ => CloseVerdict::Stale,
        }
    }

    /// Records that end-of-session finalization has run, so a later
    /// close does not ask for it again.
    pub fn mark_finalized(&mut self) {
        self.finalized = true;
    }

    /// Manual exit. Idempotent; bumps the generation so every in-flight
    /// timer and socket event becomes stale, and suppresses the
    /// disconnect-finalization path for the deliberate close that
    /// follows.
    pub fn teardown(&mut self) -> u64 {
        self.manual_exit = true;
        self.state = SessionState::Closed;
        self.generation += 1;
        self.generation
    }
}

// =========================================================================
// Tests
// =========================================================================
