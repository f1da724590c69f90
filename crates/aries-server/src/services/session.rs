// ============================================
// File: crates/aries-server/src/services/session.rs
// ============================================
//! # Aries Sessions
//!
//! ## Creation Reason
//! Wraps the transport's `IoSession` with the authentication state the
//! dispatch gate needs, and keeps the set of live sessions for shutdown
//! and introspection.
//!
//! ## Main Functionality
//! - `AriesSession`: one per live connection, anonymous until authenticated
//! - `SessionState`: per-session state machine
//! - `Sessions`: registry of live sessions behind a single lock
//! - `SessionInfo`: point-in-time view for debuggers
//!
//! ## Session Lifecycle
//! ```text
//! ┌───────────┐  challenge sent   ┌────────────────┐  auth ok  ┌───────────────┐
//! │ Connected │ ────────────────► │ Authenticating │ ────────► │ Authenticated │
//! └─────┬─────┘                   └───────┬────────┘           └───────┬───────┘
//!       │                                 │                            │
//!       └───────────── transport close ───┴────────────────────────────┘
//!                                   │
//!                                   ▼
//!                              ┌──────────┐
//!                              │  Closed  │
//!                              └──────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Authenticated never reverts; `set_authenticated` only moves forward
//! - `Sessions` holds one mutex for add/remove/snapshot. Never call back
//!   into a session's handler while holding it
//! - The `AriesSession` is stashed in the `IoSession` attribute bag under
//!   [`SESSION_ATTRIBUTE`]; it must be removed on close to break the cycle
//!
//! ## Last Modified
//! v0.1.0 - Initial session registry

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use aries_common::SessionId;
use aries_core::Packet;
use aries_transport::IoSession;

use crate::error::Result;

/// Attribute key of the `AriesSession` in its `IoSession`'s attribute bag.
pub const SESSION_ATTRIBUTE: &str = "aries.session";

// ============================================
// SessionState
// ============================================

/// Session state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no challenge sent yet.
    Connected,
    /// Challenge sent, waiting for the client's response.
    Authenticating,
    /// Authenticated; application packets are allowed.
    Authenticated,
    /// Connection ended.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::Authenticating => write!(f, "Authenticating"),
            Self::Authenticated => write!(f, "Authenticated"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ============================================
// AriesSession
// ============================================

/// Server-side view of one connection.
pub struct AriesSession {
    io: Arc<IoSession<Packet>>,
    state: RwLock<SessionState>,
    user: RwLock<Option<String>>,
}

impl AriesSession {
    /// Wraps a transport session. Starts anonymous.
    #[must_use]
    pub fn new(io: Arc<IoSession<Packet>>) -> Self {
        Self {
            io,
            state: RwLock::new(SessionState::Connected),
            user: RwLock::new(None),
        }
    }

    /// Fetches the `AriesSession` stashed in a transport session.
    #[must_use]
    pub fn from_io(io: &IoSession<Packet>) -> Option<Arc<Self>> {
        io.attribute::<Arc<Self>>(SESSION_ATTRIBUTE)
            .map(|session| Arc::clone(&*session))
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.io.id()
    }

    /// Underlying transport session.
    #[must_use]
    pub fn io(&self) -> &Arc<IoSession<Packet>> {
        &self.io
    }

    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.io.remote_addr()
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.io.is_secure()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// Authenticated user, if any.
    #[must_use]
    pub fn user(&self) -> Option<String> {
        self.user.read().clone()
    }

    /// Moves `Connected` to `Authenticating`.
    ///
    /// Returns `false` from any other state.
    pub fn begin_authentication(&self) -> bool {
        let mut state = self.state.write();
        if *state == SessionState::Connected {
            *state = SessionState::Authenticating;
            true
        } else {
            false
        }
    }

    /// Marks the session authenticated as `user`.
    ///
    /// Returns `false` if the session is closed or already authenticated;
    /// the first user sticks.
    pub fn set_authenticated(&self, user: impl Into<String>) -> bool {
        let mut state = self.state.write();
        match *state {
            SessionState::Connected | SessionState::Authenticating => {
                *self.user.write() = Some(user.into());
                *state = SessionState::Authenticated;
                true
            }
            SessionState::Authenticated | SessionState::Closed => false,
        }
    }

    pub(crate) fn mark_closed(&self) {
        *self.state.write() = SessionState::Closed;
    }

    /// Queues a packet for the peer.
    ///
    /// # Errors
    /// `Transport(SessionClosed)` once the session is closing.
    pub fn write(&self, packet: impl Into<Packet>) -> Result<()> {
        self.io.write(packet.into())?;
        Ok(())
    }

    /// Closes the connection after queued writes flush.
    pub fn close(&self) {
        debug!(session_id = %self.id(), "Closing session");
        self.io.close();
    }

    /// Stores protocol state on the connection.
    pub fn set_attribute<T: std::any::Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.io.set_attribute(key, value);
    }

    /// Reads protocol state stored with [`set_attribute`](Self::set_attribute).
    #[must_use]
    pub fn attribute<T: std::any::Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.io.attribute(key)
    }

    /// Point-in-time description for introspection.
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id(),
            remote_addr: self.remote_addr(),
            secure: self.is_secure(),
            state: self.state(),
            user: self.user(),
            age: self.io.age(),
            messages_in: self.io.messages_in(),
            messages_out: self.io.messages_out(),
        }
    }
}

impl fmt::Debug for AriesSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AriesSession")
            .field("id", &self.id())
            .field("remote_addr", &self.remote_addr())
            .field("state", &self.state())
            .field("user", &self.user())
            .finish_non_exhaustive()
    }
}

/// Snapshot of one socket session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub remote_addr: SocketAddr,
    pub secure: bool,
    pub state: SessionState,
    pub user: Option<String>,
    pub age: Duration,
    pub messages_in: u64,
    pub messages_out: u64,
}

impl SessionInfo {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }
}

// ============================================
// Sessions
// ============================================

/// Registry of live sessions.
///
/// Every add, remove and snapshot takes the same lock, so a broadcast
/// over a snapshot never sees a session whose removal already returned.
#[derive(Default)]
pub struct Sessions {
    sessions: Mutex<HashMap<SessionId, Arc<AriesSession>>>,
}

impl Sessions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session.
    pub fn add(&self, session: Arc<AriesSession>) {
        self.sessions.lock().insert(session.id(), session);
    }

    /// Registers a session unless `limit` sessions are already live.
    ///
    /// Returns `false` if the registry is full.
    pub fn try_add(&self, session: Arc<AriesSession>, limit: usize) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions.len() >= limit {
            return false;
        }
        sessions.insert(session.id(), session);
        true
    }

    /// Unregisters a session.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<AriesSession>> {
        self.sessions.lock().remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Arc<AriesSession>> {
        self.sessions.lock().get(id).cloned()
    }

    /// Point-in-time copy, safe to iterate while sessions come and go.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<AriesSession>> {
        self.sessions.lock().values().cloned().collect()
    }

    /// Requests every live session to close. Returns how many were asked.
    ///
    /// Sessions leave the registry when their transport reports the close.
    pub fn close_all(&self) -> usize {
        let sessions = self.sessions.lock();
        for session in sessions.values() {
            session.close();
        }
        sessions.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    #[must_use]
    pub fn authenticated_count(&self) -> usize {
        self.sessions
            .lock()
            .values()
            .filter(|s| s.is_authenticated())
            .count()
    }
}

impl fmt::Debug for Sessions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sessions")
            .field("sessions", &self.len())
            .finish()
    }
}

// ============================================
// Tests
// ============================================
