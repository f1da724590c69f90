// ============================================
// File: crates/aries-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the contract between the transport layer and whatever sits on
//! top of it. The acceptor drives connections; the `IoHandler` decides
//! what they mean.
//!
//! ## Main Functionality
//! - `IoHandler`: lifecycle and message callbacks
//! - `IoException`: what went wrong, passed to `exception_caught`
//! - `PacketLogger`: optional raw-frame tap
//!
//! ## Callback Order (per connection)
//! ```text
//! session_created → session_opened → { message_received | message_sent }*
//!                 → session_closed
//! ```
//! `exception_caught` may fire anywhere between `session_opened` and
//! `session_closed`.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Callbacks for one connection never overlap; callbacks for different
//!   connections run concurrently on the tokio worker pool
//! - Callbacks are synchronous. Never block in them, queue work instead
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::fmt;
use std::sync::Arc;

use aries_common::SessionId;
use aries_core::CoreError;

use crate::error::TransportError;
use crate::session::IoSession;

// ============================================
// IoException
// ============================================

/// Error delivered to [`IoHandler::exception_caught`].
#[derive(Debug)]
pub enum IoException<E> {
    /// Socket or TLS failure. The connection is already ending.
    Transport(TransportError),
    /// Frame could not be decoded.
    Codec(CoreError),
    /// `message_received` returned an error.
    Handler(E),
}

impl<E: fmt::Display> fmt::Display for IoException<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Codec(e) => write!(f, "codec: {e}"),
            Self::Handler(e) => write!(f, "handler: {e}"),
        }
    }
}

// ============================================
// IoHandler
// ============================================

/// Callbacks invoked by the transport for every connection.
///
/// # Type Parameters
/// * `M` - Decoded message type produced by the listener's codec
pub trait IoHandler<M>: Send + Sync + 'static {
    /// Error returned from `message_received`.
    type Error: std::error::Error + Send + Sync + 'static;

    /// A connection was accepted and its session created.
    fn session_created(&self, session: &Arc<IoSession<M>>);

    /// The session is ready for I/O.
    fn session_opened(&self, _session: &Arc<IoSession<M>>) {}

    /// A message was decoded from the peer.
    ///
    /// # Errors
    /// Errors are passed straight to `exception_caught`.
    fn message_received(&self, session: &Arc<IoSession<M>>, message: M)
        -> Result<(), Self::Error>;

    /// A message was written to the peer.
    fn message_sent(&self, _session: &Arc<IoSession<M>>, _message: &M) {}

    /// The connection ended. Called exactly once per session.
    fn session_closed(&self, session: &Arc<IoSession<M>>);

    /// Something went wrong on this connection.
    fn exception_caught(&self, session: &Arc<IoSession<M>>, error: IoException<Self::Error>);
}

// ============================================
// PacketLogger
// ============================================

/// Direction of a logged frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From peer to server.
    Inbound,
    /// From server to peer.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inbound => "in",
            Self::Outbound => "out",
        })
    }
}

/// Receives a copy of every raw frame on a listener.
///
/// Inbound frames are delivered before decoding, outbound frames after
/// encoding.
pub trait PacketLogger: Send + Sync + 'static {
    /// Called once per frame.
    fn log_frame(&self, session: SessionId, direction: Direction, frame: &[u8]);
}
