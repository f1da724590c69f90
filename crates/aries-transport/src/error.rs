// ============================================
// File: crates/aries-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for listener setup and per-connection I/O.
//!
//! ## Error Categories
//! 1. **Setup**: bind failures, address in use, invalid address
//! 2. **Connection**: socket I/O and TLS handshake failures
//! 3. **Session**: writes to a session that is already closing
//!
//! ## ⚠️ Important Note for Next Developer
//! - `is_socket_error` drives the server's close-on-error policy; every
//!   variant raised from a live connection's socket must be covered
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use aries_common::error::CommonError;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Setup Errors
    // ========================================
    /// Failed to bind to address.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: SocketAddr,
        /// Why binding failed
        reason: String,
    },

    /// Address already in use.
    #[error("Address {addr} already in use")]
    AddressInUse {
        /// The address that's in use
        addr: SocketAddr,
    },

    /// Invalid socket address string.
    #[error("Invalid address: {addr}")]
    InvalidAddress {
        /// The invalid address string
        addr: String,
    },

    // ========================================
    // Connection Errors
    // ========================================
    /// TLS handshake with the peer failed.
    #[error("TLS handshake with {peer} failed: {reason}")]
    TlsHandshake {
        /// Remote address
        peer: SocketAddr,
        /// Why the handshake failed
        reason: String,
    },

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Session is closing and accepts no more writes.
    #[error("Session is closed")]
    SessionClosed,

    /// Listener is shutting down.
    #[error("Transport is shutting down")]
    ShuttingDown,

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` if the error came from a connection's socket.
    ///
    /// Socket errors leave the connection unusable.
    #[must_use]
    pub const fn is_socket_error(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::TlsHandshake { .. })
    }

    /// Returns `true` if this is a listener setup error.
    #[must_use]
    pub const fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::BindFailed { .. } | Self::AddressInUse { .. } | Self::InvalidAddress { .. }
        )
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::bind_failed("127.0.0.1:8080".parse().unwrap(), "address in use");
        assert!(err.to_string().contains("127.0.0.1:8080"));
        assert!(err.to_string().contains("address in use"));
    }

    #[test]
    fn test_error_classification() {
        let reset: TransportError =
            io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer").into();
        assert!(reset.is_socket_error());
        assert!(!reset.is_setup_error());

        let bind = TransportError::AddressInUse {
            addr: "127.0.0.1:1".parse().unwrap(),
        };
        assert!(bind.is_setup_error());
        assert!(!bind.is_socket_error());

        assert!(!TransportError::SessionClosed.is_socket_error());
    }
}
