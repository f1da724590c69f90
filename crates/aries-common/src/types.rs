// ============================================
// File: crates/aries-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes identifiers shared by the transport layer and the server
//! core so that both sides agree on how a connection is named.
//!
//! ## Main Functionality
//! - `SessionId`: Unique identifier for a live connection (16 bytes)
//! - `SessionIdError`: Parse failures for the textual form
//!
//! ## ⚠️ Important Note for Next Developer
//! - SessionId is random, never sequential; it shows up in logs and in the
//!   debugger listing, so do not derive meaning from its value
//! - The textual form is standard base64 and must stay stable, the host
//!   store and log tooling key on it
//!
//! ## Last Modified
//! v0.1.0 - Initial identifiers

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Size of SessionId in bytes
pub const SESSION_ID_SIZE: usize = 16;

// ============================================
// SessionId Error Type
// ============================================

/// Error type for SessionId parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionIdError {
    /// Base64 decoding failed
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),
    /// Decoded bytes have wrong length
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Required number of bytes
        expected: usize,
        /// Number of bytes decoded
        actual: usize,
    },
}

// ============================================
// SessionId
// ============================================

/// Unique identifier for a live connection.
///
/// Assigned by the transport layer when a connection is accepted and kept
/// for the whole lifetime of the session, including after it is closed.
///
/// # Example
/// ```
/// use aries_common::types::SessionId;
///
/// let id = SessionId::generate();
/// let restored: SessionId = id.to_string().parse().unwrap();
/// assert_eq!(id, restored);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId([u8; SESSION_ID_SIZE]);

impl SessionId {
    /// Creates a new `SessionId` from raw bytes.
    ///
    /// Returns `None` when `bytes` is not exactly 16 bytes long.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != SESSION_ID_SIZE {
            return None;
        }
        let mut id = [0u8; SESSION_ID_SIZE];
        id.copy_from_slice(bytes);
        Some(Self(id))
    }

    /// Generates a new random `SessionId`.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = [0u8; SESSION_ID_SIZE];
        rand::thread_rng().fill_bytes(&mut id);
        Self(id)
    }

    /// Returns the raw bytes of the session ID.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SESSION_ID_SIZE] {
        &self.0
    }

    /// Returns a short prefix suitable for compact log lines.
    #[must_use]
    pub fn short(&self) -> String {
        format!(
            "{:02x}{:02x}{:02x}{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}...)", self.short())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE64.encode(self.0))
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = BASE64
            .decode(s)
            .map_err(|e| SessionIdError::InvalidBase64(e.to_string()))?;

        Self::from_bytes(&bytes).ok_or(SessionIdError::InvalidLength {
            expected: SESSION_ID_SIZE,
            actual: bytes.len(),
        })
    }
}

impl Serialize for SessionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&BASE64.encode(self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            Self::from_bytes(&bytes)
                .ok_or_else(|| serde::de::Error::invalid_length(bytes.len(), &"16 bytes"))
        }
    }
}

impl AsRef<[u8]> for SessionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
