// ============================================
// File: crates/aries-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types for frame parsing and packet decoding in the Aries
//! wire protocol.
//!
//! ## Error Categories
//! 1. **Framing**: truncated or oversize frames (fatal for the connection)
//! 2. **Content**: a complete frame whose payload does not parse (the
//!    connection survives, the frame is dropped)
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never echo ticket strings into error messages
//! - `is_framing_error` decides whether the transport tears the
//!   connection down, keep it in sync when adding variants
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use aries_common::error::CommonError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types for protocol encoding and decoding.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Message is too short to be valid.
    #[error("Message too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort {
        /// Minimum expected length
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Declared frame payload exceeds the configured maximum.
    #[error("Frame too large: max {max} bytes, declared {actual}")]
    FrameTooLarge {
        /// Maximum allowed payload size
        max: usize,
        /// Declared payload size
        actual: usize,
    },

    /// Message is malformed.
    #[error("Malformed message: {reason}")]
    MalformedMessage {
        /// What's wrong with the message
        reason: String,
    },

    /// A string field is not valid UTF-8.
    #[error("Invalid UTF-8 in field '{field}'")]
    InvalidUtf8 {
        /// Which field failed
        field: &'static str,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    /// Creates a `MalformedMessage` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Creates a `MessageTooShort` error.
    #[must_use]
    pub const fn too_short(expected: usize, actual: usize) -> Self {
        Self::MessageTooShort { expected, actual }
    }

    /// Creates a `FrameTooLarge` error.
    #[must_use]
    pub const fn frame_too_large(max: usize, actual: usize) -> Self {
        Self::FrameTooLarge { max, actual }
    }

    /// Returns `true` if the byte stream can no longer be trusted.
    ///
    /// After a framing error the reader cannot find the next frame
    /// boundary, so the connection must be closed.
    #[must_use]
    pub const fn is_framing_error(&self) -> bool {
        matches!(self, Self::FrameTooLarge { .. })
    }
}
