// ============================================
// File: crates/aries-server/src/hosts/models.rs
// ============================================
//! # Host Store Data Models
//!
//! ## Main Functionality
//! - `HostRecord`: liveness row written when the server starts
//! - `HostStatus`: up / down
//! - `StatusUpdate`: body of the status change request
//!
//! ## Dependencies
//!   - serde for the JSON bodies of the HTTP store
//!
//! ## Last Modified
//! v0.1.0 - Initial host models

use std::fmt;

use serde::{Deserialize, Serialize};

use aries_common::time::Timestamp;

/// Host liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    Up,
    Down,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// One server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub call_sign: String,
    pub status: HostStatus,
    /// Unix milliseconds.
    pub boot_time: Timestamp,
    pub public_host: String,
    pub internal_host: String,
}

impl HostRecord {
    /// Record marking `call_sign` up as of now.
    #[must_use]
    pub fn up(call_sign: &str, public_host: &str, internal_host: &str) -> Self {
        Self {
            call_sign: call_sign.to_string(),
            status: HostStatus::Up,
            boot_time: Timestamp::now(),
            public_host: public_host.to_string(),
            internal_host: internal_host.to_string(),
        }
    }
}

/// Body of `PUT /hosts/{call_sign}/status/`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: HostStatus,
}
