// ============================================
// File: crates/aries-common/src/lib.rs
// ============================================
//! # Aries Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Provides foundational types shared across all Aries crates, plus the
//! statistics pipeline that both the server core and handlers record into.
//!
//! ## Main Functionality
//! - [`types`]: Connection identifiers (`SessionId`)
//! - [`time`]: Millisecond timestamps and atomic instants
//! - [`error`]: Common error types and result aliases
//! - [`stats`]: Statistic model, collector, aggregator and query
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                aries-server                         │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     aries-core         aries-transport              │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │              aries-common  ◄── You are here         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation, changes affect everything
//! - Keep dependencies minimal; tokio is here only for the digest timer
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod error;
pub mod stats;
pub mod time;
pub mod types;

pub use error::{CommonError, Result};
pub use types::SessionId;
