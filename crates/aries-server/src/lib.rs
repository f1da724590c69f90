// ============================================
// File: crates/aries-server/src/lib.rs
// ============================================
//! # Aries Server Library
//!
//! ## Creation Reason
//! Session-oriented server for the Aries framing protocol. Accepts TLS (and
//! optionally plaintext) connections, authenticates each session, routes
//! packets to pluggable handlers, tracks host liveness and records
//! per-host statistics.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Server configuration management
//! - [`server`]: Main server orchestration
//! - [`services`]: Session registry, router, interceptors, auth, telemetry
//! - [`handlers`]: Handler instances and the factory that resolves them
//! - [`hosts`]: Host record store (memory and HTTP)
//! - [`tls`]: Certificate loading
//! - [`debug`]: Frame dump and session introspection
//! - [`error`]: Server-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Aries Server                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐   │
//! │  │   Config    │────►│   Server    │────►│    Handlers     │   │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘   │
//! │                             │                     │            │
//! │         ┌───────────────────┼─────────────────────┘            │
//! │         ▼                   ▼                   ▼              │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐      │
//! │  │  Sessions   │     │   Router    │     │ Statistics  │      │
//! │  └─────────────┘     └─────────────┘     └─────────────┘      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                     Transport Layer                             │
//! │       TLS listener  +  optional plaintext listener              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Client → TCP/TLS → Codec → Gate → Router → Handler
//! Client ← TCP/TLS ← Codec ←────────────────  Handler
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Configuration changes require restart (no hot-reload)
//! - Handlers run on transport workers and must not block
//!
//! ## Last Modified
//! v0.1.0 - Initial server library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod debug;
pub mod error;
pub mod handlers;
pub mod hosts;
pub mod server;
pub mod services;
pub mod tls;

// Re-export primary types
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::{Server, ServerBuilder};
