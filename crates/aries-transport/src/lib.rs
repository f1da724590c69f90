// ============================================
// File: crates/aries-transport/src/lib.rs
// ============================================
//! # Aries Transport - Network I/O Layer
//!
//! ## Creation Reason
//! Owns sockets so the server core never does. Accepts TCP connections,
//! optionally over TLS, cuts the byte stream into frames with a
//! [`FrameCodec`](aries_core::FrameCodec) and reports everything through
//! [`IoHandler`] callbacks.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`tcp`]: `TcpAcceptor` and the per-connection driver
//! - [`session`]: `IoSession` handle, outbound queue, attribute bag
//! - [`traits`]: `IoHandler`, `IoException`, `PacketLogger`
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                aries-server                         │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     aries-core         aries-transport              │
//! │                        You are here ◄──             │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │              aries-common                           │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//!   Clients ──TCP──► TcpAcceptor ──► [TLS] ──► codec ──► IoHandler
//!      ▲                                                    │
//!      └──────────── codec ◄── IoSession::write ◄───────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - One task per connection keeps per-session message order
//! - Handlers are synchronous; long work must be spawned elsewhere
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod session;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use session::{IoSession, Outbound, Outbox};
pub use tcp::{AcceptorOptions, TcpAcceptor};
pub use traits::{Direction, IoException, IoHandler, PacketLogger};
