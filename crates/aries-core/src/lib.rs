// ============================================
// File: crates/aries-core/src/lib.rs
// ============================================
//! # Aries Core - Protocol Library
//!
//! ## Creation Reason
//! Provides the wire protocol definitions for Aries game servers. The
//! transport crate is generic over [`FrameCodec`]; the server crate routes
//! on [`PacketKind`].
//!
//! ## Main Functionality
//!
//! ### Protocol Module ([`protocol`])
//! - Frame header and packet types (`AriesPacket`, `VoltronPacket`)
//! - `FrameCodec` codec contract and `AriesCodec`
//! - `PacketKind` routing identity and the application/transport split
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                aries-server                         │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     aries-core  ◄──     aries-transport             │
//! │   You are here                │                     │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │              aries-common                           │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Protocol changes MUST stay compatible with deployed clients
//! - This crate performs no I/O
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod protocol;

pub use error::{CoreError, Result};
pub use protocol::{
    AriesCodec, AriesPacket, FrameCodec, Packet, PacketKind, RequestClientSessionResponse,
    VoltronPacket,
};
