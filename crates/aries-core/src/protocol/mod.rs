// ============================================
// File: crates/aries-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the Aries wire protocol spoken by game clients: the frame
//! format, the packet types and the codec between them.
//!
//! ### Submodules
//! - [`messages`]: Packet structures and routing identity
//! - [`codec`]: `FrameCodec` trait and `AriesCodec`
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Session Phase (Aries packets)               │
//! │                                                             │
//! │  Client ◄────── RequestClientSession (22) ─────────  Server │
//! │  Client ─────── RequestClientSessionResponse (21) ─► Server │
//! │                                                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │               Application Phase (Voltron packets)           │
//! │                                                             │
//! │  Client ══════ Aries(0) { Voltron type, body } ════ Server  │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The server speaks first; clients wait for `RequestClientSession`
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod messages;

pub use codec::{encode_packet, AriesCodec, FrameCodec};
pub use messages::{
    AriesPacket, AriesPacketType, FrameHeader, Packet, PacketKind, RequestClientSessionResponse,
    VoltronPacket, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE, VOLTRON_HEADER_SIZE,
};
