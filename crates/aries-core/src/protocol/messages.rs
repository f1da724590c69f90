// ============================================
// File: crates/aries-core/src/protocol/messages.rs
// ============================================
//! # Protocol Message Definitions
//!
//! ## Creation Reason
//! Defines the in-memory shape of every packet exchanged between game
//! clients and the server, plus the identity used to route them.
//!
//! ## Main Functionality
//! - `FrameHeader`: 12-byte Aries frame header
//! - `AriesPacketType`: known transport-level packet types
//! - `AriesPacket`: transport-level (pre-authentication) packets
//! - `VoltronPacket`: application-level packet carried in Aries type 0
//! - `Packet`: either of the above
//! - `PacketKind`: routing identity
//!
//! ## Wire Format
//! ```text
//! Aries frame (little endian)
//! ┌──────────────┬──────────────┬──────────────┬─────────────┐
//! │ type: u32    │ time: u32    │ len: u32     │ payload     │
//! └──────────────┴──────────────┴──────────────┴─────────────┘
//!
//! Voltron payload (big endian, inside Aries type 0)
//! ┌──────────────┬──────────────┬─────────────┐
//! │ type: u16    │ total: u32   │ body        │
//! └──────────────┴──────────────┴─────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Aries header fields are little endian, Voltron header fields are big
//!   endian. This mismatch is what deployed clients speak, do not "fix" it
//! - Unknown Aries types must decode to `AriesPacket::Unknown`, never fail
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Size of the Aries frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 12;

/// Size of the Voltron header in bytes.
pub const VOLTRON_HEADER_SIZE: usize = 6;

/// Default maximum payload accepted in one frame (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

// ============================================
// FrameHeader
// ============================================

/// Aries frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Aries packet type.
    pub packet_type: u32,
    /// Sender clock in unix seconds, truncated to 32 bits.
    pub timestamp: u32,
    /// Number of payload bytes following the header.
    pub payload_len: u32,
}

impl FrameHeader {
    /// Parses a header from the first 12 bytes of `buf`.
    ///
    /// Returns `None` if fewer than 12 bytes are available.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let header: &[u8; FRAME_HEADER_SIZE] = buf.get(..FRAME_HEADER_SIZE)?.try_into().ok()?;
        let field = |i: usize| u32::from_le_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]]);
        Some(Self {
            packet_type: field(0),
            timestamp: field(4),
            payload_len: field(8),
        })
    }
}

// ============================================
// AriesPacketType
// ============================================

/// Known Aries packet types.
///
/// | Value | Type |
/// |-------|------|
/// | 0 | Voltron container |
/// | 21 | RequestClientSessionResponse |
/// | 22 | RequestClientSession |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum AriesPacketType {
    /// Carries one Voltron (application) packet.
    Voltron = 0,
    /// Client reply to the session challenge.
    RequestClientSessionResponse = 21,
    /// Server challenge sent on connect.
    RequestClientSession = 22,
}

impl AriesPacketType {
    /// Converts a wire value to a known type.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Voltron),
            21 => Some(Self::RequestClientSessionResponse),
            22 => Some(Self::RequestClientSession),
            _ => None,
        }
    }

    /// Returns the wire value.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        *self as u32
    }
}

// ============================================
// PacketKind
// ============================================

/// Routing identity of a decoded packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketKind {
    /// Transport-level packet, allowed before authentication.
    Aries(u32),
    /// Application-level packet, requires an authenticated session.
    Voltron(u16),
}

impl PacketKind {
    /// Kind of the server challenge.
    pub const REQUEST_CLIENT_SESSION: Self =
        Self::Aries(AriesPacketType::RequestClientSession.as_u32());

    /// Kind of the client challenge reply.
    pub const REQUEST_CLIENT_SESSION_RESPONSE: Self =
        Self::Aries(AriesPacketType::RequestClientSessionResponse.as_u32());

    /// Returns `true` for application-level packets.
    #[must_use]
    pub const fn is_application(&self) -> bool {
        matches!(self, Self::Voltron(_))
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aries(t) => write!(f, "aries:{t}"),
            Self::Voltron(t) => write!(f, "voltron:0x{t:04x}"),
        }
    }
}

// ============================================
// Aries packets
// ============================================

/// Client reply to `RequestClientSession`.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestClientSessionResponse {
    /// Account name.
    pub user: String,
    /// Client build string.
    pub version: String,
    /// Login ticket issued by the auth service.
    pub ticket: String,
}

impl fmt::Debug for RequestClientSessionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestClientSessionResponse")
            .field("user", &self.user)
            .field("version", &self.version)
            .field("ticket", &"<redacted>")
            .finish()
    }
}

/// Transport-level packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AriesPacket {
    /// Server challenge, empty payload.
    RequestClientSession,
    /// Client challenge reply.
    RequestClientSessionResponse(RequestClientSessionResponse),
    /// Any Aries type this codec does not know.
    Unknown {
        /// Wire type.
        packet_type: u32,
        /// Raw payload.
        payload: Bytes,
    },
}

impl AriesPacket {
    /// Wire type of this packet.
    #[must_use]
    pub const fn packet_type(&self) -> u32 {
        match self {
            Self::RequestClientSession => AriesPacketType::RequestClientSession.as_u32(),
            Self::RequestClientSessionResponse(_) => {
                AriesPacketType::RequestClientSessionResponse.as_u32()
            }
            Self::Unknown { packet_type, .. } => *packet_type,
        }
    }
}

// ============================================
// Voltron packets
// ============================================

/// Application-level packet. The body is opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoltronPacket {
    /// Application packet type.
    pub packet_type: u16,
    /// Body following the Voltron header.
    pub body: Bytes,
}

impl VoltronPacket {
    /// Creates a new Voltron packet.
    pub fn new(packet_type: u16, body: impl Into<Bytes>) -> Self {
        Self {
            packet_type,
            body: body.into(),
        }
    }
}

// ============================================
// Packet
// ============================================

/// Any decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Transport-level packet.
    Aries(AriesPacket),
    /// Application-level packet.
    Voltron(VoltronPacket),
}

impl Packet {
    /// Routing identity.
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        match self {
            Self::Aries(p) => PacketKind::Aries(p.packet_type()),
            Self::Voltron(p) => PacketKind::Voltron(p.packet_type),
        }
    }

    /// Returns `true` for application-level packets.
    #[must_use]
    pub const fn is_application(&self) -> bool {
        self.kind().is_application()
    }
}

impl From<AriesPacket> for Packet {
    fn from(packet: AriesPacket) -> Self {
        Self::Aries(packet)
    }
}

impl From<VoltronPacket> for Packet {
    fn from(packet: VoltronPacket) -> Self {
        Self::Voltron(packet)
    }
}
