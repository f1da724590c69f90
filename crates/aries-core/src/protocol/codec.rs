// ============================================
// File: crates/aries-core/src/protocol/codec.rs
// ============================================
//! # Protocol Codec
//!
//! ## Creation Reason
//! The transport layer deals only in byte frames; this module turns them
//! into typed packets and back. The `FrameCodec` trait is the seam the
//! transport is generic over, `AriesCodec` is the implementation for the
//! Aries/Voltron protocol family.
//!
//! ## Parsing Strategy
//! 1. `check_complete`: read the 12-byte header, reject oversize payloads,
//!    report how many bytes the frame occupies
//! 2. `decode`: split header from payload, dispatch on the Aries type
//! 3. Voltron payloads are parsed one level deeper, the body stays opaque
//!
//! ## ⚠️ Important Note for Next Developer
//! - `check_complete` must never allocate, it runs on every read
//! - Strings longer than `u16::MAX` bytes are truncated on encode
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{Buf, BufMut, Bytes, BytesMut};

use aries_common::time::Timestamp;

use crate::error::{CoreError, Result};
use crate::protocol::messages::{
    AriesPacket, AriesPacketType, FrameHeader, Packet, RequestClientSessionResponse,
    VoltronPacket, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE, VOLTRON_HEADER_SIZE,
};

// ============================================
// FrameCodec Trait
// ============================================

/// Converts between framed wire bytes and typed messages.
///
/// Implementations are shared by every connection of a listener, so they
/// must be stateless or internally synchronized.
pub trait FrameCodec: Send + Sync + 'static {
    /// Decoded message type.
    type Message: Send + Sync + 'static;

    /// Checks if `buf` starts with a complete frame.
    ///
    /// # Returns
    /// - `Ok(Some(len))` - Complete frame of `len` bytes
    /// - `Ok(None)` - Need more data
    /// - `Err(_)` - Stream is unrecoverable
    fn check_complete(&self, buf: &[u8]) -> Result<Option<usize>>;

    /// Decodes one complete frame.
    fn decode(&self, frame: Bytes) -> Result<Self::Message>;

    /// Appends the encoded frame for `msg` to `buf`.
    fn encode(&self, msg: &Self::Message, buf: &mut BytesMut);
}

// ============================================
// AriesCodec
// ============================================

/// Codec for Aries frames carrying Aries or Voltron packets.
#[derive(Debug, Clone)]
pub struct AriesCodec {
    max_frame_size: usize,
}

impl AriesCodec {
    /// Creates a codec with the default 1 MiB payload limit.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a codec with a custom payload limit.
    #[must_use]
    pub const fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Maximum accepted payload size.
    #[must_use]
    pub const fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn decode_response(mut payload: Bytes) -> Result<RequestClientSessionResponse> {
        let user = get_string(&mut payload, "user")?;
        let version = get_string(&mut payload, "version")?;
        let ticket = get_string(&mut payload, "ticket")?;
        Ok(RequestClientSessionResponse {
            user,
            version,
            ticket,
        })
    }

    fn decode_voltron(mut payload: Bytes) -> Result<VoltronPacket> {
        if payload.len() < VOLTRON_HEADER_SIZE {
            return Err(CoreError::too_short(VOLTRON_HEADER_SIZE, payload.len()));
        }
        let available = payload.len();
        let packet_type = payload.get_u16();
        let total = payload.get_u32() as usize;
        if total < VOLTRON_HEADER_SIZE || total > available {
            return Err(CoreError::malformed(format!(
                "Voltron length {total} outside [{VOLTRON_HEADER_SIZE}, {available}]"
            )));
        }
        let body = payload.split_to(total - VOLTRON_HEADER_SIZE);
        Ok(VoltronPacket { packet_type, body })
    }
}

impl Default for AriesCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec for AriesCodec {
    type Message = Packet;

    fn check_complete(&self, buf: &[u8]) -> Result<Option<usize>> {
        let Some(header) = FrameHeader::parse(buf) else {
            return Ok(None);
        };
        let payload_len = header.payload_len as usize;
        if payload_len > self.max_frame_size {
            return Err(CoreError::frame_too_large(self.max_frame_size, payload_len));
        }
        let frame_len = FRAME_HEADER_SIZE + payload_len;
        if buf.len() >= frame_len {
            Ok(Some(frame_len))
        } else {
            Ok(None)
        }
    }

    fn decode(&self, mut frame: Bytes) -> Result<Packet> {
        let header = FrameHeader::parse(&frame)
            .ok_or_else(|| CoreError::too_short(FRAME_HEADER_SIZE, frame.len()))?;
        frame.advance(FRAME_HEADER_SIZE);

        let payload_len = header.payload_len as usize;
        if frame.len() < payload_len {
            return Err(CoreError::too_short(
                FRAME_HEADER_SIZE + payload_len,
                FRAME_HEADER_SIZE + frame.len(),
            ));
        }
        let payload = frame.split_to(payload_len);

        let packet = match AriesPacketType::from_u32(header.packet_type) {
            Some(AriesPacketType::Voltron) => Packet::Voltron(Self::decode_voltron(payload)?),
            Some(AriesPacketType::RequestClientSession) => {
                Packet::Aries(AriesPacket::RequestClientSession)
            }
            Some(AriesPacketType::RequestClientSessionResponse) => Packet::Aries(
                AriesPacket::RequestClientSessionResponse(Self::decode_response(payload)?),
            ),
            None => Packet::Aries(AriesPacket::Unknown {
                packet_type: header.packet_type,
                payload,
            }),
        };
        Ok(packet)
    }

    fn encode(&self, msg: &Packet, buf: &mut BytesMut) {
        let mut payload = BytesMut::new();
        let packet_type = match msg {
            Packet::Voltron(p) => {
                payload.reserve(VOLTRON_HEADER_SIZE + p.body.len());
                payload.put_u16(p.packet_type);
                payload.put_u32(u32::try_from(VOLTRON_HEADER_SIZE + p.body.len()).unwrap_or(u32::MAX));
                payload.put_slice(&p.body);
                AriesPacketType::Voltron.as_u32()
            }
            Packet::Aries(AriesPacket::RequestClientSession) => {
                AriesPacketType::RequestClientSession.as_u32()
            }
            Packet::Aries(AriesPacket::RequestClientSessionResponse(r)) => {
                put_string(&mut payload, &r.user);
                put_string(&mut payload, &r.version);
                put_string(&mut payload, &r.ticket);
                AriesPacketType::RequestClientSessionResponse.as_u32()
            }
            Packet::Aries(AriesPacket::Unknown {
                packet_type,
                payload: raw,
            }) => {
                payload.put_slice(raw);
                *packet_type
            }
        };

        // Truncation to 32 bits matches what clients send.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let timestamp = Timestamp::now().as_secs() as u32;

        buf.reserve(FRAME_HEADER_SIZE + payload.len());
        buf.put_u32_le(packet_type);
        buf.put_u32_le(timestamp);
        buf.put_u32_le(u32::try_from(payload.len()).unwrap_or(u32::MAX));
        buf.put_slice(&payload);
    }
}

// ============================================
// String helpers
// ============================================

fn get_string(buf: &mut Bytes, field: &'static str) -> Result<String> {
    if buf.len() < 2 {
        return Err(CoreError::malformed(format!("missing length for '{field}'")));
    }
    let len = buf.get_u16_le() as usize;
    if buf.len() < len {
        return Err(CoreError::malformed(format!(
            "'{field}' declares {len} bytes, {} available",
            buf.len()
        )));
    }
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| CoreError::InvalidUtf8 { field })
}

fn put_string(buf: &mut BytesMut, value: &str) {
    let mut end = value.len().min(u16::MAX as usize);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let bytes = &value.as_bytes()[..end];
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u16_le(bytes.len() as u16);
    buf.put_slice(bytes);
}

// ============================================
// Convenience Functions
// ============================================

/// Encodes a packet into a fresh buffer with the default codec.
#[must_use]
pub fn encode_packet(packet: &Packet) -> BytesMut {
    let mut buf = BytesMut::new();
    AriesCodec::new().encode(packet, &mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame(packet_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&packet_type.to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        raw.extend_from_slice(payload);
        raw
    }

    #[test]
    fn test_check_complete_partial_and_full() {
        let codec = AriesCodec::new();
        let frame = raw_frame(22, &[]);

        assert_eq!(codec.check_complete(&frame[..5]).unwrap(), None);
        assert_eq!(codec.check_complete(&frame).unwrap(), Some(12));

        let with_body = raw_frame(99, &[1, 2, 3]);
        assert_eq!(codec.check_complete(&with_body[..14]).unwrap(), None);
        assert_eq!(codec.check_complete(&with_body).unwrap(), Some(15));
    }

    #[test]
    fn test_check_complete_two_frames_in_buffer() {
        let codec = AriesCodec::new();
        let mut buf = raw_frame(22, &[]);
        buf.extend(raw_frame(99, &[7]));
        assert_eq!(codec.check_complete(&buf).unwrap(), Some(12));
    }

    #[test]
    fn test_oversize_frame_rejected_from_header() {
        let codec = AriesCodec::with_max_frame_size(8);
        let mut header = Vec::new();
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&9u32.to_le_bytes());

        let err = codec.check_complete(&header).unwrap_err();
        assert!(err.is_framing_error());
    }

    #[test]
    fn test_decode_challenge_response() {
        let codec = AriesCodec::new();
        let mut payload = Vec::new();
        for s in ["alice", "1.0.0", "t0k3n"] {
            payload.extend_from_slice(&(s.len() as u16).to_le_bytes());
            payload.extend_from_slice(s.as_bytes());
        }
        let frame = Bytes::from(raw_frame(21, &payload));

        match codec.decode(frame).unwrap() {
            Packet::Aries(AriesPacket::RequestClientSessionResponse(r)) => {
                assert_eq!(r.user, "alice");
                assert_eq!(r.version, "1.0.0");
                assert_eq!(r.ticket, "t0k3n");
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn test_decode_truncated_response_fails() {
        let codec = AriesCodec::new();
        let payload = [5u8, 0, b'a', b'b'];
        let err = codec.decode(Bytes::from(raw_frame(21, &payload))).unwrap_err();
        assert!(matches!(err, CoreError::MalformedMessage { .. }));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let codec = AriesCodec::new();
        let payload = [1u8, 0, 0xff, 0, 0, 0, 0];
        let err = codec.decode(Bytes::from(raw_frame(21, &payload))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidUtf8 { field: "user" }));
    }

    #[test]
    fn test_decode_voltron() {
        let codec = AriesCodec::new();
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x2001u16.to_be_bytes());
        payload.extend_from_slice(&9u32.to_be_bytes());
        payload.extend_from_slice(b"abc");

        let packet = codec.decode(Bytes::from(raw_frame(0, &payload))).unwrap();
        assert_eq!(
            packet,
            Packet::Voltron(VoltronPacket::new(0x2001, Bytes::from_static(b"abc")))
        );
    }

    #[test]
    fn test_decode_voltron_bad_length() {
        let codec = AriesCodec::new();
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u16.to_be_bytes());
        payload.extend_from_slice(&100u32.to_be_bytes());

        assert!(codec.decode(Bytes::from(raw_frame(0, &payload))).is_err());
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let codec = AriesCodec::new();
        let packet = codec.decode(Bytes::from(raw_frame(44, &[1, 2]))).unwrap();
        assert_eq!(
            packet,
            Packet::Aries(AriesPacket::Unknown {
                packet_type: 44,
                payload: Bytes::from_static(&[1, 2]),
            })
        );
    }

    #[test]
    fn test_encode_challenge_layout() {
        let encoded = encode_packet(&Packet::Aries(AriesPacket::RequestClientSession));
        assert_eq!(encoded.len(), FRAME_HEADER_SIZE);
        assert_eq!(&encoded[..4], &22u32.to_le_bytes());
        assert_eq!(&encoded[8..12], &0u32.to_le_bytes());
    }

    #[test]
    fn test_encode_voltron_layout() {
        let packet = Packet::Voltron(VoltronPacket::new(0x0001, Bytes::from_static(b"hi")));
        let encoded = encode_packet(&packet);

        assert_eq!(&encoded[..4], &0u32.to_le_bytes());
        assert_eq!(&encoded[8..12], &8u32.to_le_bytes());
        assert_eq!(&encoded[12..14], &[0x00, 0x01]);
        assert_eq!(&encoded[14..18], &8u32.to_be_bytes());
        assert_eq!(&encoded[18..], b"hi");
    }

    #[test]
    fn test_put_string_truncates_on_char_boundary() {
        let long = "é".repeat(40_000);
        let mut buf = BytesMut::new();
        put_string(&mut buf, &long);
        let mut bytes = buf.freeze();
        let decoded = get_string(&mut bytes, "user").unwrap();
        assert!(decoded.len() <= u16::MAX as usize);
        assert!(decoded.chars().all(|c| c == 'é'));
    }
}
