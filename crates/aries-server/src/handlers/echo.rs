// ============================================
// File: crates/aries-server/src/handlers/echo.rs
// ============================================
//! # Echo Handler
//!
//! Writes every Voltron `0x0001` packet back to its sender. Used for smoke
//! tests of a deployed server.
//!
//! ## Last Modified
//! v0.1.0 - Initial echo handler

use std::sync::Arc;

use tracing::trace;

use aries_core::{Packet, PacketKind, VoltronPacket};

use crate::handlers::HandlerInstance;
use crate::services::{AriesSession, HandlerFn};

/// Factory name.
pub const NAME: &str = "echo";

/// Voltron type echoed back.
pub const ECHO_PACKET_TYPE: u16 = 0x0001;

/// Echoes Voltron `0x0001`.
#[derive(Debug, Clone)]
pub struct EchoHandler {
    call_sign: String,
}

impl EchoHandler {
    #[must_use]
    pub fn new(call_sign: &str) -> Self {
        Self {
            call_sign: call_sign.to_string(),
        }
    }

    fn echo(&self, session: &Arc<AriesSession>, packet: &Packet) -> crate::Result<()> {
        if let Packet::Voltron(voltron) = packet {
            trace!(
                session_id = %session.id(),
                host = %self.call_sign,
                len = voltron.body.len(),
                "Echo"
            );
            session.write(VoltronPacket::new(ECHO_PACKET_TYPE, voltron.body.clone()))?;
        }
        Ok(())
    }
}

impl HandlerInstance for EchoHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn routes(self: Arc<Self>) -> Vec<(PacketKind, HandlerFn)> {
        vec![(
            PacketKind::Voltron(ECHO_PACKET_TYPE),
            Arc::new(move |session: &Arc<AriesSession>, packet: &Packet| self.echo(session, packet)),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aries_transport::Outbound;

    use crate::services::session::tests::test_session;

    #[test]
    fn test_echoes_body() {
        let handler = Arc::new(EchoHandler::new("city-1"));
        let (kind, route) = handler.routes().pop().unwrap();
        assert_eq!(kind, PacketKind::Voltron(ECHO_PACKET_TYPE));

        let (session, mut outbox) = test_session();
        let packet: Packet = VoltronPacket::new(ECHO_PACKET_TYPE, &b"ping"[..]).into();
        route(&session, &packet).unwrap();

        match outbox.try_recv() {
            Some(Outbound::Message(Packet::Voltron(reply))) => {
                assert_eq!(reply.packet_type, ECHO_PACKET_TYPE);
                assert_eq!(&reply.body[..], b"ping");
            }
            other => panic!("expected echo, got {other:?}"),
        }
    }

    #[test]
    fn test_closed_session_reports_error() {
        let handler = Arc::new(EchoHandler::new("city-1"));
        let (_, route) = handler.routes().pop().unwrap();
        let (session, _outbox) = test_session();
        session.close();

        let packet: Packet = VoltronPacket::new(ECHO_PACKET_TYPE, &b"ping"[..]).into();
        let err = route(&session, &packet).unwrap_err();
        assert!(!err.should_close_session());
    }
}
