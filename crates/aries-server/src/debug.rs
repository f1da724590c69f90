// ============================================
// File: crates/aries-server/src/debug.rs
// ============================================
//! # Server Debugger
//!
//! ## Creation Reason
//! Protocol work needs to see raw frames and the live session list without
//! attaching a debugger to the process.
//!
//! ## Main Functionality
//! - `ServerDebugger`: supplies the packet logger wired into every
//!   listener and gets a weak handle to the server for introspection
//! - `TracingDebugger`: logs frames as hex at `debug` level
//!
//! ## ⚠️ Important Note for Next Developer
//! - The server handle is weak; the debugger must not keep the server
//!   alive
//! - Frames longer than `max_dump_bytes` are truncated in the log
//!
//! ## Last Modified
//! v0.1.0 - Initial debugger

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};

use aries_common::SessionId;
use aries_transport::{Direction, PacketLogger};

use crate::server::Server;

/// Default number of frame bytes dumped per log line.
pub const DEFAULT_MAX_DUMP_BYTES: usize = 256;

/// Inspection sink attached to a server.
pub trait ServerDebugger: Send + Sync + 'static {
    /// Logger that receives every raw frame on every listener.
    fn packet_logger(&self) -> Arc<dyn PacketLogger>;

    /// Called once when the server is built.
    fn attach(&self, server: Weak<Server>);
}

/// Writes frames to `tracing` as hex.
#[derive(Debug, Clone)]
pub struct HexPacketLogger {
    max_dump_bytes: usize,
}

impl HexPacketLogger {
    #[must_use]
    pub const fn new(max_dump_bytes: usize) -> Self {
        Self { max_dump_bytes }
    }

    /// Hex of the first `max_dump_bytes` bytes of `frame`.
    #[must_use]
    pub fn dump(&self, frame: &[u8]) -> String {
        let shown = frame.len().min(self.max_dump_bytes);
        let mut out = hex::encode(&frame[..shown]);
        if shown < frame.len() {
            out.push_str("..");
        }
        out
    }
}

impl PacketLogger for HexPacketLogger {
    fn log_frame(&self, session: SessionId, direction: Direction, frame: &[u8]) {
        debug!(
            session_id = %session,
            %direction,
            len = frame.len(),
            frame = %self.dump(frame),
            "Frame"
        );
    }
}

/// Debugger that logs through `tracing`.
pub struct TracingDebugger {
    logger: Arc<HexPacketLogger>,
    server: Mutex<Option<Weak<Server>>>,
}

impl TracingDebugger {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_dump_bytes(DEFAULT_MAX_DUMP_BYTES)
    }

    #[must_use]
    pub fn with_max_dump_bytes(max_dump_bytes: usize) -> Self {
        Self {
            logger: Arc::new(HexPacketLogger::new(max_dump_bytes)),
            server: Mutex::new(None),
        }
    }

    /// The attached server, while it is alive.
    #[must_use]
    pub fn server(&self) -> Option<Arc<Server>> {
        self.server.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Logs every live socket session. Returns how many were logged.
    pub fn dump_sessions(&self) -> usize {
        let Some(server) = self.server() else {
            return 0;
        };
        let sessions = server.socket_sessions();
        for s in &sessions {
            info!(
                session_id = %s.id,
                remote = %s.remote_addr,
                secure = s.secure,
                state = %s.state,
                user = s.user.as_deref().unwrap_or("-"),
                messages_in = s.messages_in,
                messages_out = s.messages_out,
                "Socket session"
            );
        }
        sessions.len()
    }
}

impl Default for TracingDebugger {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerDebugger for TracingDebugger {
    fn packet_logger(&self) -> Arc<dyn PacketLogger> {
        Arc::clone(&self.logger) as Arc<dyn PacketLogger>
    }

    fn attach(&self, server: Weak<Server>) {
        *self.server.lock() = Some(server);
    }
}

impl std::fmt::Debug for TracingDebugger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingDebugger")
            .field("logger", &self.logger)
            .field("attached", &self.server().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_truncates() {
        let logger = HexPacketLogger::new(2);
        assert_eq!(logger.dump(&[0x01, 0x02]), "0102");
        assert_eq!(logger.dump(&[0x01, 0x02, 0x03]), "0102..");
        assert_eq!(logger.dump(&[]), "");
    }

    #[test]
    fn test_unattached_debugger() {
        let debugger = TracingDebugger::new();
        assert!(debugger.server().is_none());
        assert_eq!(debugger.dump_sessions(), 0);
        debugger.attach(Weak::new());
        assert!(debugger.server().is_none());
    }
}
