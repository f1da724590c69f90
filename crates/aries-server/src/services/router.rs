// ============================================
// File: crates/aries-server/src/services/router.rs
// ============================================
//! # Packet Router
//!
//! ## Creation Reason
//! Maps a decoded packet's identity to the handlers registered for it.
//!
//! ## Main Functionality
//! - `PacketRouter::register`: one callable per packet kind
//! - `PacketRouter::register_instance`: every route a `HandlerInstance`
//!   declares
//! - `PacketRouter::dispatch`: calls every handler for the packet's kind
//!
//! ## Dispatch Rules
//! 1. No handler for the kind: dropped, not an error
//! 2. Several handlers: all run, in registration order
//! 3. A handler error stops dispatch and is returned to the caller
//!
//! ## ⚠️ Important Note for Next Developer
//! - Built once at startup, then shared read-only behind an `Arc`; there
//!   is no locking on the dispatch path
//!
//! ## Last Modified
//! v0.1.0 - Initial packet router

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use aries_core::{Packet, PacketKind};

use crate::error::Result;
use crate::handlers::HandlerInstance;
use crate::services::session::AriesSession;

/// Handler callable.
pub type HandlerFn = Arc<dyn Fn(&Arc<AriesSession>, &Packet) -> Result<()> + Send + Sync>;

struct Route {
    owner: String,
    handler: HandlerFn,
}

/// Packet kind to handlers.
#[derive(Default)]
pub struct PacketRouter {
    routes: HashMap<PacketKind, Vec<Route>>,
}

impl PacketRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind` on behalf of `owner`.
    pub fn register<F>(&mut self, kind: PacketKind, owner: impl Into<String>, handler: F)
    where
        F: Fn(&Arc<AriesSession>, &Packet) -> Result<()> + Send + Sync + 'static,
    {
        self.register_fn(kind, owner, Arc::new(handler));
    }

    /// Registers an already boxed handler.
    pub fn register_fn(&mut self, kind: PacketKind, owner: impl Into<String>, handler: HandlerFn) {
        let owner = owner.into();
        trace!(%kind, owner = %owner, "Route registered");
        self.routes
            .entry(kind)
            .or_default()
            .push(Route { owner, handler });
    }

    /// Registers every route `instance` declares. Returns how many.
    pub fn register_instance(&mut self, instance: &Arc<dyn HandlerInstance>) -> usize {
        let routes = Arc::clone(instance).routes();
        let count = routes.len();
        for (kind, handler) in routes {
            self.register_fn(kind, instance.name(), handler);
        }
        count
    }

    /// Runs every handler registered for the packet's kind.
    ///
    /// Returns the number of handlers invoked; `0` means the packet was
    /// dropped.
    ///
    /// # Errors
    /// The first handler error, unchanged.
    pub fn dispatch(&self, session: &Arc<AriesSession>, packet: &Packet) -> Result<usize> {
        let kind = packet.kind();
        let Some(routes) = self.routes.get(&kind) else {
            trace!(session_id = %session.id(), %kind, "No handler, packet dropped");
            return Ok(0);
        };

        for route in routes {
            trace!(session_id = %session.id(), %kind, owner = %route.owner, "Dispatching");
            (route.handler)(session, packet)?;
        }
        Ok(routes.len())
    }

    /// Handler owners for `kind`, in dispatch order.
    #[must_use]
    pub fn owners(&self, kind: PacketKind) -> Vec<&str> {
        self.routes
            .get(&kind)
            .map(|routes| routes.iter().map(|r| r.owner.as_str()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_route(&self, kind: PacketKind) -> bool {
        self.routes.contains_key(&kind)
    }

    /// Number of registered handlers across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for PacketRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.routes.keys().collect();
        kinds.sort();
        f.debug_struct("PacketRouter")
            .field("kinds", &kinds)
            .field("handlers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use aries_core::{AriesPacket, VoltronPacket};

    use crate::error::ServerError;
    use crate::services::session::tests::test_session;

    fn voltron(packet_type: u16) -> Packet {
        VoltronPacket::new(packet_type, &b"body"[..]).into()
    }

    #[test]
    fn test_unhandled_packet_is_dropped() {
        let router = PacketRouter::new();
        let (session, _outbox) = test_session();

        let unknown: Packet = AriesPacket::Unknown {
            packet_type: 99,
            payload: bytes::Bytes::new(),
        }
        .into();
        assert_eq!(router.dispatch(&session, &unknown).unwrap(), 0);
        assert_eq!(router.dispatch(&session, &voltron(7)).unwrap(), 0);
    }

    #[test]
    fn test_all_handlers_run_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut router = PacketRouter::new();
        for name in ["first", "second"] {
            let calls = Arc::clone(&calls);
            router.register(PacketKind::Voltron(7), name, move |_, _| {
                calls.lock().push(name);
                Ok(())
            });
        }
        let (session, _outbox) = test_session();

        assert_eq!(router.dispatch(&session, &voltron(7)).unwrap(), 2);
        assert_eq!(*calls.lock(), vec!["first", "second"]);
        assert_eq!(router.owners(PacketKind::Voltron(7)), vec!["first", "second"]);
    }

    #[test]
    fn test_handler_error_propagates() {
        let mut router = PacketRouter::new();
        router.register(PacketKind::Voltron(7), "broken", |_, _| {
            Err(ServerError::handler("broken", "boom"))
        });
        let reached = Arc::new(Mutex::new(false));
        {
            let reached = Arc::clone(&reached);
            router.register(PacketKind::Voltron(7), "after", move |_, _| {
                *reached.lock() = true;
                Ok(())
            });
        }
        let (session, _outbox) = test_session();

        let err = router.dispatch(&session, &voltron(7)).unwrap_err();
        assert!(matches!(err, ServerError::Handler { .. }));
        assert!(!*reached.lock());
    }

    #[test]
    fn test_routes_keyed_by_kind() {
        let mut router = PacketRouter::new();
        router.register(PacketKind::Voltron(1), "one", |_, _| Ok(()));
        router.register(PacketKind::REQUEST_CLIENT_SESSION_RESPONSE, "auth", |_, _| Ok(()));

        assert!(router.has_route(PacketKind::Voltron(1)));
        assert!(!router.has_route(PacketKind::Voltron(2)));
        assert_eq!(router.len(), 2);
    }
}
