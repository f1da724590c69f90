// ============================================
// File: crates/aries-server/src/services/auth.rs
// ============================================
//! # Session Authentication
//!
//! ## Creation Reason
//! The server challenges every new connection with `RequestClientSession`.
//! The client's `RequestClientSessionResponse` is checked here and, if it
//! passes, the session is upgraded so application packets may flow.
//!
//! ## Main Functionality
//! - `SessionAuthenticator`: pluggable check of a challenge response
//! - `StaticTicketAuthenticator`: user to ticket map from configuration
//! - `authentication_route`: the router entry the server installs for
//!   `RequestClientSessionResponse`
//!
//! ## ⚠️ Important Note for Next Developer
//! - A failed check returns `AuthenticationFailed`, which the server's
//!   exception policy turns into a session close
//! - A second response on an authenticated session is ignored
//!
//! ## Last Modified
//! v0.1.0 - Initial authentication

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use aries_core::{AriesPacket, Packet, RequestClientSessionResponse};

use crate::config::AuthConfig;
use crate::error::{Result, ServerError};
use crate::services::router::HandlerFn;
use crate::services::session::AriesSession;

/// Validates a client's challenge response.
pub trait SessionAuthenticator: Send + Sync + 'static {
    /// Checks `response` and returns the user the session belongs to.
    ///
    /// # Errors
    /// `ServerError::AuthenticationFailed` if the client is not allowed in.
    fn authenticate(
        &self,
        session: &Arc<AriesSession>,
        response: &RequestClientSessionResponse,
    ) -> Result<String>;
}

/// Accepts users whose ticket matches the configured one.
#[derive(Clone, Default)]
pub struct StaticTicketAuthenticator {
    tickets: HashMap<String, String>,
}

impl StaticTicketAuthenticator {
    #[must_use]
    pub fn new(tickets: HashMap<String, String>) -> Self {
        Self { tickets }
    }

    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.tickets.clone())
    }

    /// Adds or replaces a user's ticket.
    #[must_use]
    pub fn with_ticket(mut self, user: impl Into<String>, ticket: impl Into<String>) -> Self {
        self.tickets.insert(user.into(), ticket.into());
        self
    }
}

impl SessionAuthenticator for StaticTicketAuthenticator {
    fn authenticate(
        &self,
        _session: &Arc<AriesSession>,
        response: &RequestClientSessionResponse,
    ) -> Result<String> {
        match self.tickets.get(&response.user) {
            Some(ticket) if *ticket == response.ticket => Ok(response.user.clone()),
            Some(_) => Err(ServerError::authentication_failed(&response.user, "ticket mismatch")),
            None => Err(ServerError::authentication_failed(&response.user, "unknown user")),
        }
    }
}

impl fmt::Debug for StaticTicketAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTicketAuthenticator")
            .field("users", &self.tickets.len())
            .finish()
    }
}

/// Builds the handler that runs `authenticator` on challenge responses.
pub fn authentication_route(authenticator: Arc<dyn SessionAuthenticator>) -> HandlerFn {
    Arc::new(move |session: &Arc<AriesSession>, packet: &Packet| {
        let Packet::Aries(AriesPacket::RequestClientSessionResponse(response)) = packet else {
            return Ok(());
        };

        if session.is_authenticated() {
            debug!(session_id = %session.id(), "Challenge response on authenticated session ignored");
            return Ok(());
        }

        let user = authenticator.authenticate(session, response)?;
        if session.set_authenticated(user.as_str()) {
            info!(
                session_id = %session.id(),
                user = %user,
                version = %response.version,
                "Session authenticated"
            );
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::services::session::tests::test_session;
    use crate::services::session::SessionState;

    fn response(user: &str, ticket: &str) -> Packet {
        AriesPacket::RequestClientSessionResponse(RequestClientSessionResponse {
            user: user.to_string(),
            version: "1.0".to_string(),
            ticket: ticket.to_string(),
        })
        .into()
    }

    fn route() -> HandlerFn {
        authentication_route(Arc::new(
            StaticTicketAuthenticator::default().with_ticket("alice", "secret"),
        ))
    }

    #[test]
    fn test_valid_ticket_authenticates() {
        let (session, _outbox) = test_session();
        session.begin_authentication();

        route()(&session, &response("alice", "secret")).unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.user().as_deref(), Some("alice"));
    }

    #[test]
    fn test_bad_ticket_fails_and_closes_by_policy() {
        let (session, _outbox) = test_session();

        let err = route()(&session, &response("alice", "wrong")).unwrap_err();
        assert!(err.should_close_session());
        assert!(!session.is_authenticated());

        let err = route()(&session, &response("bob", "secret")).unwrap_err();
        assert!(matches!(err, ServerError::AuthenticationFailed { ref user, .. } if user == "bob"));
    }

    #[test]
    fn test_second_response_ignored() {
        let (session, _outbox) = test_session();
        let route = route();

        route(&session, &response("alice", "secret")).unwrap();
        route(&session, &response("alice", "wrong")).unwrap();
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_other_packets_ignored() {
        let (session, _outbox) = test_session();
        route()(&session, &Packet::from(AriesPacket::RequestClientSession)).unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_debug_hides_tickets() {
        let auth = StaticTicketAuthenticator::default().with_ticket("alice", "secret");
        assert!(!format!("{auth:?}").contains("secret"));
    }
}
