// ============================================
// File: crates/aries-server/src/server.rs
// ============================================
//! # Server Orchestrator
//!
//! ## Creation Reason
//! Wires configuration, listeners, the dispatch gate, handlers, host
//! bookkeeping and telemetry into one server with a start/shutdown
//! lifecycle.
//!
//! ## Main Functionality
//! - `ServerBuilder`: validates configuration and assembles every service
//! - `Server`: start / shutdown, introspection, statistics queries
//! - `ServerHandler`: the `IoHandler` both listeners share
//!
//! ## Server Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Server                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐                        │
//! │  │ TLS listener │   │plain listener│ (optional shim)        │
//! │  └──────┬───────┘   └──────┬───────┘                        │
//! │         └────────┬─────────┘                                │
//! │                  ▼                                          │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │                 ServerHandler                        │   │
//! │  │  created ─► Sessions + interceptors + challenge      │   │
//! │  │  received ─► dispatch gate ─► PacketRouter           │   │
//! │  │  closed ─► Sessions + interceptors                   │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                                                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌─────────────────┐   │
//! │  │  HostStore   │  │ Certificates │  │ Stats aggregator│   │
//! │  └──────────────┘  └──────────────┘  └─────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Main Logical Flow
//! 1. `Server::builder(config).build()`: config validated, handlers
//!    resolved. Any error here is fatal
//! 2. `start()`: host "up", certificate, TLS listener, plain listener,
//!    digest timer. Any error here is logged and the server stays idle
//! 3. `shutdown()`: stop accepting, close all sessions, host "down"
//!    (best effort), stop the digest timer
//!
//! ## ⚠️ Important Note for Next Developer
//! - Application packets on an unauthenticated session are a protocol
//!   violation and close that session; they never reach a handler
//! - Sessions over `limits.max_sessions` are closed right after accept
//!   and never registered
//! - Connections that finish their handshake while the server is not
//!   accepting (before `start()`, during or after `shutdown()`) are closed
//!   without a challenge
//! - An undecodable frame before login closes the session; after login it
//!   is only logged
//! - Transport callbacks run on tokio workers; nothing in
//!   `ServerHandler` may block
//!
//! ## Last Modified
//! v0.1.0 - Initial server implementation

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, trace, warn};

use aries_common::stats::{
    StatisticAggregation, StatisticsAggregator, StatisticsCollector, StatisticsQuery,
};
use aries_core::{AriesCodec, AriesPacket, Packet, PacketKind};
use aries_transport::{AcceptorOptions, IoException, IoHandler, IoSession, TcpAcceptor};

use crate::config::ServerConfig;
use crate::debug::ServerDebugger;
use crate::error::{Result, ServerError};
use crate::handlers::{HandlerContext, HandlerFactory, HandlerInstance};
use crate::hosts::{HostRecord, HostStatus, HostStore, HttpHostStore, MemoryHostStore};
use crate::services::{
    authentication_route, AriesSession, AriesStatistics, InterceptorChain, PacketRouter,
    SessionAuthenticator, SessionInfo, SessionInterceptor, Sessions, StaticTicketAuthenticator,
    SESSION_ATTRIBUTE,
};
use crate::tls::{CertificateProvider, PemCertificateProvider};

/// Router owner name of the built-in authentication route.
const AUTH_ROUTE_OWNER: &str = "authenticator";

// ============================================
// ServerHandler
// ============================================

/// Transport callbacks shared by every listener.
pub struct ServerHandler {
    sessions: Arc<Sessions>,
    router: PacketRouter,
    interceptors: InterceptorChain,
    statistics: AriesStatistics,
    max_sessions: usize,
    accepting: AtomicBool,
}

impl ServerHandler {
    fn session(io: &IoSession<Packet>) -> Option<Arc<AriesSession>> {
        AriesSession::from_io(io)
    }

    fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }
}

impl IoHandler<Packet> for ServerHandler {
    type Error = ServerError;

    fn session_created(&self, io: &Arc<IoSession<Packet>>) {
        if !self.is_accepting() {
            debug!(
                session_id = %io.id(),
                remote = %io.remote_addr(),
                "Not accepting, closing connection"
            );
            io.close();
            return;
        }

        let session = Arc::new(AriesSession::new(Arc::clone(io)));

        if !self.sessions.try_add(Arc::clone(&session), self.max_sessions) {
            warn!(
                session_id = %io.id(),
                remote = %io.remote_addr(),
                limit = self.max_sessions,
                "Session limit reached, closing connection"
            );
            io.close();
            return;
        }
        // Shutdown clears the flag before closing the registry; whichever
        // side loses the race still closes this session.
        if !self.is_accepting() {
            self.sessions.remove(&session.id());
            debug!(session_id = %io.id(), "Shutdown raced accept, closing connection");
            io.close();
            return;
        }
        io.set_attribute(SESSION_ATTRIBUTE, Arc::clone(&session));

        info!(
            session_id = %io.id(),
            remote = %io.remote_addr(),
            secure = io.is_secure(),
            "[SESSION-CREATE]"
        );

        self.interceptors.notify_created(&session);

        // The server starts the handshake.
        match session.write(AriesPacket::RequestClientSession) {
            Ok(()) => {
                session.begin_authentication();
            }
            Err(e) => debug!(session_id = %io.id(), error = %e, "Challenge not sent"),
        }
    }

    fn session_opened(&self, io: &Arc<IoSession<Packet>>) {
        if Self::session(io).is_some() {
            self.statistics.session_opened();
        }
    }

    fn message_received(&self, io: &Arc<IoSession<Packet>>, message: Packet) -> Result<()> {
        self.statistics.message_received();

        let Some(session) = Self::session(io) else {
            trace!(session_id = %io.id(), "Message on unregistered session dropped");
            return Ok(());
        };

        let kind = message.kind();
        trace!(session_id = %io.id(), %kind, "Message received");

        if kind.is_application() && !session.is_authenticated() {
            return Err(ServerError::ProtocolViolation {
                session: session.id(),
                kind,
            });
        }

        self.router.dispatch(&session, &message)?;
        Ok(())
    }

    fn message_sent(&self, io: &Arc<IoSession<Packet>>, message: &Packet) {
        trace!(session_id = %io.id(), kind = %message.kind(), "Message sent");
        self.statistics.message_sent();
    }

    fn session_closed(&self, io: &Arc<IoSession<Packet>>) {
        let Some(session) = Self::session(io) else {
            return;
        };
        io.remove_attribute(SESSION_ATTRIBUTE);
        session.mark_closed();
        self.sessions.remove(&session.id());

        info!(
            session_id = %io.id(),
            remote = %io.remote_addr(),
            user = session.user().as_deref().unwrap_or("-"),
            messages_in = io.messages_in(),
            messages_out = io.messages_out(),
            "[SESSION-CLOSED]"
        );

        self.interceptors.notify_closed(&session);
        self.statistics.session_closed();
    }

    fn exception_caught(&self, io: &Arc<IoSession<Packet>>, error: IoException<ServerError>) {
        match error {
            IoException::Transport(e) => {
                if e.is_socket_error() {
                    error!(session_id = %io.id(), error = %e, "Socket error");
                    io.close();
                } else {
                    debug!(session_id = %io.id(), error = %e, "Transport error");
                }
            }
            IoException::Codec(e) => match Self::session(io) {
                Some(session) if !session.is_authenticated() => {
                    warn!(
                        session_id = %io.id(),
                        error = %e,
                        "Undecodable frame before login, closing session"
                    );
                    io.close();
                }
                _ => warn!(session_id = %io.id(), error = %e, "Undecodable frame"),
            },
            IoException::Handler(e) if e.should_close_session() => {
                warn!(session_id = %io.id(), error = %e, "Closing session");
                io.close();
            }
            IoException::Handler(e) => {
                error!(session_id = %io.id(), error = %e, "Handler error");
            }
        }
    }
}

impl std::fmt::Debug for ServerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandler")
            .field("sessions", &self.sessions)
            .field("router", &self.router)
            .field("interceptors", &self.interceptors)
            .field("max_sessions", &self.max_sessions)
            .field("accepting", &self.is_accepting())
            .finish()
    }
}

// ============================================
// ServerBuilder
// ============================================

/// Assembles a [`Server`].
///
/// # Example
/// ```ignore
/// let server = Server::builder(config)
///     .authenticator(Arc::new(MyAuthenticator::new()))
///     .build()?;
/// server.start().await?;
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
    factory: HandlerFactory,
    handlers: Vec<Arc<dyn HandlerInstance>>,
    interceptors: Vec<Arc<dyn SessionInterceptor>>,
    authenticator: Option<Arc<dyn SessionAuthenticator>>,
    host_store: Option<Arc<dyn HostStore>>,
    certificates: Option<Arc<dyn CertificateProvider>>,
    debugger: Option<Arc<dyn ServerDebugger>>,
}

impl ServerBuilder {
    fn new(config: ServerConfig) -> Self {
        Self {
            config,
            factory: HandlerFactory::with_defaults(),
            handlers: Vec::new(),
            interceptors: Vec::new(),
            authenticator: None,
            host_store: None,
            certificates: None,
            debugger: None,
        }
    }

    /// Replaces the factory used to resolve `[server] handlers`.
    #[must_use]
    pub fn handler_factory(mut self, factory: HandlerFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Adds a handler instance next to the configured ones.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn HandlerInstance>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Adds a lifecycle interceptor. Runs before handler interceptors.
    #[must_use]
    pub fn interceptor(mut self, interceptor: Arc<dyn SessionInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Replaces the ticket authenticator built from `[auth]`.
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn SessionAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Replaces the host store chosen from `[hosts]`.
    #[must_use]
    pub fn host_store(mut self, store: Arc<dyn HostStore>) -> Self {
        self.host_store = Some(store);
        self
    }

    /// Replaces the PEM provider built from `[tls]`.
    #[must_use]
    pub fn certificates(mut self, provider: Arc<dyn CertificateProvider>) -> Self {
        self.certificates = Some(provider);
        self
    }

    /// Attaches a debugger.
    #[must_use]
    pub fn debugger(mut self, debugger: Arc<dyn ServerDebugger>) -> Self {
        self.debugger = Some(debugger);
        self
    }

    /// Validates the configuration and wires every service.
    ///
    /// # Errors
    /// - `ConfigMissing` / `ConfigInvalid`: bad configuration
    /// - `UnknownHandler`: a configured handler name is not in the factory
    /// - Whatever a handler constructor or the host store client returns
    pub fn build(self) -> Result<Arc<Server>> {
        let config = self.config;
        config.validate()?;
        let call_sign = config.call_sign()?.to_string();

        let sessions = Arc::new(Sessions::new());
        let aggregator = Arc::new(StatisticsAggregator::new(
            config.statistics.aggregator_config(),
        ));
        let collector = Arc::new(StatisticsCollector::with_capacity(
            config.statistics.collector_capacity,
        ));
        aggregator.register_collector(Arc::clone(&collector));
        let statistics = AriesStatistics::new(&call_sign, collector);

        let authenticator: Arc<dyn SessionAuthenticator> = match self.authenticator {
            Some(authenticator) => authenticator,
            None => Arc::new(StaticTicketAuthenticator::from_config(&config.auth)),
        };

        let mut router = PacketRouter::new();
        router.register_fn(
            PacketKind::REQUEST_CLIENT_SESSION_RESPONSE,
            AUTH_ROUTE_OWNER,
            authentication_route(authenticator),
        );

        let mut interceptors = InterceptorChain::new();
        for interceptor in self.interceptors {
            interceptors.add(interceptor);
        }

        let ctx = HandlerContext {
            call_sign: call_sign.clone(),
            sessions: Arc::clone(&sessions),
            aggregator: Arc::clone(&aggregator),
        };
        let mut handlers = Vec::with_capacity(config.server.handlers.len() + self.handlers.len());
        for name in &config.server.handlers {
            handlers.push(self.factory.resolve(name, &ctx)?);
        }
        handlers.extend(self.handlers);

        for handler in &handlers {
            let routes = router.register_instance(handler);
            if let Some(interceptor) = Arc::clone(handler).interceptor() {
                interceptors.add(interceptor);
            }
            debug!(handler = handler.name(), routes, "Handler registered");
        }

        let host_store: Arc<dyn HostStore> = match (self.host_store, &config.hosts.url) {
            (Some(store), _) => store,
            (None, Some(url)) => Arc::new(HttpHostStore::new(url.clone(), config.hosts.request_timeout())?),
            (None, None) => Arc::new(MemoryHostStore::new()),
        };

        let certificates: Arc<dyn CertificateProvider> = match self.certificates {
            Some(provider) => provider,
            None => Arc::new(PemCertificateProvider::new(config.cert_path()?, config.key_path()?)),
        };

        let codec = Arc::new(AriesCodec::with_max_frame_size(config.limits.max_frame_size));

        let handler = Arc::new(ServerHandler {
            sessions: Arc::clone(&sessions),
            router,
            interceptors,
            statistics,
            max_sessions: config.limits.max_sessions,
            accepting: AtomicBool::new(false),
        });

        info!(
            call_sign = %call_sign,
            handlers = handlers.len(),
            routes = handler.router.len(),
            interceptors = handler.interceptors.len(),
            "Server built"
        );

        let server = Arc::new(Server {
            config,
            call_sign,
            handler,
            codec,
            sessions,
            aggregator,
            host_store,
            certificates,
            debugger: self.debugger,
            listeners: tokio::sync::Mutex::new(None),
            serving: AtomicBool::new(false),
        });

        if let Some(debugger) = &server.debugger {
            debugger.attach(Arc::downgrade(&server));
        }

        Ok(server)
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("factory", &self.factory)
            .field("handlers", &self.handlers.len())
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

// ============================================
// Server
// ============================================

struct Listeners {
    secure: TcpAcceptor,
    plain: Option<TcpAcceptor>,
}

/// Aries protocol server.
///
/// # Lifecycle
/// 1. Build with `Server::builder(config).build()`
/// 2. Start with `server.start().await`
/// 3. Stop with `server.shutdown().await`
pub struct Server {
    config: ServerConfig,
    call_sign: String,
    handler: Arc<ServerHandler>,
    codec: Arc<AriesCodec>,
    sessions: Arc<Sessions>,
    aggregator: Arc<StatisticsAggregator>,
    host_store: Arc<dyn HostStore>,
    certificates: Arc<dyn CertificateProvider>,
    debugger: Option<Arc<dyn ServerDebugger>>,
    listeners: tokio::sync::Mutex<Option<Listeners>>,
    serving: AtomicBool,
}

impl Server {
    /// Starts assembling a server from `config`.
    #[must_use]
    pub fn builder(config: ServerConfig) -> ServerBuilder {
        ServerBuilder::new(config)
    }

    /// Starts serving.
    ///
    /// A bootstrap failure is logged and leaves the server idle; the error
    /// is returned for the caller's information only.
    ///
    /// # Errors
    /// - `AlreadyRunning` if the server is serving
    /// - The bootstrap failure (host store, certificate, bind)
    pub async fn start(&self) -> Result<()> {
        let mut listeners = self.listeners.lock().await;
        if listeners.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        info!(call_sign = %self.call_sign, "Starting Aries server v{}", env!("CARGO_PKG_VERSION"));

        self.handler.accepting.store(true, Ordering::SeqCst);
        match self.bootstrap().await {
            Ok(bound) => {
                *listeners = Some(bound);
                self.serving.store(true, Ordering::SeqCst);
                info!(call_sign = %self.call_sign, "Server started successfully");
                Ok(())
            }
            Err(e) => {
                self.handler.accepting.store(false, Ordering::SeqCst);
                error!(call_sign = %self.call_sign, error = %e, "Error bootstrapping server");
                Err(e)
            }
        }
    }

    async fn bootstrap(&self) -> Result<Listeners> {
        let record = HostRecord::up(
            &self.call_sign,
            self.config.public_host()?,
            self.config.internal_host()?,
        );
        self.host_store.create_host(&record).await?;

        match self.bind().await {
            Ok(listeners) => Ok(listeners),
            Err(e) => {
                if let Err(down) = self.host_store.set_status(&self.call_sign, HostStatus::Down).await {
                    debug!(error = %down, "Failed to mark host down");
                }
                Err(e)
            }
        }
    }

    async fn bind(&self) -> Result<Listeners> {
        let tls = TlsAcceptor::from(self.certificates.server_config().await?);

        let mut options = AcceptorOptions::plain();
        if let Some(debugger) = &self.debugger {
            options = options.with_packet_logger(debugger.packet_logger());
        }

        let secure = TcpAcceptor::bind(
            self.config.binding()?,
            options.clone().with_tls(tls),
            Arc::clone(&self.codec),
            Arc::clone(&self.handler),
        )
        .await?;
        info!(local_addr = %secure.local_addr(), "Listening with TLS");

        let plain = match self.config.server.plain_binding {
            Some(addr) => {
                match TcpAcceptor::bind(addr, options, Arc::clone(&self.codec), Arc::clone(&self.handler)).await {
                    Ok(acceptor) => {
                        info!(local_addr = %acceptor.local_addr(), "Listening in the plain");
                        Some(acceptor)
                    }
                    Err(e) => {
                        secure.unbind().await;
                        return Err(e.into());
                    }
                }
            }
            None => None,
        };

        if let Err(e) = self.aggregator.start_digest() {
            secure.unbind().await;
            if let Some(plain) = &plain {
                plain.unbind().await;
            }
            return Err(e.into());
        }

        Ok(Listeners { secure, plain })
    }

    /// Stops serving.
    ///
    /// Stops accepting, closes every live session, marks the host down and
    /// stops the digest timer. Handshakes still in flight are refused once
    /// they complete. Host store failures are ignored. No-op if
    /// the server is not serving.
    pub async fn shutdown(&self) {
        let Some(listeners) = self.listeners.lock().await.take() else {
            return;
        };
        self.handler.accepting.store(false, Ordering::SeqCst);
        self.serving.store(false, Ordering::SeqCst);
        info!(call_sign = %self.call_sign, "Shutting down server...");

        listeners.secure.unbind().await;
        if let Some(plain) = &listeners.plain {
            plain.unbind().await;
        }

        let closed = self.sessions.close_all();
        debug!(sessions = closed, "Closed live sessions");

        if let Err(e) = self.host_store.set_status(&self.call_sign, HostStatus::Down).await {
            debug!(error = %e, "Failed to mark host down");
        }

        self.aggregator.stop_digest().await;
        info!(call_sign = %self.call_sign, "Server shutdown complete");
    }

    /// Returns `true` between a successful `start()` and `shutdown()`.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }

    /// Secure listener address while serving.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listeners
            .lock()
            .await
            .as_ref()
            .map(|l| l.secure.local_addr())
    }

    /// Plain listener address while serving, if configured.
    pub async fn plain_local_addr(&self) -> Option<SocketAddr> {
        self.listeners
            .lock()
            .await
            .as_ref()
            .and_then(|l| l.plain.as_ref().map(TcpAcceptor::local_addr))
    }

    /// Configured call sign.
    #[must_use]
    pub fn call_sign(&self) -> &str {
        &self.call_sign
    }

    /// Configuration the server was built with.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Live session registry.
    #[must_use]
    pub fn sessions(&self) -> &Arc<Sessions> {
        &self.sessions
    }

    /// Statistics aggregator fed by this server.
    #[must_use]
    pub fn aggregator(&self) -> &Arc<StatisticsAggregator> {
        &self.aggregator
    }

    /// Packet routes installed at build time.
    #[must_use]
    pub fn router(&self) -> &PacketRouter {
        &self.handler.router
    }

    /// Point-in-time list of live socket sessions.
    #[must_use]
    pub fn socket_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.snapshot().iter().map(|s| s.info()).collect()
    }

    /// Runs a statistics query against this server's aggregator.
    ///
    /// # Errors
    /// `Common(InvalidInput)` for a malformed query.
    pub fn query_statistics(&self, query: &StatisticsQuery) -> Result<Vec<StatisticAggregation>> {
        Ok(self.aggregator.query(query)?)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("call_sign", &self.call_sign)
            .field("serving", &self.is_serving())
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aries_core::VoltronPacket;
    use aries_transport::{Outbound, TransportError};

    use crate::error::ServerError;

    fn config() -> ServerConfig {
        ServerConfig::from_toml(
            r#"
            [server]
            call_sign = "city-1"
            public_host = "127.0.0.1:33100"
            internal_host = "127.0.0.1:33100"
            binding = "127.0.0.1:0"
            handlers = ["echo"]

            [tls]
            cert_path = "/nonexistent/cert.pem"
            key_path = "/nonexistent/key.pem"

            [limits]
            max_sessions = 2

            [auth]
            tickets = { alice = "secret" }
            "#,
        )
        .unwrap()
    }

    /// Built server whose handler accepts sessions without bound listeners.
    fn accepting_server() -> Arc<Server> {
        let server = Server::builder(config()).build().unwrap();
        server.handler.accepting.store(true, Ordering::SeqCst);
        server
    }

    fn connect(handler: &ServerHandler) -> (Arc<IoSession<Packet>>, aries_transport::Outbox<Packet>) {
        let (io, outbox) = IoSession::new(
            "127.0.0.1:33100".parse().unwrap(),
            "127.0.0.1:50000".parse().unwrap(),
            false,
        );
        handler.session_created(&io);
        handler.session_opened(&io);
        (io, outbox)
    }

    fn login(user: &str, ticket: &str) -> Packet {
        AriesPacket::RequestClientSessionResponse(aries_core::RequestClientSessionResponse {
            user: user.to_string(),
            version: "1.0".to_string(),
            ticket: ticket.to_string(),
        })
        .into()
    }

    #[test]
    fn test_build_resolves_handlers() {
        let server = Server::builder(config()).build().unwrap();
        assert!(!server.is_serving());
        assert_eq!(server.call_sign(), "city-1");
        assert_eq!(
            server.router().owners(PacketKind::REQUEST_CLIENT_SESSION_RESPONSE),
            vec![AUTH_ROUTE_OWNER]
        );
        assert!(server.router().has_route(PacketKind::Voltron(crate::handlers::ECHO_PACKET_TYPE)));
        assert_eq!(server.aggregator().collector_count(), 1);
    }

    #[test]
    fn test_build_rejects_unknown_handler() {
        let mut config = config();
        config.server.handlers.push("lobby".to_string());
        let err = Server::builder(config).build().unwrap_err();
        assert!(matches!(err, ServerError::UnknownHandler { .. }));
    }

    #[test]
    fn test_build_rejects_missing_field() {
        let mut config = config();
        config.server.call_sign = None;
        let err = Server::builder(config).build().unwrap_err();
        assert!(matches!(err, ServerError::ConfigMissing { .. }));
    }

    #[test]
    fn test_connect_registers_and_challenges() {
        let server = accepting_server();
        let (io, mut outbox) = connect(&server.handler);

        let session = AriesSession::from_io(&io).unwrap();
        assert_eq!(session.state(), crate::services::SessionState::Authenticating);
        assert_eq!(server.sessions().len(), 1);
        assert!(matches!(
            outbox.try_recv(),
            Some(Outbound::Message(Packet::Aries(AriesPacket::RequestClientSession)))
        ));
    }

    #[test]
    fn test_application_packet_before_auth_is_violation() {
        let server = accepting_server();
        let (io, _outbox) = connect(&server.handler);

        let packet: Packet = VoltronPacket::new(1, &b"x"[..]).into();
        let err = server.handler.message_received(&io, packet).unwrap_err();
        assert!(matches!(err, ServerError::ProtocolViolation { .. }));

        server.handler.exception_caught(&io, IoException::Handler(err));
        assert!(io.is_closing());
    }

    #[test]
    fn test_auth_then_application_packet_dispatched() {
        let server = accepting_server();
        let (io, mut outbox) = connect(&server.handler);
        let _challenge = outbox.try_recv();

        server.handler.message_received(&io, login("alice", "secret")).unwrap();
        assert!(AriesSession::from_io(&io).unwrap().is_authenticated());

        let packet: Packet = VoltronPacket::new(1, &b"ping"[..]).into();
        server.handler.message_received(&io, packet).unwrap();
        assert!(matches!(outbox.try_recv(), Some(Outbound::Message(Packet::Voltron(_)))));
    }

    #[test]
    fn test_bad_ticket_closes_session() {
        let server = accepting_server();
        let (io, _outbox) = connect(&server.handler);

        let err = server.handler.message_received(&io, login("alice", "nope")).unwrap_err();
        server.handler.exception_caught(&io, IoException::Handler(err));
        assert!(io.is_closing());
    }

    #[test]
    fn test_exception_policy() {
        let server = accepting_server();
        let (io, _outbox) = connect(&server.handler);
        server.handler.message_received(&io, login("alice", "secret")).unwrap();

        server
            .handler
            .exception_caught(&io, IoException::Handler(ServerError::handler("echo", "boom")));
        assert!(!io.is_closing());

        server.handler.exception_caught(
            &io,
            IoException::Codec(aries_core::CoreError::malformed("bad string")),
        );
        assert!(!io.is_closing());

        server.handler.exception_caught(
            &io,
            IoException::Transport(TransportError::io(
                "reading frame",
                std::io::Error::from(std::io::ErrorKind::ConnectionReset),
            )),
        );
        assert!(io.is_closing());
    }

    #[test]
    fn test_undecodable_frame_before_login_closes() {
        let server = accepting_server();
        let (io, _outbox) = connect(&server.handler);

        server.handler.exception_caught(
            &io,
            IoException::Codec(aries_core::CoreError::malformed("bad voltron body")),
        );
        assert!(io.is_closing());
    }

    #[test]
    fn test_connect_while_not_accepting_is_refused() {
        let server = Server::builder(config()).build().unwrap();
        let (io, mut outbox) = connect(&server.handler);

        assert!(io.is_closing());
        assert!(server.sessions().is_empty());
        assert!(AriesSession::from_io(&io).is_none());
        assert!(!matches!(outbox.try_recv(), Some(Outbound::Message(_))));
    }

    #[test]
    fn test_connect_after_accepting_stops_is_refused() {
        let server = accepting_server();
        let (kept, _ok) = connect(&server.handler);
        assert_eq!(server.sessions().len(), 1);

        server.handler.accepting.store(false, Ordering::SeqCst);
        let (late, _ol) = connect(&server.handler);

        assert!(late.is_closing());
        assert!(!kept.is_closing());
        assert_eq!(server.sessions().len(), 1);
    }

    #[derive(Default)]
    struct CountingInterceptor {
        created: std::sync::atomic::AtomicUsize,
        closed: std::sync::atomic::AtomicUsize,
    }

    impl SessionInterceptor for CountingInterceptor {
        fn name(&self) -> &str {
            "counting"
        }

        fn session_created(&self, _session: &Arc<AriesSession>) -> Result<()> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn session_closed(&self, _session: &Arc<AriesSession>) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingInterceptor {
        panics: bool,
    }

    impl SessionInterceptor for FailingInterceptor {
        fn name(&self) -> &str {
            "failing"
        }

        fn session_created(&self, _session: &Arc<AriesSession>) -> Result<()> {
            Ok(())
        }

        fn session_closed(&self, _session: &Arc<AriesSession>) -> Result<()> {
            if self.panics {
                panic!("presence list gone");
            }
            Err(ServerError::internal("presence list gone"))
        }
    }

    #[test]
    fn test_failing_close_interceptor_still_unregisters() {
        for panics in [false, true] {
            let counting = Arc::new(CountingInterceptor::default());
            let server = Server::builder(config())
                .interceptor(Arc::new(FailingInterceptor { panics }))
                .interceptor(counting.clone())
                .build()
                .unwrap();
            server.handler.accepting.store(true, Ordering::SeqCst);

            let (io, _outbox) = connect(&server.handler);
            let session = AriesSession::from_io(&io).unwrap();
            assert_eq!(counting.created.load(Ordering::SeqCst), 1);

            server.handler.session_closed(&io);

            assert!(server.sessions().is_empty());
            assert!(server.sessions().get(&session.id()).is_none());
            assert_eq!(session.state(), crate::services::SessionState::Closed);
            assert_eq!(counting.closed.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_session_limit() {
        let server = accepting_server();
        let (_a, _oa) = connect(&server.handler);
        let (_b, _ob) = connect(&server.handler);
        let (c, _oc) = connect(&server.handler);

        assert_eq!(server.sessions().len(), 2);
        assert!(c.is_closing());
        assert!(AriesSession::from_io(&c).is_none());

        // Rejected sessions drop messages and close quietly.
        server.handler.message_received(&c, login("alice", "secret")).unwrap();
        server.handler.session_closed(&c);
        assert_eq!(server.sessions().len(), 2);
    }

    #[test]
    fn test_close_unregisters() {
        let server = accepting_server();
        let (io, _outbox) = connect(&server.handler);
        let session = AriesSession::from_io(&io).unwrap();

        server.handler.session_closed(&io);
        assert!(server.sessions().is_empty());
        assert_eq!(session.state(), crate::services::SessionState::Closed);
        assert!(AriesSession::from_io(&io).is_none());
    }

    #[tokio::test]
    async fn test_start_without_certificate_stays_idle() {
        let hosts = Arc::new(MemoryHostStore::new());
        let server = Server::builder(config())
            .host_store(hosts.clone())
            .build()
            .unwrap();

        let err = server.start().await.unwrap_err();
        assert!(err.is_bootstrap_error());
        assert!(!server.is_serving());
        assert!(server.local_addr().await.is_none());
        assert!(!server.aggregator().is_digesting());
        assert_eq!(hosts.get("city-1").unwrap().status, HostStatus::Down);

        // Shutdown of an idle server is a no-op.
        server.shutdown().await;
    }

    // ========================================
    // Over real sockets
    // ========================================

    mod live {
        use super::*;
        use std::path::Path;
        use std::time::Duration;

        use async_trait::async_trait;
        use bytes::Bytes;
        use rustls::pki_types::{CertificateDer, ServerName};
        use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpStream;

        use aries_common::stats::WILDCARD;
        use aries_common::time::Timestamp;
        use aries_core::protocol::{encode_packet, FRAME_HEADER_SIZE};
        use aries_core::FrameCodec;

        use crate::services::statistics::{HOST_DIMENSION, MESSAGE_RECEIVED};

        const WAIT: Duration = Duration::from_secs(5);

        fn write_cert(dir: &Path) -> CertificateDer<'static> {
            let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
            std::fs::write(dir.join("cert.pem"), cert.cert.pem()).unwrap();
            std::fs::write(dir.join("key.pem"), cert.key_pair.serialize_pem()).unwrap();
            cert.cert.der().clone()
        }

        fn live_config(dir: &Path) -> ServerConfig {
            let mut config = config();
            config.tls.cert_path = Some(dir.join("cert.pem"));
            config.tls.key_path = Some(dir.join("key.pem"));
            config.server.plain_binding = Some("127.0.0.1:0".parse().unwrap());
            config
        }

        async fn read_packet<S: AsyncRead + Unpin>(stream: &mut S) -> Packet {
            let mut frame = vec![0u8; FRAME_HEADER_SIZE];
            tokio::time::timeout(WAIT, stream.read_exact(&mut frame))
                .await
                .unwrap()
                .unwrap();
            let len = u32::from_le_bytes(frame[8..12].try_into().unwrap()) as usize;
            frame.resize(FRAME_HEADER_SIZE + len, 0);
            tokio::time::timeout(WAIT, stream.read_exact(&mut frame[FRAME_HEADER_SIZE..]))
                .await
                .unwrap()
                .unwrap();
            AriesCodec::new().decode(Bytes::from(frame)).unwrap()
        }

        async fn expect_eof(stream: &mut TcpStream) {
            let mut rest = Vec::new();
            tokio::time::timeout(WAIT, stream.read_to_end(&mut rest))
                .await
                .unwrap()
                .unwrap();
            assert!(rest.is_empty());
        }

        async fn wait_for(mut done: impl FnMut() -> bool) {
            tokio::time::timeout(WAIT, async {
                while !done() {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await
            .unwrap();
        }

        #[tokio::test]
        async fn test_plain_handshake_and_echo() {
            let dir = tempfile::tempdir().unwrap();
            write_cert(dir.path());
            let hosts = Arc::new(MemoryHostStore::new());
            let server = Server::builder(live_config(dir.path()))
                .host_store(hosts.clone())
                .build()
                .unwrap();

            server.start().await.unwrap();
            assert!(server.is_serving());
            assert_eq!(hosts.get("city-1").unwrap().status, HostStatus::Up);

            let addr = server.plain_local_addr().await.unwrap();
            let mut client = TcpStream::connect(addr).await.unwrap();
            assert_eq!(
                read_packet(&mut client).await,
                Packet::Aries(AriesPacket::RequestClientSession)
            );

            let mut bytes = encode_packet(&login("alice", "secret"));
            bytes.extend_from_slice(&encode_packet(&Packet::from(VoltronPacket::new(1, &b"ping"[..]))));
            client.write_all(&bytes).await.unwrap();

            match read_packet(&mut client).await {
                Packet::Voltron(p) => assert_eq!(&p.body[..], b"ping"),
                other => panic!("unexpected {other:?}"),
            }

            let sessions = server.socket_sessions();
            assert_eq!(sessions.len(), 1);
            assert_eq!(sessions[0].user.as_deref(), Some("alice"));
            assert!(!sessions[0].secure);

            server.aggregator().digest();
            let now = Timestamp::now();
            let rows = server
                .query_statistics(
                    &StatisticsQuery::new(
                        MESSAGE_RECEIVED,
                        now.saturating_sub(Duration::from_secs(3600)),
                        now.saturating_add(Duration::from_secs(3600)),
                        Duration::from_secs(3600),
                    )
                    .dimension(HOST_DIMENSION, WILDCARD),
                )
                .unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].sum, 2.0);

            server.shutdown().await;
            expect_eof(&mut client).await;
            assert!(!server.is_serving());
            assert_eq!(hosts.get("city-1").unwrap().status, HostStatus::Down);
            wait_for(|| server.sessions().is_empty()).await;
            assert!(!server.aggregator().is_digesting());
        }

        fn connector(der: CertificateDer<'static>) -> tokio_rustls::TlsConnector {
            let mut roots = rustls::RootCertStore::empty();
            roots.add(der).unwrap();
            let client_config = rustls::ClientConfig::builder_with_provider(Arc::new(
                rustls::crypto::ring::default_provider(),
            ))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots)
            .with_no_client_auth();
            tokio_rustls::TlsConnector::from(Arc::new(client_config))
        }

        #[tokio::test]
        async fn test_tls_handshake() {
            let dir = tempfile::tempdir().unwrap();
            let der = write_cert(dir.path());
            let server = Server::builder(live_config(dir.path())).build().unwrap();
            server.start().await.unwrap();
            let connector = connector(der);

            let tcp = TcpStream::connect(server.local_addr().await.unwrap()).await.unwrap();
            let mut tls = connector
                .connect(ServerName::try_from("localhost").unwrap(), tcp)
                .await
                .unwrap();

            assert_eq!(
                read_packet(&mut tls).await,
                Packet::Aries(AriesPacket::RequestClientSession)
            );
            tls.write_all(&encode_packet(&login("alice", "secret"))).await.unwrap();
            wait_for(|| server.sessions().authenticated_count() == 1).await;
            assert!(server.socket_sessions()[0].secure);

            server.shutdown().await;
        }

        #[tokio::test]
        async fn test_handshake_finishing_after_shutdown_is_refused() {
            let dir = tempfile::tempdir().unwrap();
            let der = write_cert(dir.path());
            let server = Server::builder(live_config(dir.path())).build().unwrap();
            server.start().await.unwrap();
            let connector = connector(der);

            // Accepted but the TLS handshake has not started yet.
            let tcp = TcpStream::connect(server.local_addr().await.unwrap()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            server.shutdown().await;

            let handshake = tokio::time::timeout(
                WAIT,
                connector.connect(ServerName::try_from("localhost").unwrap(), tcp),
            )
            .await
            .unwrap();
            if let Ok(mut tls) = handshake {
                let mut rest = Vec::new();
                let _ = tokio::time::timeout(WAIT, tls.read_to_end(&mut rest)).await.unwrap();
                assert!(rest.is_empty());
            }
            assert!(server.sessions().is_empty());
            assert!(server.socket_sessions().is_empty());
        }

        #[tokio::test]
        async fn test_application_packet_before_auth_drops_connection() {
            let dir = tempfile::tempdir().unwrap();
            write_cert(dir.path());
            let server = Server::builder(live_config(dir.path())).build().unwrap();
            server.start().await.unwrap();

            let addr = server.plain_local_addr().await.unwrap();
            let mut client = TcpStream::connect(addr).await.unwrap();
            let _challenge = read_packet(&mut client).await;

            client
                .write_all(&encode_packet(&Packet::from(VoltronPacket::new(1, &b"early"[..]))))
                .await
                .unwrap();
            expect_eof(&mut client).await;
            wait_for(|| server.sessions().is_empty()).await;

            server.shutdown().await;
        }

        #[tokio::test]
        async fn test_start_twice() {
            let dir = tempfile::tempdir().unwrap();
            write_cert(dir.path());
            let server = Server::builder(live_config(dir.path())).build().unwrap();

            server.start().await.unwrap();
            assert!(matches!(server.start().await, Err(ServerError::AlreadyRunning)));
            server.shutdown().await;

            // A stopped server can be started again.
            server.start().await.unwrap();
            server.shutdown().await;
        }

        struct OfflineStore;

        #[async_trait]
        impl HostStore for OfflineStore {
            async fn create_host(&self, _record: &HostRecord) -> Result<()> {
                Err(ServerError::host_store("offline"))
            }

            async fn set_status(&self, _call_sign: &str, _status: HostStatus) -> Result<()> {
                Err(ServerError::host_store("offline"))
            }
        }

        #[tokio::test]
        async fn test_host_store_failure_keeps_server_idle() {
            let dir = tempfile::tempdir().unwrap();
            write_cert(dir.path());
            let server = Server::builder(live_config(dir.path()))
                .host_store(Arc::new(OfflineStore))
                .build()
                .unwrap();

            let err = server.start().await.unwrap_err();
            assert!(matches!(err, ServerError::HostStore { .. }));
            assert!(!server.is_serving());
            assert!(server.plain_local_addr().await.is_none());
        }
    }
}
