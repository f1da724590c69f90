// ============================================
// File: crates/aries-transport/src/tcp.rs
// ============================================
//! # TCP Acceptor
//!
//! ## Creation Reason
//! Accepts game-client connections over TCP, optionally wrapped in TLS,
//! and drives each one through the `IoHandler` callbacks.
//!
//! ## Main Functionality
//! - `TcpAcceptor::bind`: socket setup via `socket2`, accept loop on tokio
//! - One task per connection: TLS handshake, framed reads, queued writes
//! - Optional `PacketLogger` tap on both directions
//!
//! ## Main Logical Flow
//! ```text
//! accept ─► [TLS handshake] ─► session_created ─► session_opened
//!               │
//!               ▼
//!      ┌─── select (biased) ───┐
//!      │ outbox: write / close │
//!      │ socket: read frames   │──► check_complete ─► decode ─► message_received
//!      └───────────────────────┘
//!               │ EOF / error / close
//!               ▼
//!         session_closed (exactly once)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The outbox branch is polled first so a `close()` queued behind writes
//!   still flushes them
//! - A framing error (oversize frame) ends the connection; a decode error
//!   on a complete frame only drops that frame
//! - `unbind()` stops accepting; live connections are not touched
//!
//! ## Last Modified
//! v0.1.0 - Initial TCP acceptor

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, trace, warn};

use aries_core::FrameCodec;

use crate::error::{Result, TransportError};
use crate::session::{IoSession, Outbound};
use crate::traits::{Direction, IoException, IoHandler, PacketLogger};

/// Initial read buffer size per connection.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Pending connection backlog.
const LISTEN_BACKLOG: i32 = 1024;

// ============================================
// AcceptorOptions
// ============================================

/// Per-listener options.
#[derive(Clone, Default)]
pub struct AcceptorOptions {
    /// Wrap every connection in TLS.
    pub tls: Option<TlsAcceptor>,
    /// Copy every raw frame to this logger.
    pub packet_logger: Option<Arc<dyn PacketLogger>>,
}

impl AcceptorOptions {
    /// Plaintext listener without logging.
    #[must_use]
    pub fn plain() -> Self {
        Self::default()
    }

    /// Enables TLS.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsAcceptor) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Enables the packet logger.
    #[must_use]
    pub fn with_packet_logger(mut self, logger: Arc<dyn PacketLogger>) -> Self {
        self.packet_logger = Some(logger);
        self
    }
}

impl std::fmt::Debug for AcceptorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceptorOptions")
            .field("tls", &self.tls.is_some())
            .field("packet_logger", &self.packet_logger.is_some())
            .finish()
    }
}

// ============================================
// TcpAcceptor
// ============================================

/// Bound TCP listener with a running accept loop.
///
/// # Example
/// ```ignore
/// let acceptor = TcpAcceptor::bind(
///     "0.0.0.0:33100".parse()?,
///     AcceptorOptions::plain(),
///     Arc::new(AriesCodec::new()),
///     handler,
/// )
/// .await?;
/// // ...
/// acceptor.unbind().await;
/// ```
pub struct TcpAcceptor {
    local_addr: SocketAddr,
    secure: bool,
    shutdown_tx: broadcast::Sender<()>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpAcceptor {
    /// Binds `addr` and starts accepting connections.
    ///
    /// # Socket Options
    /// - `SO_REUSEADDR`: Enabled for quick rebinding
    /// - Non-blocking: Required for async operations
    ///
    /// # Errors
    /// - `AddressInUse`: If the port is taken
    /// - `BindFailed`: Any other bind failure
    pub async fn bind<C, H>(
        addr: SocketAddr,
        options: AcceptorOptions,
        codec: Arc<C>,
        handler: Arc<H>,
    ) -> Result<Self>
    where
        C: FrameCodec,
        H: IoHandler<C::Message>,
    {
        let listener = Self::listen(addr)?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::io("getting local address", e))?;
        let secure = options.tls.is_some();

        info!(%local_addr, secure, "TCP acceptor bound");

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            local_addr,
            options,
            codec,
            handler,
            shutdown_rx,
        ));

        Ok(Self {
            local_addr,
            secure,
            shutdown_tx,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    fn listen(addr: SocketAddr) -> Result<TcpListener> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| TransportError::io("creating TCP socket", e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::io("setting SO_REUSEADDR", e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::io("setting non-blocking", e))?;
        socket.bind(&addr.into()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                TransportError::AddressInUse { addr }
            } else {
                TransportError::bind_failed(addr, e.to_string())
            }
        })?;
        socket
            .listen(LISTEN_BACKLOG)
            .map_err(|e| TransportError::bind_failed(addr, e.to_string()))?;

        let std_listener: std::net::TcpListener = socket.into();
        TcpListener::from_std(std_listener)
            .map_err(|e| TransportError::io("converting to Tokio listener", e))
    }

    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns `true` if connections are wrapped in TLS.
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.secure
    }

    /// Returns `true` while the accept loop runs.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.accept_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stops accepting new connections and releases the port.
    pub async fn unbind(&self) {
        let _ = self.shutdown_tx.send(());
        let task = self.accept_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
            info!(local_addr = %self.local_addr, "TCP acceptor unbound");
        }
    }
}

impl std::fmt::Debug for TcpAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpAcceptor")
            .field("local_addr", &self.local_addr)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

// ============================================
// Accept loop
// ============================================

async fn accept_loop<C, H>(
    listener: TcpListener,
    local_addr: SocketAddr,
    options: AcceptorOptions,
    codec: Arc<C>,
    handler: Arc<H>,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    C: FrameCodec,
    H: IoHandler<C::Message>,
{
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!(%local_addr, "Accept loop received shutdown signal");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    trace!(%remote_addr, "Accepted connection");
                    tokio::spawn(run_connection(
                        stream,
                        local_addr,
                        remote_addr,
                        options.clone(),
                        Arc::clone(&codec),
                        Arc::clone(&handler),
                    ));
                }
                Err(e) => {
                    warn!(%local_addr, error = %e, "Accept failed");
                }
            }
        }
    }
}

async fn run_connection<C, H>(
    stream: TcpStream,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    options: AcceptorOptions,
    codec: Arc<C>,
    handler: Arc<H>,
) where
    C: FrameCodec,
    H: IoHandler<C::Message>,
{
    let _ = stream.set_nodelay(true);
    let logger = options.packet_logger;

    match options.tls {
        Some(tls) => match tls.accept(stream).await {
            Ok(tls_stream) => {
                drive(tls_stream, local_addr, remote_addr, true, logger, codec, handler).await;
            }
            Err(e) => {
                // No session exists yet, so there is nobody to notify.
                debug!(%remote_addr, error = %e, "TLS handshake failed");
            }
        },
        None => drive(stream, local_addr, remote_addr, false, logger, codec, handler).await,
    }
}

// ============================================
// Connection driver
// ============================================

async fn drive<S, C, H>(
    stream: S,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    secure: bool,
    logger: Option<Arc<dyn PacketLogger>>,
    codec: Arc<C>,
    handler: Arc<H>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    C: FrameCodec,
    H: IoHandler<C::Message>,
{
    let (session, mut outbox) = IoSession::new(local_addr, remote_addr, secure);
    handler.session_created(&session);
    handler.session_opened(&session);

    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut read_buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    let mut write_buf = BytesMut::new();

    loop {
        tokio::select! {
            biased;

            queued = outbox.recv() => match queued {
                Some(Outbound::Message(message)) => {
                    write_buf.clear();
                    codec.encode(&message, &mut write_buf);
                    if let Some(logger) = &logger {
                        logger.log_frame(session.id(), Direction::Outbound, &write_buf);
                    }
                    if let Err(e) = writer.write_all(&write_buf).await {
                        handler.exception_caught(
                            &session,
                            IoException::Transport(TransportError::io("writing frame", e)),
                        );
                        break;
                    }
                    session.record_write(write_buf.len());
                    handler.message_sent(&session, &message);
                }
                Some(Outbound::Close) | None => break,
            },

            read = reader.read_buf(&mut read_buf) => match read {
                Ok(0) => {
                    trace!(session_id = %session.id(), "Peer closed connection");
                    break;
                }
                Ok(n) => {
                    session.record_read(n);
                    if !process_frames(&session, &mut read_buf, logger.as_deref(), &*codec, &*handler) {
                        break;
                    }
                }
                Err(e) => {
                    handler.exception_caught(
                        &session,
                        IoException::Transport(TransportError::io("reading frame", e)),
                    );
                    break;
                }
            },
        }
    }

    // Flush whatever was queued before the close request.
    while let Some(Outbound::Message(message)) = outbox.try_recv() {
        write_buf.clear();
        codec.encode(&message, &mut write_buf);
        if writer.write_all(&write_buf).await.is_err() {
            break;
        }
        session.record_write(write_buf.len());
        handler.message_sent(&session, &message);
    }

    let _ = writer.shutdown().await;
    session.mark_closed();
    handler.session_closed(&session);
}

/// Decodes and dispatches every complete frame in `buf`.
///
/// Returns `false` if the connection must end.
fn process_frames<C, H>(
    session: &Arc<IoSession<C::Message>>,
    buf: &mut BytesMut,
    logger: Option<&dyn PacketLogger>,
    codec: &C,
    handler: &H,
) -> bool
where
    C: FrameCodec,
    H: IoHandler<C::Message>,
{
    loop {
        if session.is_closing() {
            return true;
        }
        match codec.check_complete(buf) {
            Ok(Some(len)) => {
                let frame = buf.split_to(len).freeze();
                if let Some(logger) = logger {
                    logger.log_frame(session.id(), Direction::Inbound, &frame);
                }
                match codec.decode(frame) {
                    Ok(message) => {
                        session.record_message_in();
                        if let Err(e) = handler.message_received(session, message) {
                            handler.exception_caught(session, IoException::Handler(e));
                        }
                    }
                    Err(e) => handler.exception_caught(session, IoException::Codec(e)),
                }
            }
            Ok(None) => return true,
            Err(e) => {
                handler.exception_caught(session, IoException::Codec(e));
                return false;
            }
        }
    }
}
