// ============================================
// File: crates/aries-transport/src/session.rs
// ============================================
//! # Transport Session Handle
//!
//! ## Creation Reason
//! Handlers need a handle to "their" connection that can be cloned into
//! registries, written to from any task and closed without touching the
//! socket directly.
//!
//! ## Main Functionality
//! - `IoSession`: identity, addresses, attribute bag, outbound queue
//! - `Outbox`: receiving end of the outbound queue, drained by the
//!   connection task
//! - `Outbound`: queued write or close request
//!
//! ## Main Logical Flow
//! 1. Connection task creates the pair with `IoSession::new`
//! 2. Handlers call `write()` / `close()`; both only enqueue
//! 3. Connection task writes queued messages in order and stops at the
//!    first `Close`, so writes queued before a close are flushed
//!
//! ## ⚠️ Important Note for Next Developer
//! - `write()` never blocks, the queue is unbounded
//! - Values in the attribute bag that point back to this session create an
//!   `Arc` cycle; remove them on close
//!
//! ## Last Modified
//! v0.1.0 - Initial session handle

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::mpsc;

use aries_common::time::AtomicInstant;
use aries_common::SessionId;

use crate::error::{Result, TransportError};

/// Queued request for the connection task.
#[derive(Debug)]
pub enum Outbound<M> {
    /// Encode and write this message.
    Message(M),
    /// Flush and close the connection.
    Close,
}

/// Receiving side of a session's outbound queue.
#[derive(Debug)]
pub struct Outbox<M> {
    rx: mpsc::UnboundedReceiver<Outbound<M>>,
}

impl<M> Outbox<M> {
    /// Waits for the next queued request.
    ///
    /// Returns `None` once every `IoSession` handle is dropped.
    pub async fn recv(&mut self) -> Option<Outbound<M>> {
        self.rx.recv().await
    }

    /// Returns the next queued request without waiting.
    pub fn try_recv(&mut self) -> Option<Outbound<M>> {
        self.rx.try_recv().ok()
    }
}

/// Handle to one live connection.
pub struct IoSession<M> {
    id: SessionId,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    secure: bool,
    attributes: DashMap<String, Arc<dyn Any + Send + Sync>>,
    outbound: mpsc::UnboundedSender<Outbound<M>>,
    closing: AtomicBool,
    created_at: Instant,
    last_activity: AtomicInstant,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    messages_in: AtomicU64,
    messages_out: AtomicU64,
}

impl<M> IoSession<M> {
    /// Creates a session handle and the outbox its connection task drains.
    #[must_use]
    pub fn new(local_addr: SocketAddr, remote_addr: SocketAddr, secure: bool) -> (Arc<Self>, Outbox<M>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            id: SessionId::generate(),
            local_addr,
            remote_addr,
            secure,
            attributes: DashMap::new(),
            outbound: tx,
            closing: AtomicBool::new(false),
            created_at: Instant::now(),
            last_activity: AtomicInstant::now(),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            messages_in: AtomicU64::new(0),
            messages_out: AtomicU64::new(0),
        });
        (session, Outbox { rx })
    }

    /// Unique session ID.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Local address the connection was accepted on.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Peer address.
    #[must_use]
    pub const fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Returns `true` if the connection runs over TLS.
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.secure
    }

    /// Queues a message for writing.
    ///
    /// # Errors
    /// `TransportError::SessionClosed` once `close()` was called or the
    /// connection task has exited.
    pub fn write(&self, message: M) -> Result<()> {
        if self.is_closing() {
            return Err(TransportError::SessionClosed);
        }
        self.outbound
            .send(Outbound::Message(message))
            .map_err(|_| TransportError::SessionClosed)
    }

    /// Requests the connection be closed after pending writes flush.
    ///
    /// Idempotent.
    pub fn close(&self) {
        if !self.closing.swap(true, Ordering::AcqRel) {
            let _ = self.outbound.send(Outbound::Close);
        }
    }

    /// Returns `true` once a close was requested or the connection ended.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self) {
        self.closing.store(true, Ordering::Release);
    }

    // ========================================
    // Attribute bag
    // ========================================

    /// Stores a value under `key`, replacing any previous value.
    pub fn set_attribute<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.attributes.insert(key.into(), Arc::new(value));
    }

    /// Fetches the value under `key` if it has type `T`.
    #[must_use]
    pub fn attribute<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = Arc::clone(self.attributes.get(key)?.value());
        value.downcast::<T>().ok()
    }

    /// Removes the value under `key`.
    pub fn remove_attribute(&self, key: &str) -> bool {
        self.attributes.remove(key).is_some()
    }

    // ========================================
    // Statistics
    // ========================================

    pub(crate) fn record_read(&self, bytes: usize) {
        self.bytes_in.fetch_add(bytes as u64, Ordering::Relaxed);
        self.last_activity.touch();
    }

    pub(crate) fn record_message_in(&self) {
        self.messages_in.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, bytes: usize) {
        self.bytes_out.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_out.fetch_add(1, Ordering::Relaxed);
        self.last_activity.touch();
    }

    /// Total bytes read from the peer.
    #[must_use]
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in.load(Ordering::Relaxed)
    }

    /// Total bytes written to the peer.
    #[must_use]
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out.load(Ordering::Relaxed)
    }

    /// Messages decoded from the peer.
    #[must_use]
    pub fn messages_in(&self) -> u64 {
        self.messages_in.load(Ordering::Relaxed)
    }

    /// Messages written to the peer.
    #[must_use]
    pub fn messages_out(&self) -> u64 {
        self.messages_out.load(Ordering::Relaxed)
    }

    /// Time since the connection was accepted.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the last read or write.
    #[must_use]
    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

impl<M> fmt::Debug for IoSession<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoSession")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("secure", &self.secure)
            .field("closing", &self.is_closing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs() -> (SocketAddr, SocketAddr) {
        (
            "127.0.0.1:33100".parse().unwrap(),
            "127.0.0.1:50000".parse().unwrap(),
        )
    }

    #[test]
    fn test_write_then_close_order() {
        let (local, remote) = addrs();
        let (session, mut outbox) = IoSession::<u32>::new(local, remote, false);

        session.write(1).unwrap();
        session.write(2).unwrap();
        session.close();
        session.close();

        assert!(matches!(outbox.try_recv(), Some(Outbound::Message(1))));
        assert!(matches!(outbox.try_recv(), Some(Outbound::Message(2))));
        assert!(matches!(outbox.try_recv(), Some(Outbound::Close)));
        assert!(outbox.try_recv().is_none());
    }

    #[test]
    fn test_write_after_close_fails() {
        let (local, remote) = addrs();
        let (session, _outbox) = IoSession::<u32>::new(local, remote, true);

        session.close();
        assert!(matches!(session.write(1), Err(TransportError::SessionClosed)));
        assert!(session.is_secure());
    }

    #[test]
    fn test_write_after_task_exit_fails() {
        let (local, remote) = addrs();
        let (session, outbox) = IoSession::<u32>::new(local, remote, false);
        drop(outbox);
        assert!(session.write(1).is_err());
    }

    #[test]
    fn test_attribute_bag() {
        let (local, remote) = addrs();
        let (session, _outbox) = IoSession::<u32>::new(local, remote, false);

        session.set_attribute("user", String::from("alice"));
        assert_eq!(session.attribute::<String>("user").as_deref(), Some(&"alice".to_string()));
        assert!(session.attribute::<u32>("user").is_none());
        assert!(session.remove_attribute("user"));
        assert!(session.attribute::<String>("user").is_none());
    }

    #[test]
    fn test_counters() {
        let (local, remote) = addrs();
        let (session, _outbox) = IoSession::<u32>::new(local, remote, false);

        session.record_read(12);
        session.record_message_in();
        session.record_write(20);

        assert_eq!(session.bytes_in(), 12);
        assert_eq!(session.messages_in(), 1);
        assert_eq!(session.bytes_out(), 20);
        assert_eq!(session.messages_out(), 1);
    }
}
