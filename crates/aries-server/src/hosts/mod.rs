// ============================================
// File: crates/aries-server/src/hosts/mod.rs
// ============================================
//! # Host Record Store
//!
//! ## Creation Reason
//! Cluster services find live servers through host records. The server
//! writes its record "up" before it binds and flips it "down" on shutdown;
//! everything else about the store is someone else's business.
//!
//! ## Main Functionality
//! - `HostStore`: the two writes the server issues
//! - `MemoryHostStore`: in-process store, default when no URL is set
//! - [`client`]: `HttpHostStore`, JSON over HTTP
//! - [`models`]: request and record types
//!
//! ## ⚠️ Important Note for Next Developer
//! - A failed "up" write keeps the server from serving
//! - A failed "down" write is swallowed; shutdown never waits on it
//!
//! ## Last Modified
//! v0.1.0 - Initial host store

pub mod client;
pub mod models;

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, ServerError};

pub use client::HttpHostStore;
pub use models::{HostRecord, HostStatus, StatusUpdate};

/// Persistence of host liveness.
#[async_trait]
pub trait HostStore: Send + Sync + 'static {
    /// Creates or replaces the record for `record.call_sign`.
    ///
    /// # Errors
    /// `HostStore` if the write fails.
    async fn create_host(&self, record: &HostRecord) -> Result<()>;

    /// Changes the status of an existing record.
    ///
    /// # Errors
    /// `HostStore` if the write fails or the host is unknown.
    async fn set_status(&self, call_sign: &str, status: HostStatus) -> Result<()>;
}

/// Host records kept in memory.
#[derive(Debug, Default)]
pub struct MemoryHostStore {
    hosts: Mutex<HashMap<String, HostRecord>>,
}

impl MemoryHostStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record for `call_sign`.
    #[must_use]
    pub fn get(&self, call_sign: &str) -> Option<HostRecord> {
        self.hosts.lock().get(call_sign).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.lock().is_empty()
    }
}

#[async_trait]
impl HostStore for MemoryHostStore {
    async fn create_host(&self, record: &HostRecord) -> Result<()> {
        debug!(call_sign = %record.call_sign, status = %record.status, "Host record created");
        self.hosts
            .lock()
            .insert(record.call_sign.clone(), record.clone());
        Ok(())
    }

    async fn set_status(&self, call_sign: &str, status: HostStatus) -> Result<()> {
        let mut hosts = self.hosts.lock();
        let record = hosts
            .get_mut(call_sign)
            .ok_or_else(|| ServerError::host_store(format!("unknown host '{call_sign}'")))?;
        record.status = status;
        debug!(call_sign, %status, "Host status updated");
        Ok(())
    }
}
