// ============================================
// File: crates/aries-server/src/hosts/client.rs
// ============================================
//! # HTTP Host Store
//!
//! ## Main Functionality
//! - `POST {url}/hosts/` with a `HostRecord`
//! - `PUT  {url}/hosts/{call_sign}/status/` with a `StatusUpdate`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Any non-2xx answer is an error; response bodies are ignored
//! - The request timeout comes from `[hosts] request_timeout_secs`
//!
//! ## Last Modified
//! v0.1.0 - Initial HTTP host store

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::models::{HostRecord, HostStatus, StatusUpdate};
use super::HostStore;
use crate::error::{Result, ServerError};

/// Host store behind an HTTP API.
pub struct HttpHostStore {
    base_url: String,
    http: Client,
}

impl HttpHostStore {
    /// Creates a client for `base_url`.
    ///
    /// # Errors
    /// `HostStore` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::host_store(format!("failed to create HTTP client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, http })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn check(response: &reqwest::Response, action: &str) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ServerError::host_store(format!("{action}: status {status}")))
        }
    }
}

#[async_trait]
impl HostStore for HttpHostStore {
    async fn create_host(&self, record: &HostRecord) -> Result<()> {
        let url = format!("{}/hosts/", self.base_url);
        info!(call_sign = %record.call_sign, "Registering host");

        let response = self
            .http
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| ServerError::host_store(format!("create host request failed: {e}")))?;
        Self::check(&response, "create host")
    }

    async fn set_status(&self, call_sign: &str, status: HostStatus) -> Result<()> {
        let url = format!("{}/hosts/{call_sign}/status/", self.base_url);
        debug!(call_sign, %status, "Updating host status");

        let response = self
            .http
            .put(&url)
            .json(&StatusUpdate { status })
            .send()
            .await
            .map_err(|e| ServerError::host_store(format!("set status request failed: {e}")))?;
        Self::check(&response, "set status")
    }
}

impl std::fmt::Debug for HttpHostStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHostStore")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// One-shot HTTP server answering every request with `status`.
    async fn serve(status: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let mut request = Vec::new();
                    loop {
                        let n = stream.read(&mut buf).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        request.extend_from_slice(&buf[..n]);
                        if let Some(head_end) = find_head_end(&request) {
                            let body_len = content_length(&request[..head_end]);
                            if request.len() >= head_end + body_len {
                                break;
                            }
                        }
                    }
                    let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
                    let reply = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                    let _ = stream.write_all(reply.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        (format!("http://{addr}"), rx)
    }

    fn find_head_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
    }

    fn content_length(head: &[u8]) -> usize {
        String::from_utf8_lossy(head)
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse().ok())
                    .flatten()
            })
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_create_and_set_status_requests() {
        let (url, mut requests) = serve("200 OK").await;
        let store = HttpHostStore::new(format!("{url}/"), Duration::from_secs(5)).unwrap();
        assert_eq!(store.base_url(), url);

        store
            .create_host(&HostRecord::up("city-1", "203.0.113.7:33100", "10.0.0.7:33100"))
            .await
            .unwrap();
        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("POST /hosts/ HTTP/1.1"));
        assert!(request.contains("\"call_sign\":\"city-1\""));
        assert!(request.contains("\"status\":\"up\""));

        store.set_status("city-1", HostStatus::Down).await.unwrap();
        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("PUT /hosts/city-1/status/ HTTP/1.1"));
        assert!(request.contains("{\"status\":\"down\"}"));
    }

    #[tokio::test]
    async fn test_error_status_is_host_store_error() {
        let (url, _requests) = serve("500 Internal Server Error").await;
        let store = HttpHostStore::new(url, Duration::from_secs(5)).unwrap();

        let err = store.set_status("city-1", HostStatus::Down).await.unwrap_err();
        assert!(matches!(err, ServerError::HostStore { ref reason } if reason.contains("500")));
    }

    #[tokio::test]
    async fn test_unreachable_store() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = HttpHostStore::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        assert!(store.set_status("city-1", HostStatus::Down).await.is_err());
    }
}
