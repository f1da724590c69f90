// ============================================
// File: crates/aries-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for an Aries server instance loaded
//! from a TOML file.
//!
//! ## Main Functionality
//! - `ServerConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Validation: missing identity or binding fields are fatal before any
//!   socket is opened
//!
//! ## Configuration Sections
//! - `server`: identity (call sign, hosts), bindings, handler list
//! - `tls`: certificate and key paths for the secure listener
//! - `limits`: session and frame limits
//! - `statistics`: digest timer, bucket granularity, retention
//! - `hosts`: optional HTTP host store
//! - `auth`: tickets for the bundled authenticator
//! - `logging`: log level
//!
//! ## Example Configuration
//! ```toml
//! [server]
//! call_sign = "city-1"
//! public_host = "203.0.113.7:33100"
//! internal_host = "10.0.0.7:33100"
//! binding = "0.0.0.0:33100"
//! plain_binding = "0.0.0.0:33101"
//! handlers = ["echo"]
//!
//! [tls]
//! cert_path = "/etc/aries/cert.pem"
//! key_path = "/etc/aries/key.pem"
//!
//! [statistics]
//! granularity_secs = 30
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require server restart
//! - Required fields are `Option`s so a missing one reports
//!   `ConfigMissing` with its dotted name instead of a TOML parse error
//! - `plain_binding` is a compatibility shim for clients whose TLS stack
//!   cannot talk to ours; leave it unset where not needed
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use aries_common::stats::{AggregatorConfig, AverageMode};

use crate::error::{Result, ServerError};

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Identity and bindings.
    #[serde(default)]
    pub server: ServerSection,

    /// Certificate for the secure listener.
    #[serde(default)]
    pub tls: TlsConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Statistics pipeline.
    #[serde(default)]
    pub statistics: StatisticsConfig,

    /// Host record store.
    #[serde(default)]
    pub hosts: HostsConfig,

    /// Bundled ticket authenticator.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!(call_sign = %config.call_sign()?, "Configuration loaded successfully");
        Ok(config)
    }

    /// Parses and validates configuration from a string.
    ///
    /// # Errors
    /// Returns error if the content cannot be parsed or validated.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `ConfigMissing` for an absent required field, `ConfigInvalid` for a
    /// value out of range.
    pub fn validate(&self) -> Result<()> {
        self.call_sign()?;
        self.public_host()?;
        self.internal_host()?;
        self.binding()?;
        self.cert_path()?;
        self.key_path()?;

        self.server.validate()?;
        self.limits.validate()?;
        self.statistics.validate()?;
        self.hosts.validate()?;
        Ok(())
    }

    /// Serializes configuration to a TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    // ========================================
    // Required field accessors
    // ========================================

    /// Unique server identity.
    ///
    /// # Errors
    /// `ConfigMissing` if absent or blank.
    pub fn call_sign(&self) -> Result<&str> {
        required_str(self.server.call_sign.as_deref(), "server.call_sign")
    }

    /// Address clients are told to connect to.
    ///
    /// # Errors
    /// `ConfigMissing` if absent or blank.
    pub fn public_host(&self) -> Result<&str> {
        required_str(self.server.public_host.as_deref(), "server.public_host")
    }

    /// Address other cluster services use.
    ///
    /// # Errors
    /// `ConfigMissing` if absent or blank.
    pub fn internal_host(&self) -> Result<&str> {
        required_str(self.server.internal_host.as_deref(), "server.internal_host")
    }

    /// Secure listener address.
    ///
    /// # Errors
    /// `ConfigMissing` if absent.
    pub fn binding(&self) -> Result<SocketAddr> {
        self.server
            .binding
            .ok_or_else(|| ServerError::config_missing("server.binding"))
    }

    /// Certificate chain path.
    ///
    /// # Errors
    /// `ConfigMissing` if absent.
    pub fn cert_path(&self) -> Result<&Path> {
        self.tls
            .cert_path
            .as_deref()
            .ok_or_else(|| ServerError::config_missing("tls.cert_path"))
    }

    /// Private key path.
    ///
    /// # Errors
    /// `ConfigMissing` if absent.
    pub fn key_path(&self) -> Result<&Path> {
        self.tls
            .key_path
            .as_deref()
            .ok_or_else(|| ServerError::config_missing("tls.key_path"))
    }
}

fn required_str<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ServerError::config_missing(field)),
    }
}

// ============================================
// ServerSection
// ============================================

/// Identity, bindings and handler list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    /// Unique server identity used in host records and statistics.
    #[serde(default)]
    pub call_sign: Option<String>,

    /// Address advertised to clients.
    #[serde(default)]
    pub public_host: Option<String>,

    /// Address advertised to cluster services.
    #[serde(default)]
    pub internal_host: Option<String>,

    /// Secure (TLS) listener address.
    #[serde(default)]
    pub binding: Option<SocketAddr>,

    /// Optional plaintext listener address.
    #[serde(default)]
    pub plain_binding: Option<SocketAddr>,

    /// Handler identities resolved through the handler factory.
    #[serde(default)]
    pub handlers: Vec<String>,
}

impl ServerSection {
    fn validate(&self) -> Result<()> {
        if let (Some(secure), Some(plain)) = (self.binding, self.plain_binding) {
            if secure == plain && secure.port() != 0 {
                return Err(ServerError::config_invalid(
                    "server.plain_binding",
                    "must differ from server.binding",
                ));
            }
        }
        if self.handlers.iter().any(|h| h.trim().is_empty()) {
            return Err(ServerError::config_invalid(
                "server.handlers",
                "handler names cannot be empty",
            ));
        }
        Ok(())
    }
}

// ============================================
// TlsConfig
// ============================================

/// Certificate for the secure listener.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM certificate chain.
    #[serde(default)]
    pub cert_path: Option<PathBuf>,

    /// PEM private key (PKCS#8, PKCS#1 or SEC1).
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

// ============================================
// LimitsConfig
// ============================================

/// Resource limits configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Maximum frame payload in bytes.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

fn default_max_sessions() -> usize {
    5000
}

fn default_max_frame_size() -> usize {
    aries_core::protocol::DEFAULT_MAX_FRAME_SIZE
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_sessions == 0 {
            return Err(ServerError::config_invalid(
                "limits.max_sessions",
                "must be greater than 0",
            ));
        }
        if self.max_frame_size == 0 {
            return Err(ServerError::config_invalid(
                "limits.max_frame_size",
                "must be greater than 0",
            ));
        }
        if u32::try_from(self.max_frame_size).is_err() {
            return Err(ServerError::config_invalid(
                "limits.max_frame_size",
                "cannot exceed u32::MAX",
            ));
        }
        Ok(())
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

// ============================================
// StatisticsConfig
// ============================================

/// Statistics pipeline configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Seconds between digest passes.
    #[serde(default = "default_digest_interval_secs")]
    pub digest_interval_secs: u64,

    /// Bucket width in seconds.
    #[serde(default = "default_granularity_secs")]
    pub granularity_secs: u64,

    /// Seconds a bucket is kept.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Facts held per collector before dropping.
    #[serde(default = "default_collector_capacity")]
    pub collector_capacity: usize,

    /// Count-weighted average merge; `false` selects the legacy `(a + b) / 2`.
    #[serde(default = "default_weighted_average")]
    pub weighted_average: bool,
}

fn default_digest_interval_secs() -> u64 {
    10
}

fn default_granularity_secs() -> u64 {
    30
}

fn default_retention_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_collector_capacity() -> usize {
    aries_common::stats::DEFAULT_COLLECTOR_CAPACITY
}

fn default_weighted_average() -> bool {
    true
}

impl StatisticsConfig {
    fn validate(&self) -> Result<()> {
        if self.digest_interval_secs == 0 {
            return Err(ServerError::config_invalid(
                "statistics.digest_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.granularity_secs == 0 {
            return Err(ServerError::config_invalid(
                "statistics.granularity_secs",
                "must be greater than 0",
            ));
        }
        if self.retention_secs < self.granularity_secs {
            return Err(ServerError::config_invalid(
                "statistics.retention_secs",
                "must be at least statistics.granularity_secs",
            ));
        }
        if self.collector_capacity == 0 {
            return Err(ServerError::config_invalid(
                "statistics.collector_capacity",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Converts to the aggregator's configuration.
    #[must_use]
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            granularity: Duration::from_secs(self.granularity_secs),
            retention: Duration::from_secs(self.retention_secs),
            digest_interval: Duration::from_secs(self.digest_interval_secs),
            average_mode: if self.weighted_average {
                AverageMode::Weighted
            } else {
                AverageMode::Unweighted
            },
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            digest_interval_secs: default_digest_interval_secs(),
            granularity_secs: default_granularity_secs(),
            retention_secs: default_retention_secs(),
            collector_capacity: default_collector_capacity(),
            weighted_average: default_weighted_average(),
        }
    }
}

// ============================================
// HostsConfig
// ============================================

/// Host record store configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsConfig {
    /// Base URL of the HTTP host store. Absent selects the in-memory store.
    #[serde(default)]
    pub url: Option<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl HostsConfig {
    fn validate(&self) -> Result<()> {
        if let Some(url) = &self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ServerError::config_invalid(
                    "hosts.url",
                    "must start with http:// or https://",
                ));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(ServerError::config_invalid(
                "hosts.request_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ============================================
// AuthConfig
// ============================================

/// Tickets accepted by the bundled authenticator.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// User name to ticket.
    #[serde(default)]
    pub tickets: HashMap<String, String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("tickets", &self.tickets.len())
            .finish()
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
