// ============================================
// File: crates/aries-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! ## Creation Reason
//! Session bookkeeping, dispatch and telemetry for the Aries server,
//! separated from sockets and wire formats.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`session`]: `AriesSession` state machine and the `Sessions` registry
//! - [`router`]: packet kind to handler dispatch
//! - [`interceptor`]: isolated session lifecycle observers
//! - [`auth`]: challenge response authentication
//! - [`statistics`]: per-instance hot-path counters
//!
//! ## Service Interactions
//! ```text
//!  message_received ──► dispatch gate ──► PacketRouter ──► handlers
//!         │                                    │
//!         │                      RequestClientSessionResponse
//!         │                                    ▼
//!         │                          SessionAuthenticator
//!         ▼
//!  AriesStatistics ──► StatisticsCollector ──► (digest) ──► aggregator
//!
//!  session_created / session_closed ──► Sessions + InterceptorChain
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Router and interceptor chain are immutable once the server is built
//! - `Sessions` is the only service with a lock on the hot path
//!
//! ## Last Modified
//! v0.1.0 - Initial service layer

pub mod auth;
pub mod interceptor;
pub mod router;
pub mod session;
pub mod statistics;

pub use auth::{authentication_route, SessionAuthenticator, StaticTicketAuthenticator};
pub use interceptor::{InterceptorChain, SessionInterceptor};
pub use router::{HandlerFn, PacketRouter};
pub use session::{AriesSession, SessionInfo, SessionState, Sessions, SESSION_ATTRIBUTE};
pub use statistics::AriesStatistics;
