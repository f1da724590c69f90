// ============================================
// File: crates/aries-server/src/handlers/mod.rs
// ============================================
//! # Packet Handlers
//!
//! ## Creation Reason
//! Business logic lives in handler instances that the server does not know
//! at compile time. Configuration names them; the `HandlerFactory` turns
//! names into instances.
//!
//! ## Main Functionality
//! - `HandlerInstance`: declares routes and, optionally, an interceptor
//! - `HandlerContext`: what a handler may hold on to
//! - `HandlerFactory`: handler name to constructor
//!
//! ### Submodules
//! - [`echo`]: smoke-test handler, echoes Voltron `0x0001`
//!
//! ## Handler Resolution
//! ```text
//! [server] handlers = ["echo", ...]
//!          │
//!          ▼
//!   HandlerFactory::resolve(name, &ctx)
//!          │
//!          ├──► routes()       ──► PacketRouter
//!          └──► interceptor()  ──► InterceptorChain (if Some)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - An unknown name is a configuration error at build time, not a
//!   runtime surprise
//! - Handlers run on transport tasks; never block inside them
//!
//! ## Last Modified
//! v0.1.0 - Initial handler factory

pub mod echo;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use aries_common::stats::StatisticsAggregator;
use aries_core::PacketKind;

use crate::error::{Result, ServerError};
use crate::services::{HandlerFn, SessionInterceptor, Sessions};

pub use echo::{EchoHandler, ECHO_PACKET_TYPE};

// ============================================
// HandlerInstance
// ============================================

/// A group of packet handlers sharing state.
pub trait HandlerInstance: Send + Sync + 'static {
    /// Name used in logs and route listings.
    fn name(&self) -> &str;

    /// Routes this instance serves.
    fn routes(self: Arc<Self>) -> Vec<(PacketKind, HandlerFn)>;

    /// Lifecycle hooks, if this instance wants them.
    fn interceptor(self: Arc<Self>) -> Option<Arc<dyn SessionInterceptor>> {
        None
    }
}

// ============================================
// HandlerContext
// ============================================

/// Server services handed to handler constructors.
#[derive(Clone)]
pub struct HandlerContext {
    /// Server call sign.
    pub call_sign: String,
    /// Live session registry.
    pub sessions: Arc<Sessions>,
    /// Server-owned statistics aggregator.
    pub aggregator: Arc<StatisticsAggregator>,
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("call_sign", &self.call_sign)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

// ============================================
// HandlerFactory
// ============================================

type Constructor = Box<dyn Fn(&HandlerContext) -> Result<Arc<dyn HandlerInstance>> + Send + Sync>;

/// Handler name to constructor.
pub struct HandlerFactory {
    constructors: HashMap<String, Constructor>,
}

impl HandlerFactory {
    /// Empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Factory knowing the bundled handlers.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register(echo::NAME, |ctx| {
            let handler: Arc<dyn HandlerInstance> = Arc::new(EchoHandler::new(&ctx.call_sign));
            Ok(handler)
        });
        factory
    }

    /// Registers a constructor under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&HandlerContext) -> Result<Arc<dyn HandlerInstance>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// Builds the handler called `name`.
    ///
    /// # Errors
    /// `UnknownHandler` if nothing is registered under `name`, or whatever
    /// the constructor returns.
    pub fn resolve(&self, name: &str, ctx: &HandlerContext) -> Result<Arc<dyn HandlerInstance>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ServerError::UnknownHandler {
                name: name.to_string(),
            })?;
        constructor(ctx)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for HandlerFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for HandlerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFactory")
            .field("handlers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> HandlerContext {
        HandlerContext {
            call_sign: "city-1".to_string(),
            sessions: Arc::new(Sessions::new()),
            aggregator: Arc::new(StatisticsAggregator::default()),
        }
    }

    #[test]
    fn test_defaults_include_echo() {
        let factory = HandlerFactory::with_defaults();
        assert_eq!(factory.names(), vec!["echo"]);

        let echo = factory.resolve("echo", &ctx()).unwrap();
        assert_eq!(echo.name(), "echo");
        assert_eq!(echo.routes().len(), 1);
    }

    #[test]
    fn test_unknown_handler() {
        let factory = HandlerFactory::new();
        let err = factory.resolve("lobby", &ctx()).err().unwrap();
        assert!(matches!(err, ServerError::UnknownHandler { ref name } if name == "lobby"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_constructor_error_propagates() {
        let mut factory = HandlerFactory::new();
        factory.register("broken", |_| Err(ServerError::internal("no database")));
        assert!(matches!(
            factory.resolve("broken", &ctx()),
            Err(ServerError::Internal { .. })
        ));
    }

    #[test]
    fn test_constructor_sees_context() {
        let mut factory = HandlerFactory::new();
        factory.register("named", |ctx| {
            let handler: Arc<dyn HandlerInstance> = Arc::new(EchoHandler::new(&ctx.call_sign));
            Ok(handler)
        });
        assert!(factory.contains("named"));
        assert!(factory.resolve("named", &ctx()).is_ok());
    }
}
