// ============================================
// File: crates/aries-server/src/services/interceptor.rs
// ============================================
//! # Session Interceptor Chain
//!
//! ## Creation Reason
//! Plugins need to know when sessions come and go (presence lists, lobby
//! bookkeeping) without being part of message dispatch.
//!
//! ## Main Functionality
//! - `SessionInterceptor`: created/closed hooks
//! - `InterceptorChain`: ordered list, each call isolated from the others
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every interceptor call is wrapped on its own. An `Err` or a panic is
//!   logged and the next interceptor still runs
//! - Registration order is notification order
//! - The chain is frozen once the server is built
//!
//! ## Last Modified
//! v0.1.0 - Initial interceptor chain

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::error::Result;
use crate::services::session::AriesSession;

/// Lifecycle observer.
pub trait SessionInterceptor: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// A session was registered.
    ///
    /// # Errors
    /// Errors are logged; they do not affect the session or other
    /// interceptors.
    fn session_created(&self, session: &Arc<AriesSession>) -> Result<()>;

    /// A session was removed from the registry.
    ///
    /// # Errors
    /// Errors are logged; they do not affect the session or other
    /// interceptors.
    fn session_closed(&self, session: &Arc<AriesSession>) -> Result<()>;
}

/// Ordered interceptor list.
#[derive(Default, Clone)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn SessionInterceptor>>,
}

impl InterceptorChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interceptor.
    pub fn add(&mut self, interceptor: Arc<dyn SessionInterceptor>) {
        self.interceptors.push(interceptor);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Calls `session_created` on every interceptor. Returns the number
    /// that failed.
    pub fn notify_created(&self, session: &Arc<AriesSession>) -> usize {
        self.notify(session, "session_created", |i, s| i.session_created(s))
    }

    /// Calls `session_closed` on every interceptor. Returns the number
    /// that failed.
    pub fn notify_closed(&self, session: &Arc<AriesSession>) -> usize {
        self.notify(session, "session_closed", |i, s| i.session_closed(s))
    }

    fn notify<F>(&self, session: &Arc<AriesSession>, hook: &str, call: F) -> usize
    where
        F: Fn(&dyn SessionInterceptor, &Arc<AriesSession>) -> Result<()>,
    {
        let mut failures = 0;
        for interceptor in &self.interceptors {
            let outcome = catch_unwind(AssertUnwindSafe(|| call(interceptor.as_ref(), session)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    error!(
                        session_id = %session.id(),
                        interceptor = interceptor.name(),
                        hook,
                        error = %e,
                        "Interceptor failed"
                    );
                }
                Err(panic) => {
                    failures += 1;
                    error!(
                        session_id = %session.id(),
                        interceptor = interceptor.name(),
                        hook,
                        panic = panic_message(panic.as_ref()),
                        "Interceptor panicked"
                    );
                }
            }
        }
        failures
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.interceptors.iter().map(|i| i.name()))
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::error::ServerError;
    use crate::services::session::tests::test_session;

    enum Behaviour {
        Ok,
        Fail,
        Panic,
    }

    struct Recorder {
        name: &'static str,
        behaviour: Behaviour,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn run(&self, hook: &str) -> Result<()> {
            self.log.lock().push(format!("{}:{hook}", self.name));
            match self.behaviour {
                Behaviour::Ok => Ok(()),
                Behaviour::Fail => Err(ServerError::internal("interceptor failure")),
                Behaviour::Panic => panic!("interceptor panic"),
            }
        }
    }

    impl SessionInterceptor for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn session_created(&self, _session: &Arc<AriesSession>) -> Result<()> {
            self.run("created")
        }

        fn session_closed(&self, _session: &Arc<AriesSession>) -> Result<()> {
            self.run("closed")
        }
    }

    fn chain(behaviours: Vec<(&'static str, Behaviour)>) -> (InterceptorChain, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        for (name, behaviour) in behaviours {
            chain.add(Arc::new(Recorder {
                name,
                behaviour,
                log: Arc::clone(&log),
            }));
        }
        (chain, log)
    }

    #[test]
    fn test_notifies_in_registration_order() {
        let (chain, log) = chain(vec![("a", Behaviour::Ok), ("b", Behaviour::Ok)]);
        let (session, _outbox) = test_session();

        assert_eq!(chain.notify_created(&session), 0);
        assert_eq!(chain.notify_closed(&session), 0);
        assert_eq!(*log.lock(), vec!["a:created", "b:created", "a:closed", "b:closed"]);
    }

    #[test]
    fn test_error_does_not_stop_siblings() {
        let (chain, log) = chain(vec![("bad", Behaviour::Fail), ("good", Behaviour::Ok)]);
        let (session, _outbox) = test_session();

        assert_eq!(chain.notify_closed(&session), 1);
        assert_eq!(*log.lock(), vec!["bad:closed", "good:closed"]);
    }

    #[test]
    fn test_panic_does_not_stop_siblings() {
        let (chain, log) = chain(vec![
            ("first", Behaviour::Ok),
            ("panics", Behaviour::Panic),
            ("last", Behaviour::Ok),
        ]);
        let (session, _outbox) = test_session();

        assert_eq!(chain.notify_closed(&session), 1);
        assert_eq!(*log.lock(), vec!["first:closed", "panics:closed", "last:closed"]);
    }

    #[test]
    fn test_debug_lists_names() {
        let (chain, _log) = chain(vec![("presence", Behaviour::Ok)]);
        assert_eq!(format!("{chain:?}"), "[\"presence\"]");
        assert_eq!(chain.len(), 1);
    }
}
