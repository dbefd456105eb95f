//! Message handler registry and settlement callback.
//!
//! Handlers are appended and never removed. Every inbound custom message is
//! handed to each of them in registration order. A failing or panicking
//! handler is logged and skipped over.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::metrics::LndMetrics;
use crate::primitives::{InboundMessage, NodeId};

/// Receives custom messages from peers.
///
/// Implemented for every `Fn(&NodeId, &str, &[u8]) -> eyre::Result<()>`, so
/// plain closures can be registered directly.
pub trait MessageHandler: Send + Sync {
    /// Handles one message. `msg_type` is the hex tag of the type code.
    fn handle(&self, peer: &NodeId, msg_type: &str, payload: &[u8]) -> eyre::Result<()>;
}

impl<F> MessageHandler for F
where
    F: Fn(&NodeId, &str, &[u8]) -> eyre::Result<()> + Send + Sync,
{
    fn handle(&self, peer: &NodeId, msg_type: &str, payload: &[u8]) -> eyre::Result<()> {
        self(peer, msg_type, payload)
    }
}

/// Invoked with the memo of every settled invoice.
pub type PaymentCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    handlers: RwLock<Vec<Arc<dyn MessageHandler>>>,
    payment_callback: RwLock<Option<PaymentCallback>>,
}

/// Shared, cloneable handle to the handler list and the payment callback.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
    metrics: LndMetrics,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a closure handler.
    pub fn register_message_handler<F>(&self, handler: F)
    where
        F: Fn(&NodeId, &str, &[u8]) -> eyre::Result<()> + Send + Sync + 'static,
    {
        self.register_handler(handler);
    }

    /// Appends a handler. The same handler may be registered more than once.
    pub fn register_handler<H: MessageHandler + 'static>(&self, handler: H) {
        self.register_shared_handler(Arc::new(handler));
    }

    /// Appends a handler that is shared with other owners.
    pub fn register_shared_handler(&self, handler: Arc<dyn MessageHandler>) {
        let mut handlers = self.inner.handlers.write();
        handlers.push(handler);
        debug!(handlers = handlers.len(), "registered message handler");
    }

    /// Sets the settlement callback, replacing any previous one.
    pub fn register_payment_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.inner.payment_callback.write() = Some(Arc::new(callback));
    }

    pub fn payment_callback(&self) -> Option<PaymentCallback> {
        self.inner.payment_callback.read().clone()
    }

    pub fn handler_count(&self) -> usize {
        self.inner.handlers.read().len()
    }

    /// Hands `msg` to every handler in registration order.
    ///
    /// Runs over a snapshot of the list, so handlers may register further
    /// handlers; those see the next message. Returns the number of handlers
    /// that failed.
    pub fn dispatch(&self, msg: &InboundMessage) -> usize {
        let handlers = self.inner.handlers.read().clone();

        let mut failures = 0;
        for (index, handler) in handlers.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                handler.handle(&msg.peer, &msg.msg_type, &msg.payload)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failures += 1;
                    warn!(
                        handler = index,
                        peer = %msg.peer,
                        msg_type = %msg.msg_type,
                        "message handler failed: {err:#}"
                    );
                }
                Err(panic) => {
                    failures += 1;
                    warn!(
                        handler = index,
                        peer = %msg.peer,
                        msg_type = %msg.msg_type,
                        "message handler panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        if failures > 0 {
            self.metrics.inc_handler_failures(failures);
        }
        failures
    }

    /// Invokes the settlement callback with `memo`.
    ///
    /// Returns `false` when no callback is registered or the callback panicked.
    pub fn notify_settled(&self, memo: &str) -> bool {
        let Some(callback) = self.payment_callback() else {
            debug!(memo, "no payment callback registered, dropping settlement");
            return false;
        };
        match catch_unwind(AssertUnwindSafe(|| callback(memo))) {
            Ok(()) => true,
            Err(panic) => {
                warn!(memo, "payment callback panicked: {}", panic_message(panic.as_ref()));
                false
            }
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.handler_count())
            .field(
                "payment_callback",
                &self.inner.payment_callback.read().is_some(),
            )
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use parking_lot::Mutex;

    use super::*;
    use crate::primitives::MessageType;

    const PEER: &str = "02eec7245d6b7d2ccb30380bfbe2a3648cd7a942653f5aa340edcea1f283686619";

    fn message() -> InboundMessage {
        InboundMessage::new(PEER.parse().unwrap(), MessageType::new(42069), vec![0xde, 0xad])
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> impl MessageHandler + 'static {
        let log = log.clone();
        move |_: &NodeId, msg_type: &str, _: &[u8]| -> eyre::Result<()> {
            log.lock().push(format!("{name}:{msg_type}"));
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = Registry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register_handler(recorder(&log, "a"));
        registry.register_handler(recorder(&log, "b"));
        registry.register_handler(recorder(&log, "c"));

        assert_eq!(registry.dispatch(&message()), 0);
        assert_eq!(*log.lock(), vec!["a:a455", "b:a455", "c:a455"]);
    }

    #[test]
    fn test_handlers_receive_message_fields() {
        let registry = Registry::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        registry.register_message_handler(move |peer, msg_type, payload| {
            *sink.lock() = Some((peer.to_string(), msg_type.to_string(), payload.to_vec()));
            Ok(())
        });

        registry.dispatch(&message());
        assert_eq!(
            seen.lock().clone(),
            Some((PEER.to_string(), "a455".to_string(), vec![0xde, 0xad]))
        );
    }

    #[test]
    fn test_failures_do_not_stop_later_handlers() {
        let registry = Registry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register_handler(recorder(&log, "first"));
        registry.register_message_handler(|_, _, _| Err(eyre::eyre!("unknown message")));
        registry.register_message_handler(|_, _, _| panic!("handler bug"));
        registry.register_handler(recorder(&log, "last"));

        assert_eq!(registry.dispatch(&message()), 2);
        assert_eq!(*log.lock(), vec!["first:a455", "last:a455"]);
    }

    #[test]
    fn test_duplicate_registration_invokes_twice() {
        let registry = Registry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<dyn MessageHandler> = Arc::new(recorder(&log, "dup"));
        registry.register_shared_handler(handler.clone());
        registry.register_shared_handler(handler);

        registry.dispatch(&message());
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_handler_registered_during_dispatch_sees_next_message() {
        let registry = Registry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_registry = registry.clone();
        let inner_log = log.clone();
        let registered = Arc::new(Mutex::new(false));
        registry.register_message_handler(move |_, _, _| {
            let mut registered = registered.lock();
            if !*registered {
                *registered = true;
                inner_registry.register_handler(recorder(&inner_log, "late"));
            }
            Ok(())
        });

        registry.dispatch(&message());
        assert!(log.lock().is_empty());
        assert_eq!(registry.handler_count(), 2);

        registry.dispatch(&message());
        assert_eq!(*log.lock(), vec!["late:a455"]);
    }

    #[test]
    fn test_concurrent_registration_and_dispatch() {
        let registry = Registry::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        registry.register_message_handler(|_, _, _| Ok(()));
                        registry.dispatch(&message());
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(registry.handler_count(), 400);
    }

    #[test]
    fn test_payment_callback_last_writer_wins() {
        let registry = Registry::new();
        assert!(!registry.notify_settled("swap-1"));

        let log = Arc::new(Mutex::new(Vec::new()));
        let first = log.clone();
        registry.register_payment_callback(move |memo| first.lock().push(format!("first:{memo}")));
        let second = log.clone();
        registry.register_payment_callback(move |memo| second.lock().push(format!("second:{memo}")));

        assert!(registry.notify_settled("swap-42"));
        assert_eq!(*log.lock(), vec!["second:swap-42"]);
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let registry = Registry::new();
        registry.register_payment_callback(|_| panic!("callback bug"));
        assert!(!registry.notify_settled("swap-1"));
    }
}
