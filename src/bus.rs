//! Verb-keyed event bus.
//!
//! One bus per link session. Handlers are registered while the session is
//! being set up, then the bus is frozen behind an `Arc` and handed to the
//! read loop. There is no unsubscribe: a reconnect builds a new bus, so
//! handlers from an earlier connection can never fire again.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qserv_proto::Message;
use tracing::{debug, warn};

use crate::error::HandlerError;

/// Subscription key matching every verb.
pub const WILDCARD: &str = "*";

/// A handler for dispatched protocol messages.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, msg: &Message) -> Result<(), HandlerError>;
}

/// Verb → handlers registry.
#[derive(Default)]
pub struct EventBus {
    exact: HashMap<String, Vec<Arc<dyn Handler>>>,
    wildcard: Vec<Arc<dyn Handler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `verb` (case-insensitive) or [`WILDCARD`].
    pub fn subscribe(&mut self, verb: &str, handler: Arc<dyn Handler>) {
        if verb == WILDCARD {
            self.wildcard.push(handler);
        } else {
            self.exact
                .entry(verb.to_ascii_uppercase())
                .or_default()
                .push(handler);
        }
    }

    /// Register one handler for several verbs.
    pub fn subscribe_all(&mut self, verbs: &[&str], handler: Arc<dyn Handler>) {
        for verb in verbs {
            self.subscribe(verb, Arc::clone(&handler));
        }
    }

    /// Number of handlers that would run for `verb`.
    pub fn handler_count(&self, verb: &str) -> usize {
        self.exact
            .get(&verb.to_ascii_uppercase())
            .map_or(0, Vec::len)
            + self.wildcard.len()
    }

    /// Dispatch `msg` to its exact-verb handlers, then to wildcard handlers,
    /// each group in registration order.
    ///
    /// Each handler runs in its own task and is awaited before the next
    /// starts. An error or panic in one handler is logged and does not stop
    /// the others. Messages with an empty verb are ignored. Returns the
    /// number of handlers invoked.
    pub async fn publish(&self, msg: Arc<Message>) -> usize {
        if msg.verb.is_empty() {
            return 0;
        }

        let verb = msg.verb_upper();
        let exact = self.exact.get(&verb).map(Vec::as_slice).unwrap_or_default();
        let mut invoked = 0;

        for handler in exact.iter().chain(self.wildcard.iter()) {
            invoked += 1;
            let handler = Arc::clone(handler);
            let name = handler.name();
            let msg = Arc::clone(&msg);
            let outcome = tokio::spawn(async move { handler.handle(&msg).await }).await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(handler = name, verb = %verb, code = e.error_code(), error = %e, "Handler failed");
                }
                Err(join_err) => {
                    warn!(handler = name, verb = %verb, error = %join_err, "Handler panicked");
                }
            }
        }

        if invoked == 0 {
            debug!(verb = %verb, "No handler for verb");
        }
        invoked
    }
}
