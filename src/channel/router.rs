//! Dispatch Router
//!
//! Maps a decoded [`Event`] to at most one store action. The handler table
//! is open: new kinds can be registered without touching the connection
//! manager. Kinds without a handler are dropped silently so that the client
//! keeps working when the server starts sending events it does not know yet.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::messages::{Event, NEW_CONTENT};
use crate::store::StreamStore;

/// A store action invoked for one event kind
pub type Handler = Box<dyn Fn(&dyn StreamStore, &Event) + Send + Sync>;

/// Outcome of routing one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler ran for the event
    Handled,
    /// No handler is registered for the event kind
    Unrecognized,
}

/// Routes events to store actions
pub struct Router {
    store: Arc<dyn StreamStore>,
    handlers: HashMap<String, Handler>,
}

impl Router {
    /// Create a router with the base protocol handlers registered
    pub fn new(store: Arc<dyn StreamStore>) -> Self {
        let mut router = Self::empty(store);
        router.register(NEW_CONTENT, |store, event| {
            if let Some(content_id) = event.content_id.as_deref() {
                store.received_new_content(content_id);
            }
        });
        router
    }

    /// Create a router with an empty handler table
    pub fn empty(store: Arc<dyn StreamStore>) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register (or replace) the handler for an event kind
    pub fn register<F>(&mut self, kind: &str, handler: F)
    where
        F: Fn(&dyn StreamStore, &Event) + Send + Sync + 'static,
    {
        self.handlers.insert(kind.to_string(), Box::new(handler));
    }

    /// Whether a handler exists for the kind
    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Route one event
    pub fn route(&self, event: &Event) -> Dispatch {
        match self.handlers.get(&event.kind) {
            Some(handler) => {
                handler(self.store.as_ref(), event);
                Dispatch::Handled
            }
            None => {
                tracing::debug!(kind = %event.kind, "Ignoring unrecognized event kind");
                Dispatch::Unrecognized
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("Router").field("kinds", &kinds).finish()
    }
}
