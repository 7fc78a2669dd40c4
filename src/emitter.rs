//! Event emitter: the notification channel back to the host
//!
//! Handlers are keyed by event name and removed by identity (`Arc` pointer).
//! Delivery is in emission order, to the subscribers registered at the time
//! of emission; there is no buffering or replay for late subscribers.

use crate::types::BridgeEvent;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Callback invoked for each delivered event
pub type EventHandler = Arc<dyn Fn(&BridgeEvent) + Send + Sync>;

/// Name-keyed, fire-and-forget event channel
#[derive(Default)]
pub struct EventEmitter {
    /// event name → handlers, in subscription order
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<EventHandler>>> {
        self.handlers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<EventHandler>>> {
        self.handlers.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `handler` for events named `name`
    pub fn subscribe(&self, name: &str, handler: EventHandler) {
        self.write().entry(name.to_string()).or_default().push(handler);
        tracing::debug!(event = %name, "Event handler subscribed");
    }

    /// Remove `handler` from `name`; returns whether it was registered
    pub fn unsubscribe(&self, name: &str, handler: &EventHandler) -> bool {
        let mut handlers = self.write();
        let Some(list) = handlers.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| !Arc::ptr_eq(h, handler));
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(name);
        }
        if removed {
            tracing::debug!(event = %name, "Event handler unsubscribed");
        }
        removed
    }

    /// Receive events named `name` as an async stream
    ///
    /// Dropping the stream leaves its handler registered; pass the returned
    /// handler to `unsubscribe` to remove it. The stream ends once the
    /// handler is unsubscribed and the returned copy dropped.
    pub fn stream(&self, name: &str) -> (EventHandler, UnboundedReceiverStream<BridgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: EventHandler = Arc::new(move |event: &BridgeEvent| {
            let _ = tx.send(event.clone());
        });
        self.subscribe(name, handler.clone());
        (handler, UnboundedReceiverStream::new(rx))
    }

    /// Number of handlers registered for `name`
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.read().get(name).map(Vec::len).unwrap_or(0)
    }

    /// Deliver `event` to every handler currently registered for its name
    ///
    /// Returns the number of handlers reached. Handlers run outside the
    /// registry lock, so they may subscribe or unsubscribe freely.
    pub fn emit(&self, event: BridgeEvent) -> usize {
        let snapshot: Vec<EventHandler> = self.read().get(&event.name).cloned().unwrap_or_default();

        tracing::info!(
            event = %event.name,
            event_id = %event.id,
            subscribers = snapshot.len(),
            "Event emitted"
        );

        for handler in &snapshot {
            handler(&event);
        }
        snapshot.len()
    }
}
