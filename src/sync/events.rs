//! Sync lifecycle event broadcast.
//!
//! Three named events (`sync:start`, `sync:finish`, `sync:error`) modeled as
//! a single tagged [`SyncEvent`] distributed to subscribers. No async
//! runtime is in the dependency graph, so this is a hand-rolled broadcast
//! list guarded by a mutex rather than `tokio::sync::broadcast`.

use std::sync::{Arc, Mutex};

/// Which lifecycle transition fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncEventKind {
    Start,
    Finish,
    Error,
}

/// The payload carried by every sync lifecycle event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncEvent {
    pub kind: SyncEventKind,
    pub at: i64,
    pub reason: String,
    pub status: SyncStatus,
}

/// The coordinator's state at the moment the event was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    Syncing,
    Idle,
    Error,
}

type Handler = Box<dyn Fn(&SyncEvent) + Send>;

/// A broadcast list of sync lifecycle subscribers.
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<Vec<(usize, Handler)>>,
    next_token: Mutex<usize>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, returning an [`Unsubscribe`] that removes it
    /// when called (or dropped).
    pub fn subscribe(self: &Arc<Self>, handler: impl Fn(&SyncEvent) + Send + 'static) -> Unsubscribe {
        let token = {
            let mut next = self.next_token.lock().expect("event bus lock poisoned");
            let token = *next;
            *next += 1;
            token
        };
        self.handlers
            .lock()
            .expect("event bus lock poisoned")
            .push((token, Box::new(handler)));
        Unsubscribe { bus: Arc::clone(self), token }
    }

    /// Notify every live subscriber, in subscription order.
    pub fn emit(&self, event: &SyncEvent) {
        let guard = self.handlers.lock().expect("event bus lock poisoned");
        for (_, handler) in guard.iter() {
            handler(event);
        }
    }

    fn unsubscribe(&self, token: usize) {
        self.handlers
            .lock()
            .expect("event bus lock poisoned")
            .retain(|(t, _)| *t != token);
    }
}

/// A handle returned by [`EventBus::subscribe`]. Dropping it unsubscribes.
pub struct Unsubscribe {
    bus: Arc<EventBus>,
    token: usize,
}

impl Unsubscribe {
    /// Explicitly unsubscribe (equivalent to dropping this handle).
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.token);
    }
}
