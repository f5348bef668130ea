//! In-process `consentUpdated` notifications.
//!
//! Synchronous fan-out to any number of listeners. A payload of `Some(record)`
//! means the visitor made a choice; `None` means consent was reset and should
//! be asked for again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::record::ConsentRecord;

/// Event name used wherever the notification crosses into another layer.
pub const CONSENT_UPDATED: &str = "consentUpdated";

/// Handle returned by [`ConsentEvents::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Listener = Arc<dyn Fn(Option<&ConsentRecord>) + Send + Sync>;

#[derive(Default)]
struct Registry {
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

/// Cloneable handle to a shared listener registry.
#[derive(Clone, Default)]
pub struct ConsentEvents {
    registry: Arc<Registry>,
}

impl ConsentEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(Option<&ConsentRecord>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(listener);
        self.registry.listeners.write().push((id, listener));
        debug!("{} listener {} registered", CONSENT_UPDATED, id);
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.registry.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() < before
    }

    /// Deliver a change to every listener, in registration order.
    /// Returns how many listeners were called.
    pub fn publish(&self, payload: Option<&ConsentRecord>) -> usize {
        // Snapshot so listeners may (un)subscribe while being called.
        let listeners: Vec<Listener> = self
            .registry
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(payload);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.listeners.read().len()
    }
}
