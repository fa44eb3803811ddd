//! Scoped listener registry for push notifications.
//!
//! Listeners subscribe to an exact `(device, route, kind)` scope. Publishing
//! looks up that scope only, so a listener never sees another device's or
//! another route's events. Listeners run synchronously on the read loop, in
//! arrival order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::notification::{EventKind, ResourceEvent};
use crate::resource::RoutePath;

/// Callback invoked for each matching event.
pub type Listener = Arc<dyn Fn(&ResourceEvent) + Send + Sync>;

/// Exact match key for a listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventScope {
    /// Device id.
    pub device_id: String,
    /// Resource address.
    pub route: RoutePath,
    /// Update or execute.
    pub kind: EventKind,
}

impl EventScope {
    /// Create a scope.
    pub fn new(device_id: impl Into<String>, route: RoutePath, kind: EventKind) -> Self {
        Self {
            device_id: device_id.into(),
            route,
            kind,
        }
    }

    fn of(event: &ResourceEvent) -> Self {
        Self::new(event.device_id.clone(), event.route, event.kind)
    }
}

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    scope: EventScope,
    id: u64,
}

impl Subscription {
    /// Scope this subscription listens on.
    pub fn scope(&self) -> &EventScope {
        &self.scope
    }
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<EventScope, Vec<(u64, Listener)>>>,
}

/// Event bus shared by a session and the devices it creates.
///
/// Cheap to clone; clones share listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events matching `scope` exactly.
    pub fn subscribe<F>(&self, scope: EventScope, listener: F) -> Subscription
    where
        F: Fn(&ResourceEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .write()
            .entry(scope.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        Subscription { scope, id }
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut listeners = self.inner.listeners.write();
        let Some(entries) = listeners.get_mut(&subscription.scope) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != subscription.id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&subscription.scope);
        }
        removed
    }

    /// Deliver `event` to every listener on its scope.
    ///
    /// Listeners are called outside the lock, so they may subscribe or
    /// unsubscribe. Returns the number of listeners invoked.
    pub fn publish(&self, event: &ResourceEvent) -> usize {
        let matching: Vec<Listener> = match self.inner.listeners.read().get(&EventScope::of(event)) {
            Some(entries) => entries.iter().map(|(_, l)| l.clone()).collect(),
            None => return 0,
        };
        for listener in &matching {
            listener(event);
        }
        matching.len()
    }

    /// Total number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
