//! In-process event bus
//!
//! Listeners are async callbacks keyed by event type. `fire` snapshots the
//! listeners and spawns one task per listener, so delivery is asynchronous
//! and a slow listener never blocks the caller or its siblings.
//!
//! `listen` hands back a [`Subscription`]. The listener stays registered as
//! long as the subscription is alive; dropping it or calling
//! [`Subscription::unsubscribe`] removes the listener.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, trace};

/// Fired when the hub starts shutting down
pub const EVENT_HUB_STOP: &str = "hub_stop";
/// Fired whenever any entity state changes
pub const EVENT_STATE_CHANGED: &str = "state_changed";
/// Fired by the device registry on create, update and remove
pub const EVENT_DEVICE_REGISTRY_UPDATED: &str = "device_registry_updated";
/// Fired by the area registry on create and remove
pub const EVENT_AREA_REGISTRY_UPDATED: &str = "area_registry_updated";
/// Fired by the issue registry on create, update and remove
pub const EVENT_ISSUE_REGISTRY_UPDATED: &str = "issue_registry_updated";

/// An event delivered on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub data: Value,
    pub time_fired: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            time_fired: Utc::now(),
        }
    }
}

type EventCallback = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct BusInner {
    listeners: RwLock<HashMap<String, Vec<(u64, EventCallback)>>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, event_type: &str, id: u64) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = listeners.get_mut(event_type) {
            entries.retain(|(listener_id, _)| *listener_id != id);
            if entries.is_empty() {
                listeners.remove(event_type);
            }
        }
    }
}

/// Event bus shared by the hub and every plugin
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `event_type`.
    pub fn listen<F, Fut>(&self, event_type: &str, callback: F) -> Subscription
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: EventCallback = Arc::new(move |event| Box::pin(callback(event)));

        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_type.to_string())
            .or_default()
            .push((id, callback));

        debug!("Listening to '{}' (listener {})", event_type, id);
        Subscription {
            bus: Arc::downgrade(&self.inner),
            event_type: event_type.to_string(),
            id,
            active: true,
        }
    }

    /// Deliver an event to every current listener of its type.
    ///
    /// Must be called from within a Tokio runtime. Returns the number of
    /// listeners the event was dispatched to.
    pub fn fire(&self, event_type: &str, data: Value) -> usize {
        let callbacks: Vec<EventCallback> = {
            let listeners = self
                .inner
                .listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            listeners
                .get(event_type)
                .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default()
        };

        trace!("Firing '{}' to {} listeners", event_type, callbacks.len());
        let event = Event::new(event_type, data);
        for callback in &callbacks {
            tokio::spawn(callback(event.clone()));
        }
        callbacks.len()
    }

    /// Number of listeners currently registered for `event_type`
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .map_or(0, Vec::len)
    }
}

/// Handle to a registered listener; removes it when released
#[must_use = "dropping a Subscription immediately removes the listener"]
pub struct Subscription {
    bus: Weak<BusInner>,
    event_type: String,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Remove the listener. Equivalent to dropping the subscription.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(&self.event_type, self.id);
            debug!("Stopped listening to '{}' (listener {})", self.event_type, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event_type", &self.event_type)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counter_listener(bus: &EventBus, event_type: &str) -> (Subscription, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = bus.listen(event_type, move |_event| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        (sub, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_reaches_listener() {
        let bus = EventBus::new();
        let (_sub, count) = counter_listener(&bus, EVENT_STATE_CHANGED);

        assert_eq!(bus.fire(EVENT_STATE_CHANGED, serde_json::json!({})), 1);
        assert_eq!(bus.fire("something_else", Value::Null), 0);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_removes_listener() {
        let bus = EventBus::new();
        let (sub, count) = counter_listener(&bus, EVENT_STATE_CHANGED);
        assert_eq!(bus.listener_count(EVENT_STATE_CHANGED), 1);

        sub.unsubscribe();
        assert_eq!(bus.listener_count(EVENT_STATE_CHANGED), 0);

        bus.fire(EVENT_STATE_CHANGED, Value::Null);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_only_its_listener() {
        let bus = EventBus::new();
        let (first, _) = counter_listener(&bus, EVENT_STATE_CHANGED);
        let (_second, _) = counter_listener(&bus, EVENT_STATE_CHANGED);
        assert_eq!(bus.listener_count(EVENT_STATE_CHANGED), 2);

        drop(first);
        assert_eq!(bus.listener_count(EVENT_STATE_CHANGED), 1);
    }

    #[test]
    fn test_subscription_outlives_bus() {
        let bus = EventBus::new();
        let sub = bus.listen("x", |_| async {});
        drop(bus);
        sub.unsubscribe();
    }
}
