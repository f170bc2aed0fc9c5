//! Synchronous subscriber registry.
//!
//! Most consumers should prefer `EventBus::subscribe()` (an async
//! `EventReceiver`). The synchronous registry exists for in-process
//! listeners — telemetry counters, test assertions — that want an immediate
//! callback rather than a poll loop.

use std::sync::Arc;

use dashmap::DashMap;

use crate::event::ForgeEvent;

/// Identifier for a registered synchronous subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// A synchronous event listener, invoked inline on the publishing thread.
///
/// Implementations must not block: the Event Bus's delivery guarantees
/// (non-blocking drops on slow consumers) only cover the broadcast channel,
/// not this registry.
pub trait EventSubscriber: Send + Sync {
    /// Called for every published event.
    fn on_event(&self, event: &ForgeEvent);
}

/// A filter restricting a subscriber to a subset of event types.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// If non-empty, only these `event_type()` names are delivered.
    pub event_types: Vec<String>,
}

impl EventFilter {
    /// Build a filter with no restriction (matches everything).
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Build a filter that only matches the named event types.
    pub fn only(event_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            event_types: event_types.into_iter().map(Into::into).collect(),
        }
    }

    fn matches(&self, event: &ForgeEvent) -> bool {
        self.event_types.is_empty() || self.event_types.iter().any(|t| t == event.event_type())
    }
}

/// Wraps a closure as an [`EventSubscriber`], filtered by [`EventFilter`].
pub struct FilterSubscriber<F: Fn(&ForgeEvent) + Send + Sync> {
    filter: EventFilter,
    callback: F,
}

impl<F: Fn(&ForgeEvent) + Send + Sync> FilterSubscriber<F> {
    /// Build a filtered subscriber from a closure.
    pub fn new(filter: EventFilter, callback: F) -> Self {
        Self { filter, callback }
    }
}

impl<F: Fn(&ForgeEvent) + Send + Sync> EventSubscriber for FilterSubscriber<F> {
    fn on_event(&self, event: &ForgeEvent) {
        if self.filter.matches(event) {
            (self.callback)(event);
        }
    }
}

/// Registry of synchronous subscribers, notified inline by `EventBus::publish`.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    next_id: std::sync::atomic::AtomicU64,
    subscribers: DashMap<SubscriberId, Arc<dyn EventSubscriber>>,
}

impl SubscriberRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, returning an id that can later unregister it.
    pub fn register(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed));
        self.subscribers.insert(id, subscriber);
        id
    }

    /// Remove a previously registered subscriber.
    pub fn unregister(&self, id: SubscriberId) {
        self.subscribers.remove(&id);
    }

    /// Notify every registered subscriber of `event`.
    pub fn notify(&self, event: &ForgeEvent) {
        for entry in &self.subscribers {
            entry.value().on_event(event);
        }
    }

    /// Number of currently registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether the registry has no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventMetadata;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn registry_notifies_all_subscribers() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        registry.register(Arc::new(FilterSubscriber::new(EventFilter::any(), move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        })));
        registry.notify(&ForgeEvent::Warning {
            metadata: EventMetadata::bare(),
            message: "x".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn filter_restricts_delivery() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        registry.register(Arc::new(FilterSubscriber::new(
            EventFilter::only(["tool_start"]),
            move |_| {
                count2.fetch_add(1, Ordering::SeqCst);
            },
        )));
        registry.notify(&ForgeEvent::Warning {
            metadata: EventMetadata::bare(),
            message: "x".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unregister_stops_delivery() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let id = registry.register(Arc::new(FilterSubscriber::new(EventFilter::any(), move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        })));
        registry.unregister(id);
        registry.notify(&ForgeEvent::Warning {
            metadata: EventMetadata::bare(),
            message: "x".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
