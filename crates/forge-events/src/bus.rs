//! The event bus: broadcasts [`ForgeEvent`]s to any number of subscribers.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::event::{ForgeEvent, PermissionDecision, PermissionPromptRequest};
use crate::subscriber::SubscriberRegistry;

/// Default bounded buffer size per agent, per spec's Event Bus delivery
/// contract.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// How long a permission prompt waits for a response before resolving to
/// [`PermissionDecision::Deny`].
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Broadcasts events to all subscribers: async receivers via a bounded
/// broadcast channel, and synchronous listeners via a [`SubscriberRegistry`].
///
/// Delivery is single-producer-per-agent, multi-consumer, and non-blocking:
/// a slow consumer that falls behind the channel capacity has old events
/// dropped from under it rather than stalling the producer. `EventReceiver`
/// surfaces the drop count so a UI can render a "dropped N events" notice.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<ForgeEvent>>,
    registry: SubscriberRegistry,
    capacity: usize,
    pending_prompts: Arc<DashMap<Uuid, oneshot::Sender<PermissionDecision>>>,
}

impl EventBus {
    /// Build a bus with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Build a bus with an explicit channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            registry: SubscriberRegistry::new(),
            capacity,
            pending_prompts: Arc::new(DashMap::new()),
        }
    }

    /// Publish an event to every subscriber. Returns the number of async
    /// receivers the broadcast reached (synchronous subscribers are always
    /// notified regardless of this count).
    pub fn publish(&self, event: ForgeEvent) -> usize {
        let event = Arc::new(event);
        trace!(event_type = %event.event_type(), "publishing event");

        self.registry.notify(&event);

        match self.sender.send(Arc::clone(&event)) {
            Ok(count) => {
                debug!(event_type = %event.event_type(), receivers = count, "event published");
                count
            }
            Err(_) => {
                trace!(event_type = %event.event_type(), "no receivers for event");
                0
            }
        }
    }

    /// Subscribe an async receiver to all future events.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// The synchronous subscriber registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Number of currently subscribed async receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// The channel's configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publish a permission prompt and wait for a response, or `Deny` once
    /// `timeout` elapses with no response.
    ///
    /// This is the request/response half of the Event Bus contract: the
    /// producer parks here while a UI consumer (or a test) receives the
    /// `PermissionPrompt` event and eventually calls [`Self::respond_permission`].
    pub async fn request_permission(
        &self,
        request: PermissionPromptRequest,
        metadata: crate::event::EventMetadata,
        timeout: Duration,
    ) -> PermissionDecision {
        let (tx, rx) = oneshot::channel();
        self.pending_prompts.insert(request.id, tx);

        self.publish(ForgeEvent::PermissionPrompt {
            metadata,
            request: request.clone(),
        });

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) | Err(_) => {
                self.pending_prompts.remove(&request.id);
                warn!(request_id = %request.id, "permission prompt timed out or was dropped, defaulting to deny");
                PermissionDecision::Deny
            }
        }
    }

    /// Resolve a pending permission prompt. Returns `false` if no prompt
    /// with that id is outstanding (already resolved, or it timed out).
    pub fn respond_permission(&self, request_id: Uuid, decision: PermissionDecision) -> bool {
        match self.pending_prompts.remove(&request_id) {
            Some((_, tx)) => tx.send(decision).is_ok(),
            None => false,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            registry: SubscriberRegistry::new(),
            capacity: self.capacity,
            pending_prompts: Arc::clone(&self.pending_prompts),
        }
    }
}

/// An async subscription to the event bus.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<ForgeEvent>>,
}

impl EventReceiver {
    /// Receive the next event, transparently skipping past any lag
    /// (dropped events are logged, not surfaced as an error to the caller).
    /// Returns `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<Arc<ForgeEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(dropped)) => {
                    warn!(dropped, "event receiver lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive; `None` if nothing is queued or the bus closed.
    pub fn try_recv(&mut self) -> Option<Arc<ForgeEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(dropped)) => {
                    warn!(dropped, "event receiver lagged, events dropped");
                }
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventMetadata;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let count = bus.publish(ForgeEvent::Warning {
            metadata: EventMetadata::bare(),
            message: "hi".to_string(),
        });
        assert_eq!(count, 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "warning");
    }

    #[tokio::test]
    async fn no_receivers_returns_zero() {
        let bus = EventBus::new();
        let count = bus.publish(ForgeEvent::Warning {
            metadata: EventMetadata::bare(),
            message: "hi".to_string(),
        });
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(ForgeEvent::Warning {
            metadata: EventMetadata::bare(),
            message: "hi".to_string(),
        });
        assert!(a.recv().await.is_some());
        assert!(b.recv().await.is_some());
    }

    #[tokio::test]
    async fn permission_prompt_times_out_to_deny() {
        let bus = EventBus::new();
        let request = PermissionPromptRequest::new("tool:bash", "rm -rf /tmp/x", "destructive");
        let decision = bus
            .request_permission(request, EventMetadata::bare(), Duration::from_millis(20))
            .await;
        assert_eq!(decision, PermissionDecision::Deny);
    }

    #[tokio::test]
    async fn permission_prompt_resolves_on_response() {
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe();
        let request = PermissionPromptRequest::new("tool:bash", "ls", "list files");
        let id = request.id;

        let bus2 = Arc::clone(&bus);
        let responder = tokio::spawn(async move {
            let event = rx.recv().await.unwrap();
            if let ForgeEvent::PermissionPrompt { request, .. } = event.as_ref() {
                bus2.respond_permission(request.id, PermissionDecision::Allow);
            }
        });

        let decision = bus
            .request_permission(request, EventMetadata::bare(), Duration::from_secs(5))
            .await;
        responder.await.unwrap();
        assert_eq!(decision, PermissionDecision::Allow);
        assert!(!bus.pending_prompts.contains_key(&id));
    }
}
