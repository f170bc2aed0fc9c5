//! Forge Events - the typed event bus consumed by UIs, exporters, and tests.
//!
//! Events are published to an [`EventBus`], which broadcasts them to every
//! subscriber. There are two ways to subscribe:
//!
//! 1. **Async receivers** — `bus.subscribe()` returns an [`EventReceiver`]
//!    polled with `.recv().await`.
//! 2. **Synchronous subscribers** — register an [`EventSubscriber`] with
//!    [`EventBus::registry`] for an inline callback on every publish.
//!
//! Permission prompts are the one request/response event: the producer
//! calls [`EventBus::request_permission`] and parks until a consumer calls
//! [`EventBus::respond_permission`] or the prompt times out to `Deny`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

mod bus;
mod event;
mod subscriber;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_PROMPT_TIMEOUT, EventBus, EventReceiver};
pub use event::{EventMetadata, ForgeEvent, PermissionDecision, PermissionPromptRequest};
pub use subscriber::{EventFilter, EventSubscriber, FilterSubscriber, SubscriberId, SubscriberRegistry};
