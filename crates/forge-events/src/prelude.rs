//! Commonly used types for convenient import.
//!
//! `use forge_events::prelude::*;`

pub use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_PROMPT_TIMEOUT, EventBus, EventReceiver};
pub use crate::{EventMetadata, ForgeEvent, PermissionDecision, PermissionPromptRequest};
pub use crate::{EventFilter, EventSubscriber, FilterSubscriber, SubscriberId, SubscriberRegistry};
