//! Commonly used types for convenient import.
//!
//! `use forge_core::prelude::*;` pulls in the error taxonomy, conversation
//! data model, identifiers, and retry helper used by nearly every crate in
//! the workspace.

// Errors
pub use crate::{ErrorKind, ForgeError, ForgeResult};

// Conversation data model
pub use crate::{Content, ContentPart, Message, Role, ToolCall, ToolCallResult};

// Identifiers and timestamps
pub use crate::{AgentRunId, SessionId, StepId, Timestamp, ToolCallId, WorkflowId};

// Retry utilities
pub use crate::retry::{RetryConfig, RetryOutcome, retry};

// Directory resolution
pub use crate::dirs::config_dir;

// Environment policy
pub use crate::env_policy::{is_denied as env_var_denied, DENIED_ENV_VARS};
