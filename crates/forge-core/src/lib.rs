//! Forge Core - foundation types shared by every crate in the agent
//! execution substrate.
//!
//! This crate provides:
//! - The shared error taxonomy and its `Result` alias
//! - Message/role/content types that make up the conversation data model
//! - Stable newtype identifiers (session, agent run, workflow, step, tool call)
//! - Resolution of the on-disk config/state directory (`FORGE_CONFIG_DIR`)
//! - A hook/subprocess environment denylist
//! - A retry-with-jitter helper shared by the LLM client and hook dispatcher

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod dirs;
pub mod env_policy;
pub mod error;
pub mod message;
pub mod prelude;
pub mod retry;
pub mod types;

pub use error::{ErrorKind, ForgeError, ForgeResult};
pub use message::{Content, ContentPart, Message, Role, ToolCall, ToolCallResult};
pub use retry::{RetryConfig, RetryOutcome, retry};
pub use types::{AgentRunId, SessionId, StepId, ToolCallId, Timestamp, WorkflowId};
