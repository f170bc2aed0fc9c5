//! LLM Provider Abstraction: a provider-agnostic streaming chat interface
//! with concrete adapters for the Anthropic Claude Messages API and any
//! OpenAI-chat-completions-compatible endpoint.
//!
//! The agent runtime depends only on [`LlmProvider`]; swapping models or
//! vendors never touches the operation loop.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod claude;
mod error;
mod openai_compat;
pub mod prelude;
mod provider;
mod types;

pub use claude::ClaudeProvider;
pub use error::{LlmError, LlmResult};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{LlmProvider, ProviderConfig, StreamBox};
pub use types::{LlmResponse, LlmToolDefinition, StopReason, StreamEvent, Usage};
