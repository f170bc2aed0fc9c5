//! Convenience re-exports for dependent crates.

pub use crate::{
    ClaudeProvider, LlmError, LlmProvider, LlmResponse, LlmResult, LlmToolDefinition,
    OpenAiCompatProvider, ProviderConfig, StopReason, StreamBox, StreamEvent, Usage,
};
pub use forge_core::{Content, ContentPart, Message, Role, ToolCall, ToolCallResult};
