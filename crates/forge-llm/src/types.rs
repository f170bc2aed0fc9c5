//! Types exchanged with an [`crate::LlmProvider`] that aren't already part
//! of the shared conversation model in `forge_core::message`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool definition offered to the model, matching the JSON-schema shape
/// every provider's wire format converges on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmToolDefinition {
    /// The tool name, as registered in the tool registry.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: Option<String>,
    /// JSON schema describing the tool's arguments.
    pub input_schema: Value,
}

impl LlmToolDefinition {
    /// Build a new definition with an empty object schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a JSON schema.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// One increment of a streaming completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    /// A chunk of assistant text output.
    TextDelta(String),
    /// A new tool call has begun.
    ToolCallStart {
        /// The call's id.
        id: String,
        /// The tool name being called.
        name: String,
    },
    /// A chunk of a tool call's argument JSON, to be concatenated in order.
    ToolCallDelta {
        /// The call this delta belongs to.
        id: String,
        /// The partial JSON fragment.
        args_delta: String,
    },
    /// A tool call's arguments are complete.
    ToolCallEnd {
        /// The call that finished.
        id: String,
    },
    /// A chunk of reasoning/chain-of-thought output, where the provider
    /// exposes it as a distinct channel from visible text.
    ReasoningDelta(String),
    /// Token accounting for the turn, usually emitted near the end.
    Usage {
        /// Input tokens consumed.
        input_tokens: usize,
        /// Output tokens generated so far.
        output_tokens: usize,
    },
    /// The stream has ended normally.
    Done,
    /// The stream ended because of a provider-reported error.
    Error(String),
}

/// A non-streaming completion result.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The assistant message produced.
    pub message: forge_core::Message,
    /// Whether the message carries tool calls rather than plain text.
    pub has_tool_calls: bool,
    /// Why the model stopped generating.
    pub stop_reason: StopReason,
    /// Token usage for this turn.
    pub usage: Usage,
}

/// Why a model stopped generating a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model reached a natural end of turn.
    EndTurn,
    /// Generation was truncated by the configured max-tokens cap.
    MaxTokens,
    /// The model requested one or more tool calls.
    ToolUse,
    /// A configured stop sequence was produced.
    StopSequence,
}

/// Token accounting for one turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub input_tokens: usize,
    /// Tokens generated by the model.
    pub output_tokens: usize,
}

impl Usage {
    /// The sum of input and output tokens.
    #[must_use]
    pub fn total(&self) -> usize {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition_builder() {
        let def = LlmToolDefinition::new("read_file")
            .with_description("reads a file")
            .with_schema(serde_json::json!({"type": "object", "properties": {}}));
        assert_eq!(def.name, "read_file");
        assert_eq!(def.description.as_deref(), Some("reads a file"));
    }

    #[test]
    fn usage_total_saturates() {
        let usage = Usage {
            input_tokens: usize::MAX,
            output_tokens: 10,
        };
        assert_eq!(usage.total(), usize::MAX);
    }
}
