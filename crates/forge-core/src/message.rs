//! The conversation data model: messages, roles, and tool call records.
//!
//! This is the shape persisted by the session store and assembled into
//! prompts by the agent runtime; it is deliberately provider-agnostic so a
//! single `Message` history can be replayed against any `LlmProvider`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ToolCallId;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions, always first in a conversation.
    System,
    /// A human (or orchestrating caller) turn.
    User,
    /// A model-generated turn.
    Assistant,
    /// The result of one or more tool calls.
    Tool,
}

/// One turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who authored this message.
    pub role: Role,
    /// The message body.
    pub content: Content,
}

impl Message {
    /// Build a user text message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
        }
    }

    /// Build an assistant text message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(text.into()),
        }
    }

    /// Build a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(text.into()),
        }
    }

    /// Build an assistant message carrying tool calls instead of text.
    #[must_use]
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::ToolCalls(calls),
        }
    }

    /// Build a tool-result message.
    #[must_use]
    pub fn tool_result(result: ToolCallResult) -> Self {
        Self {
            role: Role::Tool,
            content: Content::ToolResult(result),
        }
    }

    /// The plain text of this message, if it is text-only.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The tool calls carried by this message, if any.
    #[must_use]
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        match &self.content {
            Content::ToolCalls(calls) => Some(calls),
            _ => None,
        }
    }

    /// A rough size estimate of this message's textual payload, used by
    /// context truncation before an exact token count is available.
    #[must_use]
    pub fn approx_char_len(&self) -> usize {
        match &self.content {
            Content::Text(s) => s.len(),
            Content::ToolCalls(calls) => calls
                .iter()
                .map(|c| c.name.len() + c.arguments.to_string().len())
                .sum(),
            Content::ToolResult(r) => r.content.len(),
            Content::MultiPart(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.len(),
                    ContentPart::Image { data, .. } => data.len(),
                })
                .sum(),
        }
    }
}

/// The body of a [`Message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text.
    Text(String),
    /// One or more tool calls requested by the assistant.
    ToolCalls(Vec<ToolCall>),
    /// The result of a tool call.
    ToolResult(ToolCallResult),
    /// Mixed text/image content (user turns with attachments).
    MultiPart(Vec<ContentPart>),
}

/// One part of a [`Content::MultiPart`] message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// A text segment.
    Text {
        /// The text.
        text: String,
    },
    /// An inline image segment.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// The image MIME type.
        media_type: String,
    },
}

/// A single tool invocation requested by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Stable id correlating this call to its eventual [`ToolCallResult`].
    pub id: ToolCallId,
    /// The tool name, as registered in the tool registry.
    pub name: String,
    /// The tool's arguments, already assembled from the provider's
    /// streamed deltas.
    pub arguments: Value,
}

impl ToolCall {
    /// Build a new tool call with empty arguments.
    pub fn new(id: ToolCallId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            arguments: Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach arguments to this call.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = arguments;
        self
    }
}

/// The outcome of executing a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The id of the call this is responding to.
    pub call_id: ToolCallId,
    /// Rendered output (already truncated/canonicalized by the gateway).
    pub content: String,
    /// Whether `content` describes an error rather than a successful result.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Build a successful result.
    pub fn success(call_id: ToolCallId, content: impl Into<String>) -> Self {
        Self {
            call_id,
            content: content.into(),
            is_error: false,
        }
    }

    /// Build an error result.
    pub fn error(call_id: ToolCallId, content: impl Into<String>) -> Self {
        Self {
            call_id,
            content: content.into(),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_round_trips_through_json() {
        let msg = Message::user("hello");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::User);
        assert_eq!(back.text(), Some("hello"));
    }

    #[test]
    fn tool_call_message_exposes_calls() {
        let call = ToolCall::new(ToolCallId::new(), "read_file")
            .with_arguments(serde_json::json!({"path": "/tmp/x"}));
        let msg = Message::assistant_tool_calls(vec![call]);
        assert_eq!(msg.tool_calls().unwrap().len(), 1);
        assert!(msg.text().is_none());
    }

    #[test]
    fn tool_result_error_flag() {
        let id = ToolCallId::new();
        let ok = ToolCallResult::success(id.clone(), "contents");
        assert!(!ok.is_error);
        let err = ToolCallResult::error(id, "not found");
        assert!(err.is_error);
    }

    #[test]
    fn approx_char_len_covers_all_variants() {
        assert_eq!(Message::user("abcd").approx_char_len(), 4);
        let multipart = Message {
            role: Role::User,
            content: Content::MultiPart(vec![ContentPart::Text {
                text: "ab".to_string(),
            }]),
        };
        assert_eq!(multipart.approx_char_len(), 2);
    }
}
