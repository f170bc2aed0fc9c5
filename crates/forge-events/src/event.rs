//! The typed event taxonomy published by the core onto the event bus.

use forge_core::{AgentRunId, SessionId, ToolCallId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope fields attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// The session this event belongs to, if any.
    pub session_id: Option<SessionId>,
    /// The agent run that produced this event, if any.
    pub agent_run_id: Option<AgentRunId>,
    /// Wall-clock time the event was produced.
    pub timestamp: forge_core::Timestamp,
}

impl EventMetadata {
    /// Build metadata with no session/run association (used in tests and
    /// for events produced outside a run, e.g. config reload warnings).
    #[must_use]
    pub fn bare() -> Self {
        Self {
            session_id: None,
            agent_run_id: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Build metadata scoped to a session and agent run.
    #[must_use]
    pub fn for_run(session_id: SessionId, agent_run_id: AgentRunId) -> Self {
        Self {
            session_id: Some(session_id),
            agent_run_id: Some(agent_run_id),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// The decision a permission prompt is eventually resolved with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionDecision {
    /// The action is allowed to proceed.
    Allow,
    /// The action is denied.
    Deny,
}

/// A pending request for a human (or automated) decision on a gated action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionPromptRequest {
    /// Unique id correlating this prompt to its eventual response.
    pub id: Uuid,
    /// The tool or action name the prompt concerns.
    pub action: String,
    /// The resource the action targets (path, URL, command, ...).
    pub resource: String,
    /// Human-readable justification shown to the approver.
    pub description: String,
}

impl PermissionPromptRequest {
    /// Build a new prompt request with a freshly generated id.
    pub fn new(action: impl Into<String>, resource: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            resource: resource.into(),
            description: description.into(),
        }
    }
}

/// Every event the core can publish.
///
/// Exhaustive by design: a new producer is expected to either reuse one of
/// these variants or extend the enum, not invent an out-of-band channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForgeEvent {
    /// A partial chunk of assistant text, as it streams from the LLM.
    LlmChunk {
        /// Event envelope.
        metadata: EventMetadata,
        /// The text delta.
        delta: String,
    },
    /// A tool call has begun executing.
    ToolStart {
        /// Event envelope.
        metadata: EventMetadata,
        /// The call being started.
        call_id: ToolCallId,
        /// The tool name.
        tool: String,
    },
    /// A tool call has finished executing.
    ToolEnd {
        /// Event envelope.
        metadata: EventMetadata,
        /// The call that finished.
        call_id: ToolCallId,
        /// The tool name.
        tool: String,
        /// Whether the call ended in an error.
        is_error: bool,
        /// Wall-clock duration of the call, in milliseconds.
        duration_ms: u64,
    },
    /// A workflow step has begun.
    StepStart {
        /// Event envelope.
        metadata: EventMetadata,
        /// The step id, as named in the workflow definition.
        step_id: String,
    },
    /// A workflow step has finished.
    StepEnd {
        /// Event envelope.
        metadata: EventMetadata,
        /// The step id.
        step_id: String,
        /// Whether the step succeeded.
        success: bool,
    },
    /// Aggregate progress across an entire workflow run.
    WorkflowProgress {
        /// Event envelope.
        metadata: EventMetadata,
        /// Steps completed so far.
        completed: usize,
        /// Total steps in the workflow.
        total: usize,
    },
    /// A gated action needs an Allow/Deny decision before it can proceed.
    PermissionPrompt {
        /// Event envelope.
        metadata: EventMetadata,
        /// The prompt awaiting a response.
        request: PermissionPromptRequest,
    },
    /// A recoverable anomaly (cache miss, unknown model, rate limiting, a
    /// hook env var override attempt being stripped, ...).
    Warning {
        /// Event envelope.
        metadata: EventMetadata,
        /// The warning message.
        message: String,
    },
    /// A terminal failure. Stack traces never ride on this event; they go
    /// to the debug log only.
    Error {
        /// Event envelope.
        metadata: EventMetadata,
        /// The stable error kind, as a string.
        kind: String,
        /// A human-readable message.
        message: String,
    },
    /// The assistant's fully assembled final reply for this turn.
    FinalMessage {
        /// Event envelope.
        metadata: EventMetadata,
        /// The assembled text.
        text: String,
    },
}

impl ForgeEvent {
    /// A short, stable string naming this event's variant, used for logging
    /// and for filters that match by type rather than full payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::LlmChunk { .. } => "llm_chunk",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolEnd { .. } => "tool_end",
            Self::StepStart { .. } => "step_start",
            Self::StepEnd { .. } => "step_end",
            Self::WorkflowProgress { .. } => "workflow_progress",
            Self::PermissionPrompt { .. } => "permission_prompt",
            Self::Warning { .. } => "warning",
            Self::Error { .. } => "error",
            Self::FinalMessage { .. } => "final_message",
        }
    }

    /// The envelope metadata common to every variant.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::LlmChunk { metadata, .. }
            | Self::ToolStart { metadata, .. }
            | Self::ToolEnd { metadata, .. }
            | Self::StepStart { metadata, .. }
            | Self::StepEnd { metadata, .. }
            | Self::WorkflowProgress { metadata, .. }
            | Self::PermissionPrompt { metadata, .. }
            | Self::Warning { metadata, .. }
            | Self::Error { metadata, .. }
            | Self::FinalMessage { metadata, .. } => metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names_are_stable() {
        let event = ForgeEvent::Warning {
            metadata: EventMetadata::bare(),
            message: "cache miss".to_string(),
        };
        assert_eq!(event.event_type(), "warning");
    }

    #[test]
    fn prompt_request_gets_unique_id() {
        let a = PermissionPromptRequest::new("tool:bash", "rm -rf /tmp/x", "destructive command");
        let b = PermissionPromptRequest::new("tool:bash", "rm -rf /tmp/x", "destructive command");
        assert_ne!(a.id, b.id);
    }
}
