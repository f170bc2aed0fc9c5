//! The lifecycle event taxonomy hooks can subscribe to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named lifecycle event the Hook Dispatcher fires hooks against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    /// A session has started.
    SessionStart,
    /// A session has ended.
    SessionEnd,
    /// A message was appended to a session.
    SessionMessage,
    /// A session was persisted to disk.
    SessionSave,
    /// Fires before a tool call is dispatched to its handler.
    ToolPre,
    /// Fires after a tool call completes.
    ToolPost,
    /// Fires before a sub-agent run begins.
    AgentPre,
    /// Fires after a sub-agent run completes.
    AgentPost,
    /// Fires before a workflow begins executing.
    WorkflowPre,
    /// Fires after a workflow finishes.
    WorkflowPost,
    /// Fires when a workflow step transitions.
    WorkflowStep,
    /// Fires when a workflow terminates in the `failed` state.
    WorkflowFailed,
    /// Fires when the Permission Resolver denies an action.
    PermissionDenied,
    /// Fires before a request is sent to the LLM provider.
    LlmPre,
    /// Fires after an LLM response is received.
    LlmPost,
    /// Fires when the user submits input.
    UserInput,
}

impl HookEvent {
    /// The stable, on-the-wire name of this event, e.g. `"tool:pre"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SessionStart => "session:start",
            Self::SessionEnd => "session:end",
            Self::SessionMessage => "session:message",
            Self::SessionSave => "session:save",
            Self::ToolPre => "tool:pre",
            Self::ToolPost => "tool:post",
            Self::AgentPre => "agent:pre",
            Self::AgentPost => "agent:post",
            Self::WorkflowPre => "workflow:pre",
            Self::WorkflowPost => "workflow:post",
            Self::WorkflowStep => "workflow:step",
            Self::WorkflowFailed => "workflow:failed",
            Self::PermissionDenied => "permission:denied",
            Self::LlmPre => "llm:pre",
            Self::LlmPost => "llm:post",
            Self::UserInput => "user:input",
        }
    }

    /// Parse the on-the-wire event name. `None` if unrecognized.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "session:start" => Self::SessionStart,
            "session:end" => Self::SessionEnd,
            "session:message" => Self::SessionMessage,
            "session:save" => Self::SessionSave,
            "tool:pre" => Self::ToolPre,
            "tool:post" => Self::ToolPost,
            "agent:pre" => Self::AgentPre,
            "agent:post" => Self::AgentPost,
            "workflow:pre" => Self::WorkflowPre,
            "workflow:post" => Self::WorkflowPost,
            "workflow:step" => Self::WorkflowStep,
            "workflow:failed" => Self::WorkflowFailed,
            "permission:denied" => Self::PermissionDenied,
            "llm:pre" => Self::LlmPre,
            "llm:post" => Self::LlmPost,
            "user:input" => Self::UserInput,
            _ => return None,
        })
    }

    /// Whether this is one of the `*:pre` events that can block the
    /// about-to-happen operation when a `blocking` hook exits non-zero.
    #[must_use]
    pub fn is_pre(self) -> bool {
        matches!(self, Self::ToolPre | Self::AgentPre | Self::WorkflowPre | Self::LlmPre)
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_parse_round_trip() {
        for event in [
            HookEvent::SessionStart,
            HookEvent::ToolPre,
            HookEvent::WorkflowFailed,
            HookEvent::UserInput,
        ] {
            assert_eq!(HookEvent::parse(event.name()), Some(event));
        }
    }

    #[test]
    fn only_pre_events_are_blocking_candidates() {
        assert!(HookEvent::ToolPre.is_pre());
        assert!(HookEvent::AgentPre.is_pre());
        assert!(HookEvent::WorkflowPre.is_pre());
        assert!(HookEvent::LlmPre.is_pre());
        assert!(!HookEvent::ToolPost.is_pre());
        assert!(!HookEvent::SessionStart.is_pre());
    }
}
