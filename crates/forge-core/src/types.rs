//! Stable identifier newtypes used throughout the substrate.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A point in time, always UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

macro_rules! uuid_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            #[doc = concat!("Generate a new random ", stringify!($name), ".")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(SessionId, "Stable identifier for a persisted session.");
uuid_id!(AgentRunId, "Identifier for one live or completed agent run.");
uuid_id!(WorkflowId, "Identifier for one workflow execution.");

/// Identifier for one tool call within an assistant message.
///
/// Unlike the other ids in this module this is not always one of ours:
/// providers mint their own call ids on the wire (Claude's `toolu_...`,
/// OpenAI's `call_...`) and that exact string must be replayed verbatim in
/// the follow-up tool-result turn, so it cannot be normalized into a UUID.
/// `new()` is only used when a call originates on our side (e.g. a
/// synthesized sub-agent invocation) rather than from a provider response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolCallId(pub String);

impl ToolCallId {
    /// Generate a new internally-originated call id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ToolCallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ToolCallId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ToolCallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier for a single workflow step.
///
/// Unlike the other ids in this module this is not a generated UUID: step
/// ids are user-authored in the workflow definition (e.g. `"review"`,
/// `"tests"`) and referenced by name from `depends_on`, `parallel_with`, and
/// condition expressions (`review.result.coverage`). Stability of the
/// *string itself* across parses is the whole point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    /// Wrap a step identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_string() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn step_id_is_a_plain_string_not_a_uuid() {
        let id = StepId::new("review");
        assert_eq!(id.as_str(), "review");
        assert_eq!(id.to_string(), "review");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"review\"");
    }
}
