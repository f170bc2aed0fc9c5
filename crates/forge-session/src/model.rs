//! The session data model: persisted conversation state plus the index
//! entry used for fast listing without a full read.

use std::collections::HashMap;

use forge_core::{Message, SessionId, Timestamp, ToolCallId};
use serde::{Deserialize, Serialize};

/// Token usage accumulated by a session across every turn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens sent to the model.
    pub prompt_tokens: u64,
    /// Tokens generated by the model.
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Total tokens across prompt and completion.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }

    /// Add another usage reading into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
    }
}

/// A single recorded tool invocation, kept alongside the message log for
/// audit/replay purposes distinct from the tool-result message itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    /// The call this record describes.
    pub call_id: ToolCallId,
    /// The tool name invoked.
    pub tool_name: String,
    /// Arguments passed to the tool, already validated.
    pub arguments: serde_json::Value,
    /// Whether the invocation succeeded.
    pub success: bool,
    /// When the invocation completed.
    pub completed_at: Timestamp,
}

/// The on-disk/in-memory shape of one session.
///
/// `recovered` is set only by the store's crash-recovery path and is not
/// written back to disk until the next save — a crash between recovery and
/// the following turn should not silently rewrite the backup-derived file
/// with a flag nothing actually observed yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Stable session identifier.
    pub id: SessionId,
    /// Human-readable title, generated or user-provided.
    pub title: Option<String>,
    /// When the session was first created.
    pub created_at: Timestamp,
    /// When the session was last written.
    pub updated_at: Timestamp,
    /// The model this session is bound to.
    pub model_id: Option<String>,
    /// Cumulative token usage across all turns.
    #[serde(default)]
    pub token_usage: TokenUsage,
    /// The full message history, in order. Append-only: truncation
    /// strategies operate on an in-memory copy and never rewrite this log.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Tool invocations recorded across the session's lifetime.
    #[serde(default)]
    pub tool_invocations: Vec<ToolInvocationRecord>,
    /// Free-form tags for organization.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Custom key-value metadata.
    #[serde(default)]
    pub custom: HashMap<String, String>,
    /// Set when this session's in-memory state was reconstructed from a
    /// backup after the primary file was found corrupt. Never persisted
    /// until the next save.
    #[serde(skip)]
    pub recovered: bool,
}

impl Session {
    /// Start a new, empty session.
    #[must_use]
    pub fn new(model_id: Option<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: SessionId::new(),
            title: None,
            created_at: now,
            updated_at: now,
            model_id,
            token_usage: TokenUsage::default(),
            messages: Vec::new(),
            tool_invocations: Vec::new(),
            tags: Vec::new(),
            custom: HashMap::new(),
            recovered: false,
        }
    }

    /// Append a message and bump `updated_at`.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = chrono::Utc::now();
    }

    /// Record a completed tool invocation.
    pub fn record_tool_invocation(&mut self, record: ToolInvocationRecord) {
        self.tool_invocations.push(record);
    }

    /// The summary entry this session contributes to the session index.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            updated_at: self.updated_at,
            message_count: self.messages.len(),
            tokens_used: self.token_usage.total(),
        }
    }
}

/// The lightweight per-session entry kept in the session index, so listing
/// sessions never requires reading every session file in full.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// The session this summarizes.
    pub id: SessionId,
    /// Human-readable title, if set.
    pub title: Option<String>,
    /// When the session was last written.
    pub updated_at: Timestamp,
    /// Number of messages in the session.
    pub message_count: usize,
    /// Cumulative tokens used by the session.
    pub tokens_used: u64,
}

/// The full session index: id → summary, persisted as one JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionIndex {
    /// Every known session's summary, keyed by its string-rendered id.
    #[serde(default)]
    pub sessions: HashMap<String, SessionSummary>,
}

impl SessionIndex {
    /// Insert or replace a session's summary entry.
    pub fn upsert(&mut self, summary: SessionSummary) {
        self.sessions.insert(summary.id.to_string(), summary);
    }

    /// Remove a session's summary entry.
    pub fn remove(&mut self, id: &SessionId) {
        self.sessions.remove(&id.to_string());
    }

    /// List every summary, most-recently-updated first.
    #[must_use]
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self.sessions.values().cloned().collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_empty() {
        let session = Session::new(Some("claude-sonnet".to_string()));
        assert!(session.messages.is_empty());
        assert!(!session.recovered);
    }

    #[test]
    fn push_message_bumps_updated_at() {
        let mut session = Session::new(None);
        let before = session.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        session.push_message(Message::user("hi"));
        assert!(session.updated_at >= before);
        assert_eq!(session.messages.len(), 1);
    }

    #[test]
    fn summary_reflects_session_state() {
        let mut session = Session::new(None);
        session.push_message(Message::user("hi"));
        session.token_usage.prompt_tokens = 10;
        session.token_usage.completion_tokens = 5;

        let summary = session.summary();
        assert_eq!(summary.message_count, 1);
        assert_eq!(summary.tokens_used, 15);
    }

    #[test]
    fn index_list_sorts_most_recent_first() {
        let mut index = SessionIndex::default();
        let old = SessionSummary {
            id: SessionId::new(),
            title: None,
            updated_at: chrono::Utc::now() - chrono::Duration::hours(1),
            message_count: 1,
            tokens_used: 1,
        };
        let newer = SessionSummary {
            id: SessionId::new(),
            title: None,
            updated_at: chrono::Utc::now(),
            message_count: 1,
            tokens_used: 1,
        };
        index.upsert(old.clone());
        index.upsert(newer.clone());

        let listed = index.list();
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, old.id);
    }

    #[test]
    fn index_remove_drops_entry() {
        let mut index = SessionIndex::default();
        let summary = SessionSummary {
            id: SessionId::new(),
            title: None,
            updated_at: chrono::Utc::now(),
            message_count: 0,
            tokens_used: 0,
        };
        index.upsert(summary.clone());
        index.remove(&summary.id);
        assert!(index.list().is_empty());
    }
}
