//! Shared context handed to every tool handler invocation.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use forge_core::message::Message;
use forge_core::{AgentRunId, SessionId};
use forge_events::EventBus;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Everything a built-in tool handler needs besides its own arguments.
///
/// `cwd` is shared (not cloned) across every call within one agent run so
/// that `bash`'s working-directory changes persist between invocations, the
/// same way the shell session a human operates persists `cd`.
pub struct ToolContext {
    /// Workspace root; tools resolve relative paths against this when no
    /// other directory is given.
    pub workspace_root: PathBuf,
    /// Current working directory, mutated by `bash` as commands `cd`.
    pub cwd: Arc<RwLock<PathBuf>>,
    /// Who is invoking the tool, for permission and rate-limit accounting
    /// (`"user"`, or a sub-agent run id rendered as a string).
    pub principal: String,
    /// The owning session, for event metadata. `None` for a sub-agent run
    /// not yet attached to a session.
    pub session_id: Option<SessionId>,
    /// The agent run driving this call, for event metadata.
    pub agent_run_id: Option<AgentRunId>,
    /// Shared event bus for `tool:*` lifecycle events and permission prompts.
    pub event_bus: Arc<EventBus>,
    /// Cooperative cancellation; handlers should poll this and return
    /// promptly when it is signalled.
    pub cancellation: CancellationToken,
    /// Running snapshot of this agent run's message history, kept current
    /// by the Agent Runtime across iterations. The Task tool reads this to
    /// seed a child run's inherited context; nothing else needs it.
    pub transcript: Arc<RwLock<Vec<Message>>>,
    /// Opaque handle to an optional RAG retriever a sub-agent may query.
    /// Retrieval internals are outside this core's scope; the handle is
    /// passed through (or withheld) as-is per the Task tool's `use_rag` flag.
    pub rag_handle: Option<Arc<dyn Any + Send + Sync>>,
}

impl ToolContext {
    /// Build a tool context rooted at `workspace_root`, with its own
    /// (unshared) `cwd`.
    #[must_use]
    pub fn new(workspace_root: PathBuf, principal: impl Into<String>, event_bus: Arc<EventBus>) -> Self {
        let cwd = Arc::new(RwLock::new(workspace_root.clone()));
        Self {
            workspace_root,
            cwd,
            principal: principal.into(),
            session_id: None,
            agent_run_id: None,
            event_bus,
            cancellation: CancellationToken::new(),
            transcript: Arc::new(RwLock::new(Vec::new())),
            rag_handle: None,
        }
    }

    /// Build a context that shares `cwd` with sibling calls in the same
    /// agent run (e.g. concurrent tool-call fan-out within one turn).
    #[must_use]
    pub fn with_shared_cwd(workspace_root: PathBuf, cwd: Arc<RwLock<PathBuf>>, principal: impl Into<String>, event_bus: Arc<EventBus>) -> Self {
        Self {
            workspace_root,
            cwd,
            principal: principal.into(),
            session_id: None,
            agent_run_id: None,
            event_bus,
            cancellation: CancellationToken::new(),
            transcript: Arc::new(RwLock::new(Vec::new())),
            rag_handle: None,
        }
    }

    /// Attach session/run identifiers for event metadata.
    #[must_use]
    pub fn for_run(mut self, session_id: SessionId, agent_run_id: AgentRunId) -> Self {
        self.session_id = Some(session_id);
        self.agent_run_id = Some(agent_run_id);
        self
    }

    /// Attach a RAG retriever handle, carried through to sub-agents that
    /// request it.
    #[must_use]
    pub fn with_rag_handle(mut self, handle: Arc<dyn Any + Send + Sync>) -> Self {
        self.rag_handle = Some(handle);
        self
    }

    fn event_metadata(&self) -> forge_events::EventMetadata {
        match (self.session_id.clone(), self.agent_run_id.clone()) {
            (Some(session_id), Some(agent_run_id)) => forge_events::EventMetadata::for_run(session_id, agent_run_id),
            _ => forge_events::EventMetadata::bare(),
        }
    }

    /// Convenience accessor used by the gateway when publishing `tool:*`
    /// events.
    #[must_use]
    pub fn metadata(&self) -> forge_events::EventMetadata {
        self.event_metadata()
    }
}
