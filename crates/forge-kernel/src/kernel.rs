//! The CLI-surface contract: `run`, `runWorkflow`, `cancel`,
//! `resumeWorkflow`, `listSessions`, `resumeSession`, `deleteSession`.
//!
//! Every run-starting method spawns its work onto the runtime and returns
//! immediately with an id and an [`EventReceiver`] subscribed to the shared
//! event bus; the caller drives progress by polling events tagged with
//! that id's session/run metadata, the same pattern
//! [`forge_events::EventBus::subscribe`] was built for.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use forge_core::message::Message;
use forge_core::{AgentRunId, SessionId, WorkflowId};
use forge_events::EventReceiver;
use forge_hooks::HookEvent;
use forge_llm::LlmToolDefinition;
use forge_runtime::{AgentRuntime, RunCaps};
use forge_session::{Session, SessionSummary, TokenUsage};
use forge_tools::{ToolContext, ToolRegistry};
use forge_workflow::{WorkflowCheckpointStore, WorkflowDefinition, WorkflowState, WorkflowStatus};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::container::Container;
use crate::error::{KernelError, KernelResult};
use crate::pricing::tokens_to_usd;
use crate::templating;

/// The running process's entry point: one container, every CLI-surface
/// method the frontend drives.
pub struct Kernel {
    container: Arc<Container>,
}

impl Kernel {
    /// Wire up a container rooted at `workspace_root` and wrap it as a
    /// kernel.
    ///
    /// # Errors
    ///
    /// See [`Container::bootstrap`].
    pub async fn bootstrap(workspace_root: PathBuf) -> KernelResult<Self> {
        Ok(Self { container: Arc::new(Container::bootstrap(workspace_root).await?) })
    }

    /// Start (or continue) a user turn: load `session_id` if given, else
    /// start a fresh session, append `user_input`, and drive the agent
    /// loop to a terminal state in the background.
    ///
    /// Returns the session the turn ran against (a caller starting a fresh
    /// session with `session_id: None` has no other way to learn its id for
    /// the next turn) alongside the run id and event stream.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] if `session_id` is given but no such
    /// session exists.
    pub async fn run(&self, session_id: Option<SessionId>, user_input: String) -> KernelResult<(SessionId, AgentRunId, EventReceiver)> {
        let mut session = match session_id {
            Some(id) => self.container.sessions.load(&id).await?,
            None => Session::new(Some(self.container.llm.model().to_string())),
        };
        session.push_message(Message::user(user_input));
        let session_id = session.id.clone();

        let payload = forge_hooks::build_payload(HookEvent::UserInput, Some(&session_id.to_string()), std::collections::HashMap::new());
        match self.container.hooks.dispatch(HookEvent::UserInput, Some(&session_id.to_string()), payload).await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| !o.is_success()) {
                    warn!(session = %session_id, hook = %outcome.hook_id, "user:input hook failed, continuing");
                }
            }
            Err(error) => warn!(session = %session_id, %error, "user:input hook dispatch failed, continuing"),
        }

        let run_id = AgentRunId::new();
        let receiver = self.container.event_bus.subscribe();
        let cancel = CancellationToken::new();
        self.container.run_cancellations.insert(run_id.clone(), cancel.clone());

        let tool_defs = tool_definitions(&self.container.registry, None);
        let system_prompt = default_system_prompt(&self.container.workspace_root);
        let caps = RunCaps::from(&self.container.config.runtime);
        let runtime = AgentRuntime::new(self.container.llm.clone(), self.container.gateway.clone(), self.container.budgeter.clone(), self.container.hooks.clone());
        let ctx = ToolContext::new(self.container.workspace_root.clone(), "user", self.container.event_bus.clone()).for_run(session.id.clone(), run_id.clone());

        let container = self.container.clone();
        let run_id_bg = run_id.clone();
        tokio::spawn(async move {
            let outcome = runtime.run(&mut session, &system_prompt, &tool_defs, None, &caps, &ctx, cancel).await;
            match outcome {
                Ok(run_outcome) => session.token_usage.add(TokenUsage { prompt_tokens: 0, completion_tokens: run_outcome.usage.tokens }),
                Err(error) => warn!(run_id = %run_id_bg, error = %error, "agent run ended in error"),
            }
            if let Err(error) = container.sessions.save(&session).await {
                warn!(run_id = %run_id_bg, %error, "failed to persist session after run");
            }
            container.run_cancellations.remove(&run_id_bg);
        });

        Ok((session_id, run_id, receiver))
    }

    /// Load a named workflow definition from `.forge/workflows/<name>.yaml`
    /// under the workspace root, bind `inputs` into its step task
    /// templates, and drive it to a terminal state in the background.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::WorkflowNotFound`] if no such definition
    /// exists, or propagates a parse/validation failure.
    pub async fn run_workflow(&self, name: &str, inputs: serde_json::Value) -> KernelResult<(WorkflowId, EventReceiver)> {
        let path = forge_core::dirs::named_workflow_path(&self.container.workspace_root, name);
        let text = tokio::fs::read_to_string(&path).await.map_err(|_| KernelError::WorkflowNotFound(name.to_string()))?;
        let mut definition = WorkflowDefinition::from_yaml(&text).map_err(KernelError::Forge)?;
        for step in &mut definition.steps {
            step.task_template = templating::render(&step.task_template, &inputs, &step.inputs);
        }

        let workflow_id = WorkflowId::new();
        let mut state = WorkflowState::new(workflow_id.clone(), definition);
        state.status = WorkflowStatus::Pending;
        let checkpoints = WorkflowCheckpointStore::new(self.container.config_dir.clone());
        checkpoints.save(&state).await.map_err(KernelError::Forge)?;

        self.spawn_workflow_resume(workflow_id.clone());
        Ok((workflow_id, self.container.event_bus.subscribe()))
    }

    /// Resume a checkpointed workflow run from wherever it left off.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] if no checkpoint exists for `workflow_id`.
    pub async fn resume_workflow(&self, workflow_id: WorkflowId) -> KernelResult<(WorkflowId, EventReceiver)> {
        let checkpoints = WorkflowCheckpointStore::new(self.container.config_dir.clone());
        checkpoints.load(&workflow_id).await.map_err(KernelError::Forge)?;
        self.spawn_workflow_resume(workflow_id.clone());
        Ok((workflow_id, self.container.event_bus.subscribe()))
    }

    fn spawn_workflow_resume(&self, workflow_id: WorkflowId) {
        let cancel = CancellationToken::new();
        self.container.workflow_cancellations.insert(workflow_id.clone(), cancel.clone());
        let container = self.container.clone();
        let workspace_root = self.container.workspace_root.clone();
        let id_bg = workflow_id.clone();
        tokio::spawn(async move {
            if let Err(error) = container.workflow_engine.resume(&id_bg, workspace_root, cancel).await {
                warn!(workflow_id = %id_bg, %error, "workflow run ended in error");
            }
            container.workflow_cancellations.remove(&id_bg);
        });
    }

    /// Cancel a live agent run or workflow run by id. Returns `false` if
    /// `id` is not a valid UUID or names neither a live run nor a live
    /// workflow.
    pub fn cancel(&self, id: &str) -> bool {
        let Ok(uuid) = Uuid::parse_str(id) else { return false };
        if let Some(entry) = self.container.run_cancellations.get(&AgentRunId::from_uuid(uuid)) {
            entry.cancel();
            return true;
        }
        if let Some(entry) = self.container.workflow_cancellations.get(&WorkflowId::from_uuid(uuid)) {
            entry.cancel();
            return true;
        }
        false
    }

    /// List every persisted session's summary.
    ///
    /// # Errors
    ///
    /// Propagates a [`forge_session::SessionError`] from the underlying store.
    pub async fn list_sessions(&self) -> KernelResult<Vec<SessionSummary>> {
        Ok(self.container.sessions.list().await?)
    }

    /// Load a persisted session in full.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Session`] if no such session exists or it is
    /// corrupt with no recoverable backup.
    pub async fn resume_session(&self, id: &SessionId) -> KernelResult<Session> {
        Ok(self.container.sessions.load(id).await?)
    }

    /// Delete a persisted session and its backups.
    ///
    /// # Errors
    ///
    /// Propagates a [`forge_session::SessionError`] from the underlying store.
    pub async fn delete_session(&self, id: &SessionId) -> KernelResult<()> {
        Ok(self.container.sessions.delete(id).await?)
    }

    /// Estimate USD cost for a completed run's token usage, given the
    /// model that produced it.
    #[must_use]
    pub fn estimate_cost(&self, usage: TokenUsage) -> f64 {
        tokens_to_usd(self.container.llm.model(), usage.prompt_tokens, usage.completion_tokens)
    }

    /// Access the wired-up dependencies directly, for callers (the CLI's
    /// `doctor` command) that need to inspect the container rather than
    /// drive a run through it.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }
}

fn tool_definitions(registry: &ToolRegistry, allowed: Option<&std::collections::HashSet<String>>) -> Vec<LlmToolDefinition> {
    registry
        .names()
        .filter(|name| allowed.is_none_or(|set| set.contains(*name)))
        .filter_map(|name| registry.get(name))
        .map(|descriptor| LlmToolDefinition::new(descriptor.name).with_description(descriptor.description).with_schema(descriptor.schema.clone()))
        .collect()
}

fn default_system_prompt(workspace_root: &Path) -> String {
    format!(
        "You are an AI coding assistant working in the project at {workspace}.\n\n\
         Use the available tools to read, search, and modify files, run commands, \
         and delegate focused sub-tasks to the `task` tool when a piece of work is \
         large enough to benefit from its own context. Prefer the smallest change \
         that satisfies the user's request.",
        workspace = workspace_root.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_tools::{builtin::register_defaults, ToolRegistry};

    #[test]
    fn tool_definitions_respects_whitelist() {
        let mut registry = ToolRegistry::new();
        register_defaults(&mut registry);
        let all = tool_definitions(&registry, None);
        assert!(all.len() >= 8);

        let mut allowed = std::collections::HashSet::new();
        allowed.insert("read_file".to_string());
        let restricted = tool_definitions(&registry, Some(&allowed));
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted[0].name, "read_file");
    }

    #[test]
    fn default_system_prompt_names_the_workspace() {
        let prompt = default_system_prompt(Path::new("/tmp/my-project"));
        assert!(prompt.contains("/tmp/my-project"));
    }
}
