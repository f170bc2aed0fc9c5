//! The execution scheduler: turns a validated [`WorkflowDefinition`] into
//! running sub-agents, one per ready step, checkpointing after every
//! terminal step and honoring a workflow-level wall timeout.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use forge_core::message::Message;
use forge_core::{AgentRunId, ForgeError, ForgeResult, StepId, Timestamp, WorkflowId};
use forge_events::{EventBus, EventMetadata, ForgeEvent};
use forge_hooks::{HookDispatcher, HookError, HookEvent};
use forge_llm::LlmProvider;
use forge_runtime::{AgentRuntime, AgentTypeRegistry, RunStatus, SubAgentPool, TokenBudgeter};
use forge_session::Session;
use forge_tools::{ToolContext, ToolGateway};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::condition::{self, Expr};
use crate::definition::{Step, WorkflowDefinition};
use crate::state::{output_to_result_value, StepResult, WorkflowCheckpointStore, WorkflowState, WorkflowStatus};
use crate::validate;

/// Everything a step's sub-agent run needs, independent of `&self` so a
/// launched step can outlive the loop iteration that spawned it.
struct StepRunOutcome {
    agent_run_id: Option<AgentRunId>,
    success: bool,
    result: Option<serde_json::Value>,
    error: Option<String>,
    started_at: Timestamp,
    ended_at: Timestamp,
}

impl StepRunOutcome {
    fn into_step_result(self) -> StepResult {
        let duration_sec = (self.ended_at - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        StepResult {
            agent_run_id: self.agent_run_id,
            success: self.success,
            result: self.result,
            error: self.error,
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration_sec,
        }
    }
}

/// Drives workflow runs to completion: validates a definition, schedules
/// its steps as sub-agent runs in dependency order, and checkpoints
/// progress so a run can resume after a crash or cancellation.
pub struct WorkflowEngine {
    llm: Arc<dyn LlmProvider>,
    gateway: Arc<ToolGateway>,
    budgeter: Arc<TokenBudgeter>,
    hooks: Arc<HookDispatcher>,
    agent_types: Arc<AgentTypeRegistry>,
    pool: Arc<SubAgentPool>,
    event_bus: Arc<EventBus>,
    config: forge_config::WorkflowSection,
    checkpoints: WorkflowCheckpointStore,
}

impl WorkflowEngine {
    /// Build an engine over the same shared runtime dependencies an
    /// `AgentRuntime`/`TaskTool` is constructed from, plus a checkpoint
    /// directory and the workflow configuration section.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        gateway: Arc<ToolGateway>,
        budgeter: Arc<TokenBudgeter>,
        hooks: Arc<HookDispatcher>,
        agent_types: Arc<AgentTypeRegistry>,
        pool: Arc<SubAgentPool>,
        event_bus: Arc<EventBus>,
        config: forge_config::WorkflowSection,
        config_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            llm,
            gateway,
            budgeter,
            hooks,
            agent_types,
            pool,
            event_bus,
            config,
            checkpoints: WorkflowCheckpointStore::new(config_dir),
        }
    }

    /// Validate and run a fresh workflow definition to a terminal state.
    ///
    /// `cancel` is handed to every step's sub-agent run; cancelling it
    /// propagates top-down per the cancellation semantics a user-initiated
    /// workflow cancel needs — all running steps observe it, and the
    /// scheduler stops launching new ones.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::WorkflowInvalid`]/[`ForgeError::WorkflowCycle`]
    /// if `def` fails validation, or [`ForgeError::WorkflowTimeout`] if the
    /// run exceeds its configured wall-clock budget.
    pub async fn run(&self, def: WorkflowDefinition, workspace_root: PathBuf, cancel: CancellationToken) -> ForgeResult<WorkflowState> {
        let order = validate::validate(&def, &self.agent_types, self.config.max_steps)?;
        let mut state = WorkflowState::new(WorkflowId::new(), def);
        state.status = WorkflowStatus::Running;
        self.checkpoints.save(&state).await?;
        self.run_with_hooks(&mut state, &order, workspace_root, cancel).await?;
        Ok(state)
    }

    /// Resume a checkpointed run: already-`completed`/`skipped` steps are
    /// left alone, `failed` steps are re-run from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Internal`] if no checkpoint exists for `id`,
    /// or any error [`Self::run`] can return.
    pub async fn resume(&self, id: &WorkflowId, workspace_root: PathBuf, cancel: CancellationToken) -> ForgeResult<WorkflowState> {
        let mut state = self.checkpoints.load(id).await?;
        let order = validate::validate(&state.definition, &self.agent_types, self.config.max_steps)?;
        for failed_id in std::mem::take(&mut state.failed) {
            state.step_results.remove(&failed_id);
        }
        state.status = WorkflowStatus::Running;
        self.checkpoints.save(&state).await?;
        self.run_with_hooks(&mut state, &order, workspace_root, cancel).await?;
        Ok(state)
    }

    /// Fire `workflow:pre`, run `execute` to a terminal state, and fire
    /// `workflow:post` (or `workflow:failed`, if the run didn't succeed).
    async fn run_with_hooks(&self, state: &mut WorkflowState, order: &[StepId], workspace_root: PathBuf, cancel: CancellationToken) -> ForgeResult<()> {
        if let Err(error) = self.fire_workflow_pre(&state.workflow_id).await {
            state.status = WorkflowStatus::Failed;
            state.error = Some(error.to_string());
            self.checkpoints.save(state).await?;
            self.fire_workflow_failed(&state.workflow_id).await;
            return Err(error);
        }

        let result = self.execute(state, order, workspace_root, cancel).await;
        if result.is_err() || state.status == WorkflowStatus::Failed {
            self.fire_workflow_failed(&state.workflow_id).await;
        } else {
            self.fire_workflow_post(&state.workflow_id).await;
        }
        result
    }

    async fn fire_workflow_pre(&self, workflow_id: &WorkflowId) -> ForgeResult<()> {
        let payload = forge_hooks::build_payload(
            HookEvent::WorkflowPre,
            None,
            HashMap::from([("workflow_id".to_string(), serde_json::Value::String(workflow_id.to_string()))]),
        );
        match self.hooks.dispatch(HookEvent::WorkflowPre, None, payload).await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| !o.is_success()) {
                    tracing::warn!(workflow_id = %workflow_id, hook = %outcome.hook_id, "workflow:pre hook failed, continuing");
                }
                Ok(())
            }
            Err(HookError::Blocked { hook, reason }) => Err(ForgeError::PermissionDenied {
                action: "workflow:pre".to_string(),
                resource: format!("blocked by hook '{hook}': {reason}"),
            }),
        }
    }

    async fn fire_workflow_post(&self, workflow_id: &WorkflowId) {
        self.fire_lifecycle_hook(HookEvent::WorkflowPost, workflow_id).await;
    }

    async fn fire_workflow_failed(&self, workflow_id: &WorkflowId) {
        self.fire_lifecycle_hook(HookEvent::WorkflowFailed, workflow_id).await;
    }

    /// Dispatch a non-blocking, workflow-scoped lifecycle event (anything
    /// other than `workflow:pre`, which can abort the run).
    async fn fire_lifecycle_hook(&self, event: HookEvent, workflow_id: &WorkflowId) {
        let payload = forge_hooks::build_payload(
            event,
            None,
            HashMap::from([("workflow_id".to_string(), serde_json::Value::String(workflow_id.to_string()))]),
        );
        match self.hooks.dispatch(event, None, payload).await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| !o.is_success()) {
                    tracing::warn!(workflow_id = %workflow_id, hook = %outcome.hook_id, event = event.name(), "workflow hook failed, continuing");
                }
            }
            Err(error) => tracing::warn!(workflow_id = %workflow_id, %error, event = event.name(), "workflow hook dispatch failed, continuing"),
        }
    }

    async fn fire_step_hook(&self, workflow_id: &WorkflowId, id: &StepId, transition: &str) {
        let payload = forge_hooks::build_payload(
            HookEvent::WorkflowStep,
            Some(id.as_str()),
            HashMap::from([
                ("workflow_id".to_string(), serde_json::Value::String(workflow_id.to_string())),
                ("transition".to_string(), serde_json::Value::String(transition.to_string())),
            ]),
        );
        match self.hooks.dispatch(HookEvent::WorkflowStep, Some(id.as_str()), payload).await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| !o.is_success()) {
                    tracing::warn!(workflow_id = %workflow_id, step = %id, hook = %outcome.hook_id, "workflow:step hook failed, continuing");
                }
            }
            Err(error) => tracing::warn!(workflow_id = %workflow_id, step = %id, %error, "workflow:step hook dispatch failed, continuing"),
        }
    }

    async fn execute(&self, state: &mut WorkflowState, order: &[StepId], workspace_root: PathBuf, cancel: CancellationToken) -> ForgeResult<()> {
        let timeout = Duration::from_secs(self.config.workflow_timeout_secs);
        match tokio::time::timeout(timeout, self.run_loop(state, order, workspace_root, cancel.clone())).await {
            Ok(inner) => inner,
            Err(_) => {
                let stalled: Vec<String> = state.running.iter().map(StepId::to_string).collect();
                state.status = WorkflowStatus::Failed;
                state.error = Some("workflow exceeded its wall-clock timeout".to_string());
                self.checkpoints.save(state).await?;
                cancel.cancel();
                Err(ForgeError::WorkflowTimeout {
                    step: if stalled.is_empty() { "<workflow>".to_string() } else { stalled.join(",") },
                })
            }
        }
    }

    async fn run_loop(&self, state: &mut WorkflowState, order: &[StepId], workspace_root: PathBuf, cancel: CancellationToken) -> ForgeResult<()> {
        let def = state.definition.clone();
        let total = def.steps.len();
        let continue_on_error = def.continue_on_error;

        let mut conditions: HashMap<StepId, Expr> = HashMap::new();
        for step in &def.steps {
            if let Some(text) = &step.condition {
                conditions.insert(step.id.clone(), condition::parse(text)?);
            }
        }

        let mut join_set: JoinSet<(StepId, StepRunOutcome)> = JoinSet::new();

        loop {
            self.cascade_skip_blocked(state, &def, continue_on_error).await?;

            let terminal_count = state.completed.len() + state.failed.len() + state.skipped.len();
            if terminal_count == total && join_set.is_empty() {
                break;
            }
            if !continue_on_error && !state.failed.is_empty() && join_set.is_empty() {
                break;
            }
            if cancel.is_cancelled() && join_set.is_empty() {
                break;
            }

            let ready = if cancel.is_cancelled() { Vec::new() } else { self.compute_ready(state, &def, order) };
            let mut launchable = Vec::new();
            for id in ready {
                match conditions.get(&id) {
                    Some(expr) => {
                        let (result, warnings) = condition::evaluate(expr, &state.condition_env());
                        for warning in warnings {
                            self.publish_warning(&state.workflow_id, warning);
                        }
                        if result {
                            launchable.push(id);
                        } else {
                            state.record_skipped(id.clone());
                            self.checkpoints.save(state).await?;
                            self.publish_step_end(&state.workflow_id, &id, true).await;
                        }
                    }
                    None => launchable.push(id),
                }
            }

            let slots = self.config.max_parallel_steps.saturating_sub(state.running.len() + join_set.len());
            for id in launchable.into_iter().take(slots) {
                let step = def.step(&id).expect("validated step id").clone();
                state.mark_running(id.clone());
                self.checkpoints.save(state).await?;
                self.publish_step_start(&state.workflow_id, &id).await;

                let llm = self.llm.clone();
                let gateway = self.gateway.clone();
                let budgeter = self.budgeter.clone();
                let hooks = self.hooks.clone();
                let agent_types = self.agent_types.clone();
                let pool = self.pool.clone();
                let event_bus = self.event_bus.clone();
                let workflow_id = state.workflow_id.clone();
                let root = workspace_root.clone();
                let step_cancel = cancel.clone();

                join_set.spawn(async move {
                    let outcome = run_step(llm, gateway, budgeter, hooks, agent_types, pool, event_bus, workflow_id, root, step, step_cancel).await;
                    (id, outcome)
                });
            }

            if join_set.is_empty() {
                if state.running.is_empty() {
                    let terminal_count = state.completed.len() + state.failed.len() + state.skipped.len();
                    if terminal_count == total {
                        break;
                    }
                    return Err(ForgeError::Internal(
                        "workflow scheduler stalled: no step is ready, running, or terminal".to_string(),
                    ));
                }
                continue;
            }

            if let Some(joined) = join_set.join_next().await {
                let (id, outcome) = joined.map_err(|e| ForgeError::Internal(format!("step task panicked: {e}")))?;
                let success = outcome.success;
                state.record_result(id.clone(), outcome.into_step_result());
                self.checkpoints.save(state).await?;
                self.publish_step_end(&state.workflow_id, &id, success).await;
                self.publish_progress(&state.workflow_id, state, total);
            }
        }

        state.status = if cancel.is_cancelled() {
            WorkflowStatus::Cancelled
        } else if state.failed.is_empty() {
            WorkflowStatus::Completed
        } else if continue_on_error {
            WorkflowStatus::Partial
        } else {
            WorkflowStatus::Failed
        };
        self.checkpoints.save(state).await?;
        Ok(())
    }

    /// Mark as `skipped` every non-terminal, non-running step that
    /// transitively depends on a failed step, when `continue_on_error` is
    /// set. Left alone (blocked forever) when it is not — fail-fast exit
    /// in the caller handles that case instead.
    async fn cascade_skip_blocked(&self, state: &mut WorkflowState, def: &WorkflowDefinition, continue_on_error: bool) -> ForgeResult<()> {
        if !continue_on_error || state.failed.is_empty() {
            return Ok(());
        }
        loop {
            let mut newly_skipped = Vec::new();
            for step in &def.steps {
                if state.is_terminal_step(&step.id) || state.running.contains(&step.id) {
                    continue;
                }
                if step.depends_on.iter().any(|d| state.failed.contains(d) || state.skipped.contains(d)) {
                    newly_skipped.push(step.id.clone());
                }
            }
            if newly_skipped.is_empty() {
                break;
            }
            for id in newly_skipped {
                state.record_skipped(id.clone());
                self.checkpoints.save(state).await?;
                self.publish_step_end(&state.workflow_id, &id, true).await;
            }
        }
        Ok(())
    }

    fn compute_ready(&self, state: &WorkflowState, def: &WorkflowDefinition, order: &[StepId]) -> Vec<StepId> {
        order
            .iter()
            .filter(|id| !state.is_terminal_step(id) && !state.running.contains(id))
            .filter(|id| {
                let step = def.step(id).expect("validated step id");
                step.depends_on.iter().all(|d| state.completed.contains(d) || state.skipped.contains(d))
            })
            .cloned()
            .collect()
    }

    async fn publish_step_start(&self, workflow_id: &WorkflowId, id: &StepId) {
        self.event_bus.publish(ForgeEvent::StepStart {
            metadata: EventMetadata::bare(),
            step_id: id.to_string(),
        });
        self.fire_step_hook(workflow_id, id, "started").await;
    }

    async fn publish_step_end(&self, workflow_id: &WorkflowId, id: &StepId, success: bool) {
        self.event_bus.publish(ForgeEvent::StepEnd {
            metadata: EventMetadata::bare(),
            step_id: id.to_string(),
            success,
        });
        self.fire_step_hook(workflow_id, id, if success { "completed" } else { "failed" }).await;
    }

    fn publish_progress(&self, _workflow_id: &WorkflowId, state: &WorkflowState, total: usize) {
        self.event_bus.publish(ForgeEvent::WorkflowProgress {
            metadata: EventMetadata::bare(),
            completed: state.completed.len() + state.failed.len() + state.skipped.len(),
            total,
        });
    }

    fn publish_warning(&self, _workflow_id: &WorkflowId, message: String) {
        self.event_bus.publish(ForgeEvent::Warning { metadata: EventMetadata::bare(), message });
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_step(
    llm: Arc<dyn LlmProvider>,
    gateway: Arc<ToolGateway>,
    budgeter: Arc<TokenBudgeter>,
    hooks: Arc<HookDispatcher>,
    agent_types: Arc<AgentTypeRegistry>,
    pool: Arc<SubAgentPool>,
    event_bus: Arc<EventBus>,
    workflow_id: WorkflowId,
    workspace_root: PathBuf,
    step: Step,
    cancel: CancellationToken,
) -> StepRunOutcome {
    let started_at = chrono::Utc::now();

    let Some(agent_def) = agent_types.get(&step.agent_type).cloned() else {
        return StepRunOutcome {
            agent_run_id: None,
            success: false,
            result: None,
            error: Some(format!("agent type '{}' is no longer registered", step.agent_type)),
            started_at,
            ended_at: chrono::Utc::now(),
        };
    };

    let handle = match pool.spawn(step.agent_type.clone(), step.task_template.clone(), None).await {
        Ok(handle) => handle,
        Err(e) => {
            return StepRunOutcome { agent_run_id: None, success: false, result: None, error: Some(e.to_string()), started_at, ended_at: chrono::Utc::now() };
        }
    };

    let mut session = Session::new(Some(llm.model().to_string()));
    session.push_message(Message::user(step.task_template.clone()));

    let tool_ctx = ToolContext::new(workspace_root, handle.id.to_string(), event_bus)
        .for_run(forge_core::SessionId::new(), handle.id.clone());

    let runtime = AgentRuntime::new(llm, gateway, budgeter, hooks);
    handle.mark_running().await;

    let outcome = runtime.run(&mut session, &agent_def.prompt_template, &[], Some(&agent_def.allowed_tools), &agent_def.caps, &tool_ctx, cancel).await;

    let (agent_run_id, success, result, error) = match outcome {
        Ok(run_outcome) => {
            let success = run_outcome.status == RunStatus::Completed;
            let text = run_outcome.output.clone().unwrap_or_default();
            let result = if text.is_empty() { None } else { Some(output_to_result_value(&text)) };
            handle.complete(run_outcome).await;
            (Some(handle.id.clone()), success, result, if success { None } else { Some(format!("step '{}' did not complete", step.id)) })
        }
        Err(e) => {
            handle.fail(e.to_string()).await;
            (Some(handle.id.clone()), false, None, Some(e.to_string()))
        }
    };
    pool.release(&handle.id).await;

    let _ = workflow_id;
    StepRunOutcome { agent_run_id, success, result, error, started_at, ended_at: chrono::Utc::now() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_events::EventBus;
    use forge_hooks::{DispatcherConfig, HookDispatcher};
    use forge_llm::{LlmResponse, LlmResult, LlmToolDefinition, StreamBox, StreamEvent};
    use forge_permissions::{PermissionResolver, RateLimitConfig};
    use forge_runtime::register_builtin_presets;
    use forge_tools::ToolRegistry;
    use futures::stream;
    use tempfile::TempDir;

    struct EchoProvider;

    #[async_trait::async_trait]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }
        fn model(&self) -> &str {
            "echo-model"
        }
        async fn stream(&self, _messages: &[Message], _tools: &[LlmToolDefinition], _system: &str) -> LlmResult<StreamBox> {
            Ok(Box::pin(stream::iter(vec![Ok(StreamEvent::TextDelta("done".to_string())), Ok(StreamEvent::Done)])))
        }
        async fn complete(&self, _messages: &[Message], _tools: &[LlmToolDefinition], _system: &str) -> LlmResult<LlmResponse> {
            unimplemented!()
        }
        fn max_context_length(&self) -> usize {
            50_000
        }
    }

    fn engine(config_dir: &std::path::Path) -> WorkflowEngine {
        let registry = Arc::new(ToolRegistry::new());
        let permissions = Arc::new(PermissionResolver::new(Vec::new(), Vec::new(), RateLimitConfig::default()));
        let hooks = Arc::new(HookDispatcher::new(Vec::new(), DispatcherConfig::default()));
        let gateway = Arc::new(ToolGateway::new(registry, permissions, hooks.clone()));
        let mut agent_types = AgentTypeRegistry::new();
        register_builtin_presets(&mut agent_types).unwrap();

        WorkflowEngine::new(
            Arc::new(EchoProvider),
            gateway,
            Arc::new(TokenBudgeter::new()),
            hooks,
            Arc::new(agent_types),
            Arc::new(SubAgentPool::new(10, 5)),
            Arc::new(EventBus::new()),
            forge_config::WorkflowSection::default(),
            config_dir,
        )
    }

    #[tokio::test]
    async fn runs_a_chain_to_completion() {
        let dir = TempDir::new().unwrap();
        let eng = engine(dir.path());
        let def = WorkflowDefinition::from_yaml(
            r#"
name: chain
version: "1"
steps:
  - id: a
    agent_type: general-purpose
    task_template: "do a"
  - id: b
    agent_type: general-purpose
    task_template: "do b"
    depends_on: [a]
"#,
        )
        .unwrap();

        let state = eng.run(def, dir.path().to_path_buf(), CancellationToken::new()).await.unwrap();
        assert_eq!(state.status, WorkflowStatus::Completed);
        assert_eq!(state.completed.len(), 2);
        assert!(state.failed.is_empty());
    }

    #[tokio::test]
    async fn skips_a_step_whose_condition_is_false() {
        let dir = TempDir::new().unwrap();
        let eng = engine(dir.path());
        let def = WorkflowDefinition::from_yaml(
            r#"
name: conditional
version: "1"
steps:
  - id: a
    agent_type: general-purpose
    task_template: "do a"
  - id: b
    agent_type: general-purpose
    task_template: "do b"
    depends_on: [a]
    condition: "a.missing_field == 1"
"#,
        )
        .unwrap();

        let state = eng.run(def, dir.path().to_path_buf(), CancellationToken::new()).await.unwrap();
        assert_eq!(state.status, WorkflowStatus::Completed);
        assert_eq!(state.completed, vec![StepId::new("a")]);
        assert_eq!(state.skipped, vec![StepId::new("b")]);
    }

    #[tokio::test]
    async fn checkpoint_is_loadable_after_a_run() {
        let dir = TempDir::new().unwrap();
        let eng = engine(dir.path());
        let def = WorkflowDefinition::from_yaml(
            r#"
name: single
version: "1"
steps:
  - id: only
    agent_type: general-purpose
    task_template: "do it"
"#,
        )
        .unwrap();

        let state = eng.run(def, dir.path().to_path_buf(), CancellationToken::new()).await.unwrap();
        let store = WorkflowCheckpointStore::new(dir.path());
        let loaded = store.load(&state.workflow_id).await.unwrap();
        assert_eq!(loaded.status, WorkflowStatus::Completed);
    }

    #[tokio::test]
    async fn rejects_an_invalid_definition_before_running_anything() {
        let dir = TempDir::new().unwrap();
        let eng = engine(dir.path());
        let def = WorkflowDefinition::from_yaml(
            r#"
name: bad
version: "1"
steps:
  - id: a
    agent_type: not-a-real-type
    task_template: "do a"
"#,
        )
        .unwrap();

        let err = eng.run(def, dir.path().to_path_buf(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ForgeError::WorkflowInvalid(_)));
    }

    #[tokio::test]
    async fn a_cancelled_token_stops_the_run_before_completion() {
        let dir = TempDir::new().unwrap();
        let eng = engine(dir.path());
        let def = WorkflowDefinition::from_yaml(
            r#"
name: chain
version: "1"
steps:
  - id: a
    agent_type: general-purpose
    task_template: "do a"
  - id: b
    agent_type: general-purpose
    task_template: "do b"
    depends_on: [a]
"#,
        )
        .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let state = eng.run(def, dir.path().to_path_buf(), cancel).await.unwrap();
        assert_eq!(state.status, WorkflowStatus::Cancelled);
        assert!(state.completed.is_empty());
    }
}
