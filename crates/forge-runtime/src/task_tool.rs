//! The Task tool: the first-class tool descriptor through which an agent
//! spawns a sub-agent of a registered type and, optionally, waits for it.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use forge_core::message::Message;
use forge_llm::LlmProvider;
use forge_session::Session;
use forge_tools::{HandlerError, ToolContext, ToolGateway, ToolHandler};
use serde_json::Value;

use crate::agent_type::AgentTypeRegistry;
use crate::budget::TokenBudgeter;
use crate::runtime::AgentRuntime;
use crate::subagent::SubAgentPool;

/// Number of trailing transcript messages copied into a child run when
/// `inherit_context` is set.
const INHERIT_CONTEXT_DEPTH: usize = 20;

/// Spawns a sub-agent of a registered [`crate::agent_type::AgentTypeDefinition`]
/// and, by default, waits for it to reach a terminal state.
///
/// Arguments: `{agent_type, task, wait = true, inherit_context = false,
/// use_rag = true}`. The child's tool whitelist is enforced at the child's
/// own `AgentRuntime::run` call, not here — a sub-agent cannot escape its
/// whitelist by forging tool calls, because the whitelist check happens
/// inside the child's own dispatch loop regardless of who constructed it.
///
/// The gateway is bound after construction, via [`Self::bind_gateway`],
/// rather than taken as a constructor argument: the gateway this tool
/// dispatches child tool calls through wraps the very registry this tool's
/// own descriptor is registered into, so it cannot exist yet when the
/// descriptor is built.
pub struct TaskTool {
    llm: Arc<dyn LlmProvider>,
    gateway: OnceLock<Arc<ToolGateway>>,
    budgeter: Arc<TokenBudgeter>,
    hooks: Arc<forge_hooks::HookDispatcher>,
    agent_types: Arc<AgentTypeRegistry>,
    pool: Arc<SubAgentPool>,
}

impl TaskTool {
    /// Build a Task tool over the shared runtime dependencies every child
    /// `AgentRuntime` is constructed from. Call [`Self::bind_gateway`]
    /// before the first dispatch.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>, budgeter: Arc<TokenBudgeter>, hooks: Arc<forge_hooks::HookDispatcher>, agent_types: Arc<AgentTypeRegistry>, pool: Arc<SubAgentPool>) -> Self {
        Self { llm, gateway: OnceLock::new(), budgeter, hooks, agent_types, pool }
    }

    /// Bind the gateway child runs dispatch their tool calls through.
    /// Idempotent: a second call is ignored once a gateway is already bound.
    pub fn bind_gateway(&self, gateway: Arc<ToolGateway>) {
        let _ = self.gateway.set(gateway);
    }

    /// Description surfaced to the LLM.
    pub const DESCRIPTION: &'static str = "Launches a sub-agent of a named type to carry out a task, optionally waiting for its result.";

    /// JSON schema for this tool's arguments.
    #[must_use]
    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "agent_type": {
                    "type": "string",
                    "description": "Registered agent type to spawn, e.g. \"code-review\" or \"test-runner\""
                },
                "task": {
                    "type": "string",
                    "description": "The task description / initiating prompt for the sub-agent"
                },
                "wait": {
                    "type": "boolean",
                    "description": "If true (default), block until the sub-agent reaches a terminal state and return its output"
                },
                "inherit_context": {
                    "type": "boolean",
                    "description": "If true, seed the sub-agent with a copy of this agent's recent conversation"
                },
                "use_rag": {
                    "type": "boolean",
                    "description": "If true (default), pass this agent's RAG retriever handle through to the sub-agent, when one is attached"
                }
            },
            "required": ["agent_type", "task"]
        })
    }
}

/// Newtype wrapping a shared [`TaskTool`] so it can be registered as a tool
/// descriptor: `impl ToolHandler for Arc<TaskTool>` would hit the orphan
/// rule, since neither `ToolHandler` nor `Arc` is local to this crate.
pub struct TaskToolHandle(pub Arc<TaskTool>);

#[async_trait]
impl ToolHandler for TaskToolHandle {
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String, HandlerError> {
        self.0.call(args, ctx).await
    }
}

#[async_trait]
impl ToolHandler for TaskTool {
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String, HandlerError> {
        let agent_type = args.get("agent_type").and_then(Value::as_str).ok_or_else(|| HandlerError::InvalidArguments("agent_type is required".into()))?;
        let task = args.get("task").and_then(Value::as_str).ok_or_else(|| HandlerError::InvalidArguments("task is required".into()))?;
        let wait = args.get("wait").and_then(Value::as_bool).unwrap_or(true);
        let inherit_context = args.get("inherit_context").and_then(Value::as_bool).unwrap_or(false);
        let use_rag = args.get("use_rag").and_then(Value::as_bool).unwrap_or(true);

        let def = self.agent_types.get(agent_type).ok_or_else(|| HandlerError::InvalidArguments(format!("unknown agent type: {agent_type}")))?;
        let prompt_template = def.prompt_template.clone();
        let caps = def.caps;
        let allowed: HashSet<String> = def.allowed_tools.clone();

        let parent_handle = match &ctx.agent_run_id {
            Some(id) => self.pool.get(id).await,
            None => None,
        };

        let handle = self
            .pool
            .spawn(agent_type.to_string(), task.to_string(), parent_handle.as_deref())
            .await
            .map_err(|e| HandlerError::ExecutionFailed(e.to_string()))?;

        let mut child_session = Session::new(Some(self.llm.model().to_string()));
        if inherit_context {
            let transcript = ctx.transcript.read().await.clone();
            let start = transcript.len().saturating_sub(INHERIT_CONTEXT_DEPTH);
            for message in &transcript[start..] {
                child_session.push_message(message.clone());
            }
        }
        child_session.push_message(Message::user(task.to_string()));

        let mut child_ctx = ToolContext::with_shared_cwd(ctx.workspace_root.clone(), ctx.cwd.clone(), handle.id.to_string(), ctx.event_bus.clone())
            .for_run(ctx.session_id.clone().unwrap_or_default(), handle.id.clone());
        if use_rag {
            child_ctx.rag_handle = ctx.rag_handle.clone();
        }

        let gateway = self.gateway.get().cloned().ok_or_else(|| HandlerError::ExecutionFailed("task tool dispatched before a gateway was bound".into()))?;
        let runtime = AgentRuntime::new(self.llm.clone(), gateway, self.budgeter.clone(), self.hooks.clone());
        let cancel = handle.cancellation_token();
        handle.mark_running().await;

        if wait {
            let outcome = runtime.run(&mut child_session, &prompt_template, &[], Some(&allowed), &caps, &child_ctx, cancel).await;
            match outcome {
                Ok(run_outcome) => {
                    let output = run_outcome.output.clone().unwrap_or_default();
                    handle.complete(run_outcome).await;
                    self.pool.release(&handle.id).await;
                    Ok(output)
                }
                Err(error) => {
                    handle.fail(error.to_string()).await;
                    self.pool.release(&handle.id).await;
                    Err(HandlerError::ExecutionFailed(error.to_string()))
                }
            }
        } else {
            let id = handle.id.to_string();
            let pool = self.pool.clone();
            let release_id = handle.id.clone();
            tokio::spawn(async move {
                let outcome = runtime.run(&mut child_session, &prompt_template, &[], Some(&allowed), &caps, &child_ctx, cancel).await;
                match outcome {
                    Ok(run_outcome) => handle.complete(run_outcome).await,
                    Err(error) => handle.fail(error.to_string()).await,
                }
                pool.release(&release_id).await;
            });
            Ok(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_type::register_builtin_presets;
    use async_trait::async_trait as at;
    use forge_events::EventBus;
    use forge_hooks::{DispatcherConfig, HookDispatcher};
    use forge_llm::{LlmResponse, LlmResult, LlmToolDefinition, StreamBox, StreamEvent};
    use forge_permissions::{PermissionResolver, RateLimitConfig};
    use forge_tools::ToolRegistry;
    use futures::stream;
    use std::path::PathBuf;

    struct EchoProvider;

    #[at]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }
        fn model(&self) -> &str {
            "echo-model"
        }
        async fn stream(&self, _messages: &[Message], _tools: &[LlmToolDefinition], _system: &str) -> LlmResult<StreamBox> {
            Ok(Box::pin(stream::iter(vec![Ok(StreamEvent::TextDelta("child done".to_string())), Ok(StreamEvent::Done)])))
        }
        async fn complete(&self, _messages: &[Message], _tools: &[LlmToolDefinition], _system: &str) -> LlmResult<LlmResponse> {
            unimplemented!()
        }
        fn max_context_length(&self) -> usize {
            50_000
        }
    }

    fn task_tool() -> TaskTool {
        let registry = Arc::new(ToolRegistry::new());
        let permissions = Arc::new(PermissionResolver::new(Vec::new(), Vec::new(), RateLimitConfig::default()));
        let hooks = Arc::new(HookDispatcher::new(Vec::new(), DispatcherConfig::default()));
        let gateway = Arc::new(ToolGateway::new(registry, permissions, hooks.clone()));
        let mut agent_types = AgentTypeRegistry::new();
        register_builtin_presets(&mut agent_types).unwrap();
        let tool = TaskTool::new(Arc::new(EchoProvider), Arc::new(TokenBudgeter::new()), hooks, Arc::new(agent_types), Arc::new(SubAgentPool::new(10, 5)));
        tool.bind_gateway(gateway);
        tool
    }

    fn ctx() -> ToolContext {
        ToolContext::new(PathBuf::from("/tmp/forge-task-test"), "test", Arc::new(EventBus::new()))
    }

    #[tokio::test]
    async fn unknown_agent_type_is_invalid_arguments() {
        let tool = task_tool();
        let result = tool.call(serde_json::json!({"agent_type": "not-a-type", "task": "do it"}), &ctx()).await;
        assert!(matches!(result, Err(HandlerError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn waiting_spawn_returns_child_output() {
        let tool = task_tool();
        let result = tool.call(serde_json::json!({"agent_type": "general-purpose", "task": "say hi"}), &ctx()).await.unwrap();
        assert_eq!(result, "child done");
    }

    #[tokio::test]
    async fn fire_and_forget_spawn_returns_an_id() {
        let tool = task_tool();
        let result = tool.call(serde_json::json!({"agent_type": "general-purpose", "task": "say hi", "wait": false}), &ctx()).await.unwrap();
        assert!(uuid::Uuid::parse_str(&result).is_ok());
    }
}
