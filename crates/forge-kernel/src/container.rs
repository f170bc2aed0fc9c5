//! The Dependencies Container (C1–C10): constructs every substrate
//! component in dependency order, wires them together, freezes the tool
//! registry, and hands the result to the kernel's CLI-surface methods.
//!
//! Construction order, leaves first:
//!
//! 1. Event Bus
//! 2. Tool Registry (built-ins registered, not yet frozen)
//! 3. Permission Resolver (project/user rules loaded from disk)
//! 4. Hook Dispatcher (project/user hooks loaded from disk)
//! 5. Token Budgeter
//! 6. Agent Type Registry (built-in presets registered, frozen)
//! 7. Sub-Agent Pool
//! 8. LLM Provider
//! 9. Tool Gateway
//! 10. Task tool, registered into the Tool Registry, which is then frozen
//!
//! Steps 9 and 10 appear reversed from the registry's point of view: the
//! Task tool needs a gateway to dispatch a child run's own tool calls, and
//! that gateway wraps this very registry. The Task tool is built with its
//! gateway unbound, registered as tool number nine, and only then is the
//! registry frozen and the real gateway constructed and bound onto it —
//! see [`forge_runtime::TaskTool::bind_gateway`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use forge_core::{AgentRunId, WorkflowId};
use forge_events::EventBus;
use forge_hooks::{DispatcherConfig, Hook, HookDispatcher};
use forge_llm::{ClaudeProvider, LlmProvider, OpenAiCompatProvider, ProviderConfig};
use forge_permissions::{PermissionResolver, PermissionRule, RateLimitConfig};
use forge_runtime::{register_builtin_presets, AgentTypeRegistry, SubAgentPool, TaskTool, TaskToolHandle, TokenBudgeter};
use forge_session::SessionStore;
use forge_tools::{builtin::register_defaults, ToolDescriptor, ToolGateway, ToolRegistry};
use forge_workflow::WorkflowEngine;
use tokio_util::sync::CancellationToken;

use crate::error::{KernelError, KernelResult};

/// Every wired-up component a running process needs, plus the live-run
/// bookkeeping (`cancel`) the CLI-surface methods consult.
pub struct Container {
    /// Merged, validated configuration this container was built from.
    pub config: forge_config::Config,
    /// Workspace root tool calls and named-workflow lookups resolve against.
    pub workspace_root: PathBuf,
    /// Root directory durable state (sessions, workflow checkpoints, rule
    /// files) is persisted under.
    pub config_dir: PathBuf,
    /// Shared event bus every run publishes onto.
    pub event_bus: Arc<EventBus>,
    /// Frozen tool registry, including the Task tool.
    pub registry: Arc<ToolRegistry>,
    /// Tool Gateway built over the frozen registry.
    pub gateway: Arc<ToolGateway>,
    /// Permission Resolver.
    pub permissions: Arc<PermissionResolver>,
    /// Hook Dispatcher.
    pub hooks: Arc<HookDispatcher>,
    /// Token Budgeter.
    pub budgeter: Arc<TokenBudgeter>,
    /// Frozen agent type registry.
    pub agent_types: Arc<AgentTypeRegistry>,
    /// Sub-agent pool.
    pub pool: Arc<SubAgentPool>,
    /// Selected LLM provider.
    pub llm: Arc<dyn LlmProvider>,
    /// Durable session persistence.
    pub sessions: Arc<SessionStore>,
    /// Workflow engine.
    pub workflow_engine: Arc<WorkflowEngine>,
    /// Cancellation tokens for in-flight top-level agent runs, keyed by
    /// the id handed back from [`crate::Kernel::run`].
    pub run_cancellations: Arc<DashMap<AgentRunId, CancellationToken>>,
    /// Cancellation tokens for in-flight workflow runs.
    pub workflow_cancellations: Arc<DashMap<WorkflowId, CancellationToken>>,
}

impl Container {
    /// Wire up every substrate component for a process rooted at
    /// `workspace_root`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] if configuration fails to load or validate,
    /// a rules file exists but is not valid YAML, or the configured
    /// provider has no usable API key.
    pub async fn bootstrap(workspace_root: PathBuf) -> KernelResult<Self> {
        let config = forge_config::load(Some(&workspace_root), None)?;
        let config_dir = forge_core::dirs::config_dir()?;
        tokio::fs::create_dir_all(&config_dir).await.map_err(KernelError::Io)?;

        let event_bus = Arc::new(EventBus::with_capacity(config.events.channel_capacity));

        let mut registry = ToolRegistry::new();
        register_defaults(&mut registry);

        let project_rules = load_permission_rules(&forge_core::dirs::project_permissions_path(&workspace_root)).await?;
        let user_rules = load_permission_rules(&forge_core::dirs::user_permissions_path(&config_dir)).await?;
        let rate_limits = RateLimitConfig {
            denial_threshold: config.rate_limits.denial_threshold,
            window: std::time::Duration::from_secs(config.rate_limits.window_seconds),
            cooldown: std::time::Duration::from_secs(config.rate_limits.cooldown_seconds),
        };
        let permissions = Arc::new(PermissionResolver::new(project_rules, user_rules, rate_limits));

        let mut project_hooks = load_hooks(&forge_core::dirs::project_hooks_path(&workspace_root)).await?;
        let mut user_hooks = load_hooks(&forge_core::dirs::hooks_config_path(&config_dir)).await?;
        project_hooks.append(&mut user_hooks);
        let dispatcher_config = DispatcherConfig {
            default_timeout: std::time::Duration::from_millis(config.hooks.default_timeout_ms),
            kill_grace: std::time::Duration::from_millis(config.hooks.kill_grace_ms),
            retryable_exit_codes: Vec::new(),
            dry_run: config.hooks.dry_run,
        };
        let hooks = Arc::new(HookDispatcher::new(project_hooks, dispatcher_config));

        let budgeter = Arc::new(TokenBudgeter::new());

        let mut agent_types = AgentTypeRegistry::new();
        register_builtin_presets(&mut agent_types).map_err(KernelError::Forge)?;
        agent_types.freeze();
        let agent_types = Arc::new(agent_types);

        let pool = Arc::new(SubAgentPool::new(config.subagents.max_concurrent, config.runtime.max_depth));

        let llm = build_provider(&config.model)?;

        let task_tool = Arc::new(TaskTool::new(llm.clone(), budgeter.clone(), hooks.clone(), agent_types.clone(), pool.clone()));
        registry.register(ToolDescriptor::new("task", TaskTool::DESCRIPTION, TaskTool::schema(), TaskToolHandle(task_tool.clone())));
        registry.freeze();
        let registry = Arc::new(registry);

        let gateway = Arc::new(ToolGateway::new(registry.clone(), permissions.clone(), hooks.clone()));
        task_tool.bind_gateway(gateway.clone());

        let sessions = Arc::new(SessionStore::new(config_dir.clone(), hooks.clone()));

        let workflow_engine = Arc::new(WorkflowEngine::new(
            llm.clone(),
            gateway.clone(),
            budgeter.clone(),
            hooks.clone(),
            agent_types.clone(),
            pool.clone(),
            event_bus.clone(),
            config.workflow.clone(),
            config_dir.clone(),
        ));

        Ok(Self {
            config,
            workspace_root,
            config_dir,
            event_bus,
            registry,
            gateway,
            permissions,
            hooks,
            budgeter,
            agent_types,
            pool,
            llm,
            sessions,
            workflow_engine,
            run_cancellations: Arc::new(DashMap::new()),
            workflow_cancellations: Arc::new(DashMap::new()),
        })
    }
}

fn build_provider(model: &forge_config::ModelConfig) -> KernelResult<Arc<dyn LlmProvider>> {
    match model.provider.as_str() {
        "claude" => {
            let api_key = model.api_key.clone().ok_or_else(|| KernelError::MissingApiKey("claude".to_string()))?;
            let mut cfg = ProviderConfig::new(api_key, model.model.clone()).max_tokens(model.max_tokens).temperature(model.temperature);
            if let Some(window) = model.context_window {
                cfg = cfg.context_window(window);
            }
            if let Some(url) = &model.api_url {
                cfg = cfg.base_url(url.clone());
            }
            Ok(Arc::new(ClaudeProvider::new(cfg)))
        }
        "openai-compat" => {
            let base_url = model.api_url.clone().unwrap_or_default();
            let mut provider = match (&model.api_key, base_url.is_empty()) {
                (Some(key), false) => OpenAiCompatProvider::custom(&base_url, Some(key), &model.model),
                (Some(key), true) => OpenAiCompatProvider::openai(key, &model.model),
                (None, false) => OpenAiCompatProvider::custom(&base_url, None, &model.model),
                (None, true) => OpenAiCompatProvider::lm_studio_with_model(&model.model),
            };
            provider = provider.with_max_tokens(model.max_tokens).with_temperature(model.temperature);
            if let Some(window) = model.context_window {
                provider = provider.with_max_context(window);
            }
            Ok(Arc::new(provider))
        }
        other => Err(KernelError::UnknownProvider(other.to_string())),
    }
}

async fn load_permission_rules(path: &Path) -> KernelResult<Vec<PermissionRule>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => serde_yaml::from_str(&text).map_err(|source| KernelError::RulesFile { path: path.display().to_string(), source }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(KernelError::Io(e)),
    }
}

async fn load_hooks(path: &Path) -> KernelResult<Vec<Hook>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => serde_yaml::from_str(&text).map_err(|source| KernelError::RulesFile { path: path.display().to_string(), source }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(KernelError::Io(e)),
    }
}
