//! Configuration struct definitions.
//!
//! This module has no dependency on any other internal crate: it is pure
//! data, deserialized from TOML, with every section implementing
//! [`Default`] so a bare `[section]` header (or an absent one) yields a
//! working configuration.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Root Config
// ---------------------------------------------------------------------------

/// Root configuration for the agent execution substrate.
///
/// Loaded from layered TOML files (embedded defaults, user, project) with
/// environment variable fallbacks. Every section defaults to a working
/// configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider selection and request parameters.
    pub model: ModelConfig,
    /// Agent Runtime resource caps and loop behaviour.
    pub runtime: RuntimeSection,
    /// Permission Resolver rate-limit lockout knobs.
    pub rate_limits: RateLimitsSection,
    /// Hook Dispatcher policy.
    pub hooks: HooksSection,
    /// Logging level and format.
    pub logging: LoggingSection,
    /// Session Store retention and backup policy.
    pub sessions: SessionsSection,
    /// Sub-Agent Manager pool limits.
    pub subagents: SubagentsSection,
    /// Workflow Engine scheduling limits.
    pub workflow: WorkflowSection,
    /// Event Bus buffer sizing and prompt timeout.
    pub events: EventsSection,
    /// Retry behaviour for transient LLM/hook failures.
    pub retry: RetrySection,
    /// Workspace boundary the Tool Gateway enforces for filesystem tools.
    pub workspace: WorkspaceSection,
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// LLM provider selection and request parameters.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider identifier (`"claude"`, `"openai-compat"`).
    pub provider: String,
    /// Model name sent to the provider API.
    pub model: String,
    /// API key. Prefer `FORGE_LLM_API_KEY` over storing this in a file.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL override (required for OpenAI-compatible self-hosted providers).
    #[serde(skip_serializing)]
    pub api_url: Option<String>,
    /// Maximum tokens requested per completion.
    pub max_tokens: usize,
    /// Sampling temperature.
    pub temperature: f64,
    /// Context window size in tokens; overrides the built-in per-model
    /// registry when the provider/model pair is not recognized.
    pub context_window: Option<usize>,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .field("has_api_url", &self.api_url.is_some())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("context_window", &self.context_window)
            .finish()
    }
}

impl Serialize for ModelConfig {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ModelConfig", 5)?;
        state.serialize_field("provider", &self.provider)?;
        state.serialize_field("model", &self.model)?;
        // api_key and api_url are intentionally omitted from the serialized form.
        state.serialize_field("max_tokens", &self.max_tokens)?;
        state.serialize_field("temperature", &self.temperature)?;
        state.serialize_field("context_window", &self.context_window)?;
        state.end()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "claude".to_owned(),
            model: "claude-sonnet-4-20250514".to_owned(),
            api_key: None,
            api_url: None,
            max_tokens: 4096,
            temperature: 0.7,
            context_window: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RuntimeSection
// ---------------------------------------------------------------------------

/// Agent Runtime resource caps, checked every loop iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Maximum total tokens (input + output) for one agent run.
    pub max_tokens: u64,
    /// Maximum wall-clock seconds for one agent run.
    pub max_wall_seconds: u64,
    /// Maximum tool calls for one agent run.
    pub max_tool_calls: u64,
    /// Maximum LLM-loop iterations for one agent run.
    pub max_iterations: u64,
    /// Maximum Task-tool recursion depth (sub-agents spawning sub-agents).
    pub max_depth: u32,
    /// Maximum tool calls dispatched in parallel within one iteration.
    pub tool_fan_out: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            max_tokens: 200_000,
            max_wall_seconds: 600,
            max_tool_calls: 200,
            max_iterations: 100,
            max_depth: 5,
            tool_fan_out: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// RateLimitsSection
// ---------------------------------------------------------------------------

/// Permission Resolver rate-limit lockout knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitsSection {
    /// Denials within `window_seconds` before lockout trips.
    pub denial_threshold: u32,
    /// Sliding window width, in seconds, over which denials are counted.
    pub window_seconds: u64,
    /// How long a tripped lockout forces DENY, in seconds.
    pub cooldown_seconds: u64,
}

impl Default for RateLimitsSection {
    fn default() -> Self {
        Self {
            denial_threshold: 10,
            window_seconds: 60,
            cooldown_seconds: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// HooksSection
// ---------------------------------------------------------------------------

/// Hook Dispatcher policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksSection {
    /// Default per-hook timeout in milliseconds, used when a hook
    /// definition does not specify its own.
    pub default_timeout_ms: u64,
    /// Grace period between SIGTERM and SIGKILL when a hook times out.
    pub kill_grace_ms: u64,
    /// Maximum retry attempts for a hook that failed transiently.
    pub max_retries: u32,
    /// When true, hooks are resolved and logged but never actually spawned.
    pub dry_run: bool,
}

impl Default for HooksSection {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            kill_grace_ms: 2_000,
            max_retries: 2,
            dry_run: false,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging level and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing-subscriber` env-filter directive, e.g. `"forge=debug,info"`.
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionsSection
// ---------------------------------------------------------------------------

/// Session Store retention and backup policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsSection {
    /// Maximum number of rotating backups retained per session.
    pub max_backups: usize,
    /// Maximum age, in days, before a backup is pruned regardless of count.
    pub backup_max_age_days: u64,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            max_backups: 100,
            backup_max_age_days: 7,
        }
    }
}

// ---------------------------------------------------------------------------
// SubagentsSection
// ---------------------------------------------------------------------------

/// Sub-Agent Manager pool limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubagentsSection {
    /// Maximum sub-agents running concurrently under one parent run.
    pub max_concurrent: usize,
}

impl Default for SubagentsSection {
    fn default() -> Self {
        Self { max_concurrent: 5 }
    }
}

// ---------------------------------------------------------------------------
// WorkflowSection
// ---------------------------------------------------------------------------

/// Workflow Engine scheduling limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSection {
    /// Maximum workflow steps running concurrently.
    pub max_parallel_steps: usize,
    /// Default per-step timeout in seconds when a step omits one.
    pub default_step_timeout_secs: u64,
    /// Wall-clock timeout, in seconds, for an entire workflow run. Once
    /// reached, every still-running step's sub-agent is cancelled and the
    /// workflow's state becomes `failed` with a `WORKFLOW_TIMEOUT` error.
    pub workflow_timeout_secs: u64,
    /// Maximum steps a single workflow definition may declare.
    pub max_steps: usize,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            max_parallel_steps: 5,
            default_step_timeout_secs: 300,
            workflow_timeout_secs: 3600,
            max_steps: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// EventsSection
// ---------------------------------------------------------------------------

/// Event Bus buffer sizing and permission-prompt timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsSection {
    /// Bounded broadcast buffer capacity, per agent.
    pub channel_capacity: usize,
    /// Seconds a permission prompt waits before resolving to deny.
    pub prompt_timeout_secs: u64,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            prompt_timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// RetrySection
// ---------------------------------------------------------------------------

/// Retry behaviour for transient LLM/hook failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Maximum retry attempts for a transient LLM provider failure.
    pub llm_max_attempts: u32,
    /// Maximum retry attempts for a transient hook failure.
    pub hook_max_attempts: u32,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            llm_max_attempts: 3,
            hook_max_attempts: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkspaceSection
// ---------------------------------------------------------------------------

/// Workspace boundary enforced by filesystem-touching built-in tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSection {
    /// Root directory filesystem tools may read and write under. `None`
    /// means the process's current working directory at startup.
    pub root: Option<String>,
    /// Whether filesystem tools may follow symlinks that escape `root`.
    pub allow_symlink_escape: bool,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            root: None,
            allow_symlink_escape: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_internally_consistent() {
        let config = Config::default();
        assert_eq!(config.model.provider, "claude");
        assert_eq!(config.runtime.max_depth, 5);
        assert_eq!(config.rate_limits.denial_threshold, 10);
    }

    #[test]
    fn model_config_serialization_redacts_secrets() {
        let mut model = ModelConfig::default();
        model.api_key = Some("sk-secret".to_owned());
        let json = serde_json::to_value(&model).unwrap();
        assert!(json.get("api_key").is_none());
        assert!(json.get("api_url").is_none());
    }

    #[test]
    fn model_config_debug_does_not_leak_secret_value() {
        let mut model = ModelConfig::default();
        model.api_key = Some("sk-secret".to_owned());
        let debug = format!("{model:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("has_api_key: true"));
    }
}
