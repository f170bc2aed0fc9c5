//! Error taxonomy shared across the agent execution substrate.

use thiserror::Error;

/// Errors that can occur anywhere in the substrate's core operations.
///
/// Every variant has a stable [`ErrorKind`] accessible via [`ForgeError::kind`]
/// so callers (CLI exit codes, telemetry, scripting) can match on a string
/// that will not change even if the human-readable message is reworded.
#[derive(Debug, Error)]
pub enum ForgeError {
    // Tool Gateway errors
    /// A tool call referenced a name not present in the frozen registry
    #[error("unknown tool: {name}")]
    ToolUnknown {
        /// The tool name that was not found
        name: String,
    },

    /// Tool call arguments failed schema validation
    #[error("tool argument validation failed for {tool}: {reason}")]
    ToolValidation {
        /// The tool whose arguments failed validation
        tool: String,
        /// Why validation failed
        reason: String,
    },

    /// Tool is not available to the calling execution context (e.g. a
    /// sub-agent whitelist excludes it)
    #[error("tool restricted: {tool} is not permitted in this context")]
    ToolRestricted {
        /// The restricted tool name
        tool: String,
    },

    /// A tool handler has not been implemented (documents an external
    /// contract boundary rather than signalling a bug)
    #[error("tool not implemented: {tool}")]
    ToolNotImplemented {
        /// The tool name
        tool: String,
    },

    /// Tool execution itself failed (distinct from gateway-level rejection)
    #[error("tool execution failed for {tool}: {reason}")]
    ToolExecution {
        /// The tool that failed
        tool: String,
        /// Why execution failed
        reason: String,
    },

    // Permission errors
    /// The permission resolver denied the requested action
    #[error("permission denied: {action} on {resource}")]
    PermissionDenied {
        /// The action that was attempted
        action: String,
        /// The resource the action targeted
        resource: String,
    },

    // Hook dispatcher errors
    /// A hook process did not complete within its configured timeout
    #[error("hook timed out after {timeout_ms}ms: {hook}")]
    HookTimeout {
        /// The hook name
        hook: String,
        /// The configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// A hook process exited non-zero or otherwise failed
    #[error("hook failed: {hook}: {reason}")]
    HookFailed {
        /// The hook name
        hook: String,
        /// Why the hook failed
        reason: String,
    },

    // LLM provider errors
    /// The LLM response stream ended unexpectedly or emitted malformed data
    #[error("LLM stream error: {0}")]
    LlmStreamError(String),

    /// The LLM provider rejected credentials
    #[error("LLM authentication failed: {0}")]
    LlmAuth(String),

    /// The LLM provider is rate limiting this client
    #[error("LLM rate limited, retry after {retry_after_ms}ms")]
    LlmRateLimit {
        /// Suggested backoff before retrying, in milliseconds
        retry_after_ms: u64,
    },

    /// The LLM provider is unreachable or returned a server error
    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    // Resource cap errors
    /// A configured resource cap (tokens, wall time, tool calls, iterations)
    /// was exceeded
    #[error("limit exceeded: {limit} (cap {cap}, reached {reached})")]
    LimitExceeded {
        /// Which limit was exceeded
        limit: String,
        /// The configured cap
        cap: u64,
        /// The value reached when the cap tripped
        reached: u64,
    },

    /// Sub-agent Task-call recursion exceeded the configured depth bound
    #[error("task recursion depth exceeded: max {max}")]
    DepthExceeded {
        /// The configured maximum depth
        max: u32,
    },

    // Workflow engine errors
    /// Workflow validation detected a dependency cycle
    #[error("workflow cycle detected: {path}")]
    WorkflowCycle {
        /// The cycle, rendered as `a -> b -> c -> a`
        path: String,
    },

    /// Workflow definition failed validation for a reason other than a cycle
    #[error("invalid workflow: {0}")]
    WorkflowInvalid(String),

    /// A workflow step did not complete within its configured timeout
    #[error("workflow step timed out: {step}")]
    WorkflowTimeout {
        /// The step that timed out
        step: String,
    },

    // Session store errors
    /// A session file on disk failed to parse or its backups were exhausted
    #[error("session corrupt: {session_id}: {reason}")]
    SessionCorrupt {
        /// The session identifier
        session_id: String,
        /// Why the session was judged corrupt
        reason: String,
    },

    // Cooperative cancellation
    /// The operation was cancelled cooperatively (not a failure)
    #[error("cancelled")]
    Cancelled,

    // I/O and serialization passthrough
    /// Filesystem I/O failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for failures that do not fit a more specific variant
    #[error("internal error: {0}")]
    Internal(String),
}

/// Stable, scriptable error code for a [`ForgeError`].
///
/// These strings are part of the external contract: they must not change
/// once released, even if the associated `Display` message is reworded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`ForgeError::ToolUnknown`]
    ToolUnknown,
    /// See [`ForgeError::ToolValidation`]
    ToolValidation,
    /// See [`ForgeError::ToolRestricted`]
    ToolRestricted,
    /// See [`ForgeError::ToolNotImplemented`]
    ToolNotImplemented,
    /// See [`ForgeError::ToolExecution`]
    ToolExecution,
    /// See [`ForgeError::PermissionDenied`]
    PermissionDenied,
    /// See [`ForgeError::HookTimeout`]
    HookTimeout,
    /// See [`ForgeError::HookFailed`]
    HookFailed,
    /// See [`ForgeError::LlmStreamError`]
    LlmStreamError,
    /// See [`ForgeError::LlmAuth`]
    LlmAuth,
    /// See [`ForgeError::LlmRateLimit`]
    LlmRateLimit,
    /// See [`ForgeError::LlmUnavailable`]
    LlmUnavailable,
    /// See [`ForgeError::LimitExceeded`]
    LimitExceeded,
    /// See [`ForgeError::DepthExceeded`]
    DepthExceeded,
    /// See [`ForgeError::WorkflowCycle`]
    WorkflowCycle,
    /// See [`ForgeError::WorkflowInvalid`]
    WorkflowInvalid,
    /// See [`ForgeError::WorkflowTimeout`]
    WorkflowTimeout,
    /// See [`ForgeError::SessionCorrupt`]
    SessionCorrupt,
    /// See [`ForgeError::Cancelled`]
    Cancelled,
    /// See [`ForgeError::Io`]
    Io,
    /// See [`ForgeError::Serialization`]
    Serialization,
    /// See [`ForgeError::Internal`]
    Internal,
}

impl ErrorKind {
    /// The stable string form of this kind, e.g. `"TOOL_UNKNOWN"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToolUnknown => "TOOL_UNKNOWN",
            Self::ToolValidation => "TOOL_VALIDATION",
            Self::ToolRestricted => "TOOL_RESTRICTED",
            Self::ToolNotImplemented => "TOOL_NOT_IMPLEMENTED",
            Self::ToolExecution => "TOOL_EXECUTION",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::HookTimeout => "HOOK_TIMEOUT",
            Self::HookFailed => "HOOK_FAILED",
            Self::LlmStreamError => "LLM_STREAM_ERROR",
            Self::LlmAuth => "LLM_AUTH",
            Self::LlmRateLimit => "LLM_RATE_LIMIT",
            Self::LlmUnavailable => "LLM_UNAVAILABLE",
            Self::LimitExceeded => "LIMIT_EXCEEDED",
            Self::DepthExceeded => "DEPTH_EXCEEDED",
            Self::WorkflowCycle => "WORKFLOW_CYCLE",
            Self::WorkflowInvalid => "WORKFLOW_INVALID",
            Self::WorkflowTimeout => "WORKFLOW_TIMEOUT",
            Self::SessionCorrupt => "SESSION_CORRUPT",
            Self::Cancelled => "CANCELLED",
            Self::Io => "IO",
            Self::Serialization => "SERIALIZATION",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ForgeError {
    /// The stable machine-readable kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ToolUnknown { .. } => ErrorKind::ToolUnknown,
            Self::ToolValidation { .. } => ErrorKind::ToolValidation,
            Self::ToolRestricted { .. } => ErrorKind::ToolRestricted,
            Self::ToolNotImplemented { .. } => ErrorKind::ToolNotImplemented,
            Self::ToolExecution { .. } => ErrorKind::ToolExecution,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::HookTimeout { .. } => ErrorKind::HookTimeout,
            Self::HookFailed { .. } => ErrorKind::HookFailed,
            Self::LlmStreamError(_) => ErrorKind::LlmStreamError,
            Self::LlmAuth(_) => ErrorKind::LlmAuth,
            Self::LlmRateLimit { .. } => ErrorKind::LlmRateLimit,
            Self::LlmUnavailable(_) => ErrorKind::LlmUnavailable,
            Self::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            Self::WorkflowCycle { .. } => ErrorKind::WorkflowCycle,
            Self::WorkflowInvalid(_) => ErrorKind::WorkflowInvalid,
            Self::WorkflowTimeout { .. } => ErrorKind::WorkflowTimeout,
            Self::SessionCorrupt { .. } => ErrorKind::SessionCorrupt,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_) => ErrorKind::Io,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the operation that produced this error might succeed.
    ///
    /// Only transient provider/hook failures are retryable; tool and
    /// permission errors are not (retrying them reproduces the same
    /// decision).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LlmRateLimit { .. } | Self::LlmUnavailable(_) | Self::HookTimeout { .. }
        )
    }
}

/// Result alias used throughout the substrate's core and dependent crates.
pub type ForgeResult<T> = Result<T, ForgeError>;
