//! Tool descriptors: the registry-keyed unit the gateway dispatches to.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ToolContext;

/// Errors a handler itself can raise, distinct from the gateway-level
/// rejections (unknown tool, schema validation, permission, hook-blocked)
/// that never reach a handler at all.
///
/// The gateway canonicalises these into a `ToolCallResult{success:false,...}`
/// handed back to the LLM, sanitising the message first.
#[derive(Debug, Clone)]
pub enum HandlerError {
    /// The handler rejected its own arguments beyond what schema validation
    /// can express (e.g. a path that must be absolute).
    InvalidArguments(String),
    /// A referenced resource (file, directory) does not exist.
    NotFound(String),
    /// The handler ran but the operation failed.
    ExecutionFailed(String),
    /// This tool is a registered descriptor but has no working
    /// implementation (e.g. `web_search`), documenting an external
    /// contract boundary rather than a bug.
    NotImplemented,
}

impl HandlerError {
    /// Render a message safe to show the LLM: [`HandlerError::NotImplemented`]
    /// gets a fixed string, everything else passes its message through
    /// (the gateway sanitises it further before this reaches the caller).
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::InvalidArguments(m) | Self::NotFound(m) | Self::ExecutionFailed(m) => m.clone(),
            Self::NotImplemented => "this tool is not implemented".to_string(),
        }
    }
}

/// A built-in tool handler, invoked directly in-process (as opposed to an
/// MCP server tool, which is out of scope for this core).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool against validated arguments.
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String, HandlerError>;
}

/// A registered tool: its schema, policy, and handler.
pub struct ToolDescriptor {
    /// Registry key and on-the-wire tool name.
    pub name: &'static str,
    /// Human-readable description surfaced to the LLM.
    pub description: &'static str,
    /// JSON schema the gateway validates arguments against.
    pub schema: Value,
    /// Per-call timeout; `None` defers to the gateway's configured default.
    pub timeout: Option<Duration>,
    /// When true, argument objects may carry fields the schema does not
    /// declare (rejected by default).
    pub lenient_unknown_fields: bool,
    handler: Box<dyn ToolHandler>,
}

impl ToolDescriptor {
    /// Register a tool with default policy (default timeout, strict schema).
    pub fn new(name: &'static str, description: &'static str, schema: Value, handler: impl ToolHandler + 'static) -> Self {
        Self {
            name,
            description,
            schema,
            timeout: None,
            lenient_unknown_fields: false,
            handler: Box::new(handler),
        }
    }

    /// Override this descriptor's per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Opt this descriptor into lenient unknown-field handling.
    #[must_use]
    pub fn lenient(mut self) -> Self {
        self.lenient_unknown_fields = true;
        self
    }

    pub(crate) async fn invoke(&self, args: Value, ctx: &ToolContext) -> Result<String, HandlerError> {
        self.handler.call(args, ctx).await
    }
}
