//! The Tool Gateway: the single choke-point every tool call passes through,
//! whether it originates from the LLM, a sub-agent, a workflow step, or a
//! slash command.

use std::sync::Arc;
use std::time::Duration;

use forge_core::message::{ToolCall, ToolCallResult};
use forge_core::{ForgeError, ForgeResult};
use forge_events::{EventMetadata, ForgeEvent, PermissionDecision, PermissionPromptRequest, DEFAULT_PROMPT_TIMEOUT};
use forge_hooks::{HookDispatcher, HookError, HookEvent};
use forge_permissions::{PermissionLevel, PermissionResolver};
use tracing::warn;

use crate::context::ToolContext;
use crate::descriptor::HandlerError;
use crate::registry::ToolRegistry;
use crate::sanitize::sanitize_message;

/// Default per-call timeout applied when a descriptor does not override it.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// The Tool Gateway.
pub struct ToolGateway {
    registry: Arc<ToolRegistry>,
    permissions: Arc<PermissionResolver>,
    hooks: Arc<HookDispatcher>,
    default_timeout: Duration,
}

impl ToolGateway {
    /// Build a gateway over a frozen registry.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, permissions: Arc<PermissionResolver>, hooks: Arc<HookDispatcher>) -> Self {
        Self {
            registry,
            permissions,
            hooks,
            default_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Override the gateway-wide default per-call timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run the nine-step pipeline for one tool call.
    ///
    /// Gateway-level rejections (unknown tool, schema validation, permission
    /// denial, hook-blocked) are returned as `Err`. A handler-level failure —
    /// the handler ran but failed, or timed out — is folded into
    /// `Ok(ToolCallResult{is_error:true,...})` so the LLM sees a normal tool
    /// result and can recover, per spec.
    pub async fn dispatch(&self, call: &ToolCall, ctx: &ToolContext) -> ForgeResult<ToolCallResult> {
        // 1. Resolve.
        let descriptor = self.registry.get(&call.name).ok_or_else(|| ForgeError::ToolUnknown { name: call.name.clone() })?;

        // 2. Schema validation.
        crate::schema::validate(&descriptor.schema, &call.arguments, descriptor.lenient_unknown_fields).map_err(|reason| ForgeError::ToolValidation {
            tool: call.name.clone(),
            reason,
        })?;

        // 3. Permission check.
        let decision = self.permissions.check(&call.name, &call.arguments, &ctx.principal);
        match decision.level {
            PermissionLevel::Deny => {
                self.permissions.record_denial(&call.name, &ctx.principal);
                self.fire_permission_denied(&call.name, &decision.reason).await;
                return Err(ForgeError::PermissionDenied {
                    action: call.name.clone(),
                    resource: decision.reason,
                });
            }
            PermissionLevel::Ask => {
                let request = PermissionPromptRequest::new(&call.name, call.arguments.to_string(), decision.reason.clone());
                let prompt_decision = ctx
                    .event_bus
                    .request_permission(request, ctx.metadata(), DEFAULT_PROMPT_TIMEOUT)
                    .await;
                if prompt_decision == PermissionDecision::Deny {
                    self.permissions.record_denial(&call.name, &ctx.principal);
                    self.fire_permission_denied(&call.name, "user denied").await;
                    return Err(ForgeError::PermissionDenied {
                        action: call.name.clone(),
                        resource: "user denied".to_string(),
                    });
                }
            }
            PermissionLevel::Allow => {}
        }

        // 4. Fire tool:pre hook (blocking).
        let payload = forge_hooks::build_payload(HookEvent::ToolPre, Some(&call.name), std::collections::HashMap::from([("arguments".to_string(), call.arguments.clone())]));
        if let Err(HookError::Blocked { reason, .. }) = self.hooks.dispatch(HookEvent::ToolPre, Some(&call.name), payload).await {
            return Err(ForgeError::PermissionDenied {
                action: call.name.clone(),
                resource: format!("hook-blocked: {reason}"),
            });
        }

        ctx.event_bus.publish(ForgeEvent::ToolStart {
            metadata: ctx.metadata(),
            call_id: call.id.clone(),
            tool: call.name.clone(),
        });
        let started = std::time::Instant::now();

        // 5 & 6. Per-call timeout + invoke.
        let timeout = descriptor.timeout.unwrap_or(self.default_timeout);
        let outcome = tokio::time::timeout(timeout, descriptor.invoke(call.arguments.clone(), ctx)).await;

        // 7. Canonicalize errors.
        let result = match outcome {
            Ok(Ok(content)) => ToolCallResult::success(call.id.clone(), content),
            Ok(Err(HandlerError::NotImplemented)) => {
                return Err(ForgeError::ToolNotImplemented { tool: call.name.clone() });
            }
            Ok(Err(err)) => ToolCallResult::error(call.id.clone(), sanitize_message(&err.message(), &ctx.workspace_root)),
            Err(_elapsed) => ToolCallResult::error(call.id.clone(), format!("tool `{}` timed out after {}ms", call.name, timeout.as_millis())),
        };

        ctx.event_bus.publish(ForgeEvent::ToolEnd {
            metadata: ctx.metadata(),
            call_id: call.id.clone(),
            tool: call.name.clone(),
            is_error: result.is_error,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });

        // 8. Fire tool:post hook (non-blocking: failures are logged, not raised).
        let post_payload = forge_hooks::build_payload(
            HookEvent::ToolPost,
            Some(&call.name),
            std::collections::HashMap::from([("is_error".to_string(), serde_json::Value::Bool(result.is_error))]),
        );
        match self.hooks.dispatch(HookEvent::ToolPost, Some(&call.name), post_payload).await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| !o.is_success()) {
                    warn!(tool = %call.name, hook = %outcome.hook_id, "tool:post hook failed, continuing");
                }
            }
            Err(e) => warn!(tool = %call.name, error = %e, "tool:post hook dispatch failed, continuing"),
        }

        // 9. Recording the invocation in the session is the caller's (Agent
        // Runtime's) job once it holds the ToolCallResult: the gateway has
        // already emitted the ToolStart/ToolEnd pair above for anything
        // listening on the Event Bus.

        Ok(result)
    }

    /// Fire `permission:denied` (non-blocking: the denial already happened,
    /// this just notifies external hooks it occurred).
    async fn fire_permission_denied(&self, tool: &str, reason: &str) {
        let payload = forge_hooks::build_payload(
            HookEvent::PermissionDenied,
            Some(tool),
            std::collections::HashMap::from([("reason".to_string(), serde_json::Value::String(reason.to_string()))]),
        );
        match self.hooks.dispatch(HookEvent::PermissionDenied, Some(tool), payload).await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| !o.is_success()) {
                    warn!(tool, hook = %outcome.hook_id, "permission:denied hook failed, continuing");
                }
            }
            Err(e) => warn!(tool, error = %e, "permission:denied hook dispatch failed, continuing"),
        }
    }
}
