//! Request-scoped correlation: a stable id and component/operation name
//! carried through a `tracing::Span`, so every log line emitted while the
//! span is entered can be grepped back to the run that produced it.

use std::time::Instant;

use tracing::Span;
use uuid::Uuid;

/// A correlation id plus the component/operation it was minted for.
#[derive(Debug, Clone)]
pub struct RequestContext {
    component: String,
    operation: Option<String>,
    request_id: Uuid,
}

impl RequestContext {
    /// Start a context for `component` (e.g. `"agent_runtime"`,
    /// `"workflow_engine"`), minting a fresh request id.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: None,
            request_id: Uuid::new_v4(),
        }
    }

    /// Narrow the context to a specific operation within the component.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// The correlation id, stable for the life of this context.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Build the `tracing::Span` this context's fields are attached to.
    /// Entering it (`span.enter()`) makes `request_id`/`component`/
    /// `operation` visible on every log event recorded within.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            component = %self.component,
            operation = self.operation.as_deref().unwrap_or("-"),
        )
    }

    /// Enter the span and start timing; the returned [`RequestGuard`]
    /// logs the elapsed duration when it drops.
    #[must_use]
    pub fn enter(&self) -> RequestGuard {
        RequestGuard {
            _span_guard: self.span().entered(),
            started_at: Instant::now(),
            component: self.component.clone(),
        }
    }
}

/// Holds an entered span for the life of a request; logs elapsed duration
/// on drop, including the unwind/early-return path.
pub struct RequestGuard {
    _span_guard: tracing::span::EnteredSpan,
    started_at: Instant,
    component: String,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        tracing::debug!(component = %self.component, elapsed_ms = self.started_at.elapsed().as_millis(), "request complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_carries_a_stable_request_id() {
        let ctx = RequestContext::new("agent_runtime").with_operation("run");
        let id = ctx.request_id();
        assert_eq!(ctx.request_id(), id);
    }

    #[test]
    fn entering_a_context_does_not_panic() {
        let ctx = RequestContext::new("workflow_engine");
        let _guard = ctx.enter();
    }
}
