//! The Agent Runtime: the LLM/tool operation loop.
//!
//! One [`AgentRuntime`] drives one [`forge_session::Session`] through
//! repeated assemble-prompt / stream / dispatch-tools cycles until the
//! assistant stops requesting tools, a resource cap trips, or the caller
//! cancels. Exactly one LLM call happens per assembled reply — the runtime
//! never re-calls the model to reconstruct a turn's tool calls.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use forge_core::message::{Message, ToolCall, ToolCallResult};
use forge_core::{ForgeError, ForgeResult, RetryConfig};
use forge_events::ForgeEvent;
use forge_hooks::{HookDispatcher, HookError, HookEvent};
use forge_llm::{LlmProvider, LlmToolDefinition, StreamEvent};
use forge_session::Session;
use forge_tools::{ToolContext, ToolGateway};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::budget::TokenBudgeter;
use crate::truncate::{self, TruncateStrategy};

/// Resource caps enforced at the top of every loop iteration, mirroring
/// `forge_config::RuntimeSection`.
#[derive(Debug, Clone, Copy)]
pub struct RunCaps {
    /// Maximum total tokens (input + output) for this run.
    pub max_tokens: u64,
    /// Maximum wall-clock duration for this run.
    pub max_wall: Duration,
    /// Maximum tool calls dispatched across this run.
    pub max_tool_calls: u64,
    /// Maximum LLM-loop iterations for this run.
    pub max_iterations: u64,
    /// Maximum tool calls dispatched concurrently within one iteration.
    pub tool_fan_out: usize,
}

impl From<&forge_config::RuntimeSection> for RunCaps {
    fn from(section: &forge_config::RuntimeSection) -> Self {
        Self {
            max_tokens: section.max_tokens,
            max_wall: Duration::from_secs(section.max_wall_seconds),
            max_tool_calls: section.max_tool_calls,
            max_iterations: section.max_iterations,
            tool_fan_out: section.tool_fan_out,
        }
    }
}

impl Default for RunCaps {
    fn default() -> Self {
        Self::from(&forge_config::RuntimeSection::default())
    }
}

/// Running usage counters for one agent run, checked against [`RunCaps`]
/// before every iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunUsage {
    /// Tokens consumed so far (prompt + completion, approximated).
    pub tokens: u64,
    /// Tool calls dispatched so far.
    pub tool_calls: u64,
    /// LLM-loop iterations completed so far.
    pub iterations: u64,
}

/// Terminal state of one [`AgentRuntime::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The assistant produced a final reply with no further tool calls.
    Completed,
    /// The caller's cancellation token fired before a terminal state.
    Cancelled,
}

/// The outcome of running an agent to a terminal state.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// How the run ended.
    pub status: RunStatus,
    /// The assistant's final text, if the run completed normally.
    pub output: Option<String>,
    /// Usage accumulated over the run.
    pub usage: RunUsage,
}

/// A chunk of a tool call's arguments, accumulated by id as the stream
/// reports `ToolCallStart`/`ToolCallDelta`/`ToolCallEnd` events.
struct PendingToolCall {
    id: String,
    name: String,
    args: String,
}

/// Why [`AgentRuntime::collect_turn`] failed, distinguishing a failure
/// before any chunk arrived (safe to retry) from one mid-stream (must not
/// be retried; whatever was collected is preserved as a partial message).
enum TurnFailure {
    BeforeStream(ForgeError),
    MidStream { partial: Message, error: ForgeError },
}

/// Drives one session through the LLM/tool loop.
///
/// Construct once per process (or per provider/config combination) and
/// reuse across runs; all state specific to a single run lives in the
/// `Session` and the caller-supplied `RunCaps`/`CancellationToken`.
pub struct AgentRuntime {
    llm: Arc<dyn LlmProvider>,
    gateway: Arc<ToolGateway>,
    budgeter: Arc<TokenBudgeter>,
    hooks: Arc<HookDispatcher>,
    truncate_strategy: TruncateStrategy,
}

impl AgentRuntime {
    /// Build a runtime over a provider, tool gateway, token budgeter, and
    /// hook dispatcher. Defaults to a `token-budget` then `smart` composite
    /// truncation strategy; override with [`Self::with_truncate_strategy`].
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>, gateway: Arc<ToolGateway>, budgeter: Arc<TokenBudgeter>, hooks: Arc<HookDispatcher>) -> Self {
        Self {
            llm,
            gateway,
            budgeter,
            hooks,
            truncate_strategy: TruncateStrategy::Composite(vec![TruncateStrategy::TokenBudget, TruncateStrategy::Smart { keep_last: 20 }]),
        }
    }

    /// Override the context-truncation strategy applied before each LLM
    /// call.
    #[must_use]
    pub fn with_truncate_strategy(mut self, strategy: TruncateStrategy) -> Self {
        self.truncate_strategy = strategy;
        self
    }

    /// Run the LLM/tool loop to a terminal state.
    ///
    /// `allowed_tools`, when `Some`, restricts which tool names may be
    /// dispatched (used for sub-agent whitelists); calls outside the
    /// whitelist fail `TOOL_RESTRICTED` without reaching the gateway.
    pub async fn run(
        &self,
        session: &mut Session,
        system_prompt: &str,
        tool_defs: &[LlmToolDefinition],
        allowed_tools: Option<&HashSet<String>>,
        caps: &RunCaps,
        tool_ctx: &ToolContext,
        cancel: CancellationToken,
    ) -> ForgeResult<RunOutcome> {
        let started = Instant::now();
        let mut usage = RunUsage::default();

        self.fire_pre_hook(HookEvent::AgentPre, tool_ctx).await?;

        let result = self.run_inner(session, system_prompt, tool_defs, allowed_tools, caps, tool_ctx, cancel, &mut usage, started).await;

        self.fire_post_hook(HookEvent::AgentPost, tool_ctx).await;
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_inner(
        &self,
        session: &mut Session,
        system_prompt: &str,
        tool_defs: &[LlmToolDefinition],
        allowed_tools: Option<&HashSet<String>>,
        caps: &RunCaps,
        tool_ctx: &ToolContext,
        cancel: CancellationToken,
        usage: &mut RunUsage,
        started: Instant,
    ) -> ForgeResult<RunOutcome> {
        loop {
            if cancel.is_cancelled() {
                return Ok(RunOutcome { status: RunStatus::Cancelled, output: None, usage: *usage });
            }
            if let Some(breach) = check_caps(caps, usage, started.elapsed()) {
                self.publish_error(tool_ctx, &breach);
                return Err(breach);
            }
            usage.iterations += 1;

            let context_budget = self.budgeter.allocate(self.llm.model(), self.llm.max_context_length());
            let fit = truncate::fit(&session.messages, context_budget.conversation, &self.truncate_strategy, self.llm.as_ref()).await?;

            let assistant = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Ok(RunOutcome { status: RunStatus::Cancelled, output: None, usage: *usage });
                }
                outcome = self.collect_turn_with_hooks(&fit.messages, tool_defs, system_prompt, tool_ctx) => {
                    match outcome {
                        Ok(message) => message,
                        Err(TurnFailure::MidStream { partial, error }) => {
                            session.push_message(partial);
                            self.publish_error(tool_ctx, &error);
                            return Err(error);
                        }
                        Err(TurnFailure::BeforeStream(error)) => {
                            self.publish_error(tool_ctx, &error);
                            return Err(error);
                        }
                    }
                }
            };

            usage.tokens = usage.tokens.saturating_add(self.budgeter.count_message(self.llm.as_ref(), &assistant) as u64);
            session.push_message(assistant.clone());
            *tool_ctx.transcript.write().await = session.messages.clone();

            let Some(tool_calls) = assistant.tool_calls().map(<[ToolCall]>::to_vec).filter(|calls| !calls.is_empty()) else {
                let text = assistant.text().unwrap_or_default().to_string();
                tool_ctx.event_bus.publish(ForgeEvent::FinalMessage { metadata: tool_ctx.metadata(), text: text.clone() });
                return Ok(RunOutcome { status: RunStatus::Completed, output: Some(text), usage: *usage });
            };

            let prospective_tool_calls = usage.tool_calls.saturating_add(tool_calls.len() as u64);
            if prospective_tool_calls > caps.max_tool_calls {
                let breach = ForgeError::LimitExceeded {
                    limit: "max_tool_calls".to_string(),
                    cap: caps.max_tool_calls,
                    reached: prospective_tool_calls,
                };
                self.publish_error(tool_ctx, &breach);
                return Err(breach);
            }
            usage.tool_calls = prospective_tool_calls;

            let results = self.dispatch_tool_calls(&tool_calls, allowed_tools, tool_ctx, caps.tool_fan_out, &cancel).await;
            for (call, result) in tool_calls.iter().zip(results) {
                session.push_message(Message::tool_result(result.clone()));
                session.record_tool_invocation(forge_session::ToolInvocationRecord {
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    success: !result.is_error,
                    completed_at: chrono::Utc::now(),
                });
            }
        }
    }

    /// Wrap [`Self::collect_turn`] with `llm:pre`/`llm:post` hook dispatch.
    /// A blocking `llm:pre` hook failure aborts before the provider is ever
    /// called; `llm:post` always fires, win or lose.
    async fn collect_turn_with_hooks(&self, messages: &[Message], tools: &[LlmToolDefinition], system: &str, tool_ctx: &ToolContext) -> Result<Message, TurnFailure> {
        if let Err(error) = self.fire_pre_hook(HookEvent::LlmPre, tool_ctx).await {
            return Err(TurnFailure::BeforeStream(error));
        }
        let result = self.collect_turn(messages, tools, system, tool_ctx).await;
        self.fire_post_hook(HookEvent::LlmPost, tool_ctx).await;
        result
    }

    /// Collect one LLM turn into a single assistant message, retrying a
    /// transient failure that occurs before any chunk is received. Once a
    /// chunk has arrived, a later failure is never retried: whatever text
    /// was collected is returned as a partial message for the caller to
    /// persist before propagating the error.
    async fn collect_turn(&self, messages: &[Message], tools: &[LlmToolDefinition], system: &str, tool_ctx: &ToolContext) -> Result<Message, TurnFailure> {
        let retry_config = RetryConfig::llm();
        let mut attempt = 0u32;
        loop {
            if tool_ctx.cancellation.is_cancelled() {
                return Err(TurnFailure::BeforeStream(ForgeError::Cancelled));
            }
            match self.try_collect_turn(messages, tools, system, tool_ctx).await {
                Ok(message) => return Ok(message),
                Err(TurnFailure::MidStream { partial, error }) => return Err(TurnFailure::MidStream { partial, error }),
                Err(TurnFailure::BeforeStream(error)) => {
                    if error.is_transient() && retry_config.should_retry(attempt) {
                        let delay = retry_config.delay_for_attempt(attempt + 1);
                        tracing::warn!(attempt, error = %error, delay_ms = delay.as_millis(), "retrying transient LLM error");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(TurnFailure::BeforeStream(error));
                }
            }
        }
    }

    async fn try_collect_turn(&self, messages: &[Message], tools: &[LlmToolDefinition], system: &str, tool_ctx: &ToolContext) -> Result<Message, TurnFailure> {
        let mut events = self.llm.stream(messages, tools, system).await.map_err(|e| TurnFailure::BeforeStream(e.into()))?;

        let mut text = String::new();
        let mut tool_calls: Vec<PendingToolCall> = Vec::new();
        let mut received_any = false;

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    if received_any {
                        return Err(TurnFailure::MidStream { partial: finalize_partial(&text), error: e.into() });
                    }
                    return Err(TurnFailure::BeforeStream(e.into()));
                }
            };
            received_any = true;

            match event {
                StreamEvent::TextDelta(delta) => {
                    tool_ctx.event_bus.publish(ForgeEvent::LlmChunk { metadata: tool_ctx.metadata(), delta: delta.clone() });
                    text.push_str(&delta);
                }
                StreamEvent::ReasoningDelta(_) => {}
                StreamEvent::ToolCallStart { id, name } => {
                    tool_calls.push(PendingToolCall { id, name, args: String::new() });
                }
                StreamEvent::ToolCallDelta { id, args_delta } => {
                    if let Some(call) = tool_calls.iter_mut().find(|c| c.id == id) {
                        call.args.push_str(&args_delta);
                    }
                }
                StreamEvent::ToolCallEnd { .. } | StreamEvent::Usage { .. } => {}
                StreamEvent::Done => break,
                StreamEvent::Error(message) => {
                    let error = ForgeError::LlmStreamError(message);
                    if received_any && (!text.is_empty() || !tool_calls.is_empty()) {
                        return Err(TurnFailure::MidStream { partial: finalize_partial(&text), error });
                    }
                    return Err(TurnFailure::BeforeStream(error));
                }
            }
        }

        if !received_any {
            return Err(TurnFailure::BeforeStream(ForgeError::LlmStreamError("stream closed with no events".to_string())));
        }

        Ok(finalize_message(text, tool_calls))
    }

    /// Dispatch a turn's tool calls. Calls are run concurrently up to
    /// `fan_out`, in emission order, with whitelist enforcement happening
    /// before the gateway is ever reached so a sub-agent cannot forge its
    /// way around a restriction by naming a tool the gateway would
    /// otherwise accept.
    async fn dispatch_tool_calls(&self, calls: &[ToolCall], allowed_tools: Option<&HashSet<String>>, tool_ctx: &ToolContext, fan_out: usize, cancel: &CancellationToken) -> Vec<ToolCallResult> {
        stream::iter(calls.iter().cloned())
            .map(|call| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return ToolCallResult::error(call.id.clone(), "cancelled".to_string());
                    }
                    if let Some(allowed) = allowed_tools {
                        if !allowed.contains(&call.name) {
                            let error = ForgeError::ToolRestricted { tool: call.name.clone() };
                            return ToolCallResult::error(call.id.clone(), error.to_string());
                        }
                    }
                    match self.gateway.dispatch(&call, tool_ctx).await {
                        Ok(result) => result,
                        Err(e) => ToolCallResult::error(call.id.clone(), e.to_string()),
                    }
                }
            })
            .buffered(fan_out.max(1))
            .collect()
            .await
    }

    fn hook_body(tool_ctx: &ToolContext) -> HashMap<String, serde_json::Value> {
        let mut body = HashMap::new();
        if let Some(session_id) = &tool_ctx.session_id {
            body.insert("session_id".to_string(), serde_json::Value::String(session_id.to_string()));
        }
        if let Some(run_id) = &tool_ctx.agent_run_id {
            body.insert("agent_run_id".to_string(), serde_json::Value::String(run_id.to_string()));
        }
        body
    }

    async fn fire_pre_hook(&self, event: HookEvent, tool_ctx: &ToolContext) -> ForgeResult<()> {
        let payload = forge_hooks::build_payload(event, None, Self::hook_body(tool_ctx));
        match self.hooks.dispatch(event, None, payload).await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| !o.is_success()) {
                    tracing::warn!(hook = %outcome.hook_id, event = event.name(), "pre hook failed, continuing");
                }
                Ok(())
            }
            Err(HookError::Blocked { hook, reason }) => {
                let error = ForgeError::PermissionDenied { action: event.name().to_string(), resource: format!("hook-blocked: {hook}: {reason}") };
                self.publish_error(tool_ctx, &error);
                Err(error)
            }
        }
    }

    async fn fire_post_hook(&self, event: HookEvent, tool_ctx: &ToolContext) {
        let payload = forge_hooks::build_payload(event, None, Self::hook_body(tool_ctx));
        match self.hooks.dispatch(event, None, payload).await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| !o.is_success()) {
                    tracing::warn!(hook = %outcome.hook_id, event = event.name(), "post hook failed, swallowed");
                }
            }
            Err(e) => tracing::warn!(error = %e, event = event.name(), "post hook dispatch failed, swallowed"),
        }
    }

    fn publish_error(&self, tool_ctx: &ToolContext, error: &ForgeError) {
        tool_ctx.event_bus.publish(ForgeEvent::Error { metadata: tool_ctx.metadata(), kind: error.kind().as_str().to_string(), message: error.to_string() });
    }
}

fn check_caps(caps: &RunCaps, usage: &RunUsage, elapsed: Duration) -> Option<ForgeError> {
    if usage.tokens > caps.max_tokens {
        return Some(ForgeError::LimitExceeded { limit: "max_tokens".to_string(), cap: caps.max_tokens, reached: usage.tokens });
    }
    if elapsed > caps.max_wall {
        return Some(ForgeError::LimitExceeded { limit: "max_wall_seconds".to_string(), cap: caps.max_wall.as_secs(), reached: elapsed.as_secs() });
    }
    if usage.iterations >= caps.max_iterations {
        return Some(ForgeError::LimitExceeded { limit: "max_iterations".to_string(), cap: caps.max_iterations, reached: usage.iterations + 1 });
    }
    None
}

fn finalize_message(text: String, pending: Vec<PendingToolCall>) -> Message {
    if pending.is_empty() {
        return Message::assistant(text);
    }
    let calls = pending
        .into_iter()
        .map(|p| {
            let arguments = serde_json::from_str(&p.args).unwrap_or_else(|_| serde_json::json!({}));
            ToolCall::new(p.id.into(), p.name).with_arguments(arguments)
        })
        .collect();
    Message::assistant_tool_calls(calls)
}

/// Build the partial assistant message preserved when a stream fails
/// mid-way: plain text only, with a trailing marker noting the
/// interruption. Partial tool-call argument JSON is almost always
/// truncated and unparseable, so it is not replayed as a tool call;
/// losing an in-flight tool call on a stream error is acceptable since the
/// run fails and is not resumed from here.
fn finalize_partial(text: &str) -> Message {
    if text.is_empty() {
        Message::assistant("[response interrupted]")
    } else {
        Message::assistant(format!("{text}\n[response interrupted]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forge_events::EventBus;
    use forge_hooks::DispatcherConfig;
    use forge_llm::{LlmResponse, LlmResult, StreamBox};
    use forge_permissions::{PermissionResolver, RateLimitConfig};
    use forge_tools::ToolRegistry;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;

    struct ScriptedProvider {
        turns: StdMutex<Vec<Vec<StreamEvent>>>,
    }

    impl ScriptedProvider {
        fn new(turns: Vec<Vec<StreamEvent>>) -> Self {
            Self { turns: StdMutex::new(turns) }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        fn model(&self) -> &str {
            "scripted-model"
        }
        async fn stream(&self, _messages: &[Message], _tools: &[LlmToolDefinition], _system: &str) -> LlmResult<StreamBox> {
            let next = self.turns.lock().expect("lock").remove(0);
            Ok(Box::pin(stream::iter(next.into_iter().map(Ok))))
        }
        async fn complete(&self, _messages: &[Message], _tools: &[LlmToolDefinition], _system: &str) -> LlmResult<LlmResponse> {
            unimplemented!()
        }
        fn max_context_length(&self) -> usize {
            100_000
        }
    }

    fn test_gateway() -> Arc<ToolGateway> {
        let registry = Arc::new(ToolRegistry::new());
        let permissions = Arc::new(PermissionResolver::new(Vec::new(), Vec::new(), RateLimitConfig::default()));
        let hooks = Arc::new(HookDispatcher::new(Vec::new(), DispatcherConfig::default()));
        Arc::new(ToolGateway::new(registry, permissions, hooks))
    }

    fn test_tool_ctx(event_bus: Arc<EventBus>) -> ToolContext {
        ToolContext::new(PathBuf::from("/tmp/forge-test"), "test", event_bus)
    }

    #[tokio::test]
    async fn completes_immediately_when_no_tool_calls_are_requested() {
        let llm = Arc::new(ScriptedProvider::new(vec![vec![StreamEvent::TextDelta("hello there".to_string()), StreamEvent::Done]]));
        let runtime = AgentRuntime::new(llm, test_gateway(), Arc::new(TokenBudgeter::new()), Arc::new(HookDispatcher::new(Vec::new(), DispatcherConfig::default())));

        let mut session = Session::new(None);
        session.push_message(Message::user("hi"));
        let event_bus = Arc::new(EventBus::new());
        let ctx = test_tool_ctx(event_bus);
        let caps = RunCaps::default();

        let outcome = runtime.run(&mut session, "system", &[], None, &caps, &ctx, CancellationToken::new()).await.expect("run succeeds");

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.output.as_deref(), Some("hello there"));
        assert_eq!(outcome.usage.iterations, 1);
    }

    #[tokio::test]
    async fn a_restricted_tool_call_fails_without_reaching_the_gateway() {
        let llm = Arc::new(ScriptedProvider::new(vec![
            vec![
                StreamEvent::ToolCallStart { id: "call_1".to_string(), name: "bash".to_string() },
                StreamEvent::ToolCallDelta { id: "call_1".to_string(), args_delta: "{\"command\":\"ls\"}".to_string() },
                StreamEvent::ToolCallEnd { id: "call_1".to_string() },
                StreamEvent::Done,
            ],
            vec![StreamEvent::TextDelta("done".to_string()), StreamEvent::Done],
        ]));
        let runtime = AgentRuntime::new(llm, test_gateway(), Arc::new(TokenBudgeter::new()), Arc::new(HookDispatcher::new(Vec::new(), DispatcherConfig::default())));

        let mut session = Session::new(None);
        session.push_message(Message::user("list files"));
        let event_bus = Arc::new(EventBus::new());
        let ctx = test_tool_ctx(event_bus);
        let caps = RunCaps::default();
        let whitelist: HashSet<String> = HashSet::new();

        let outcome = runtime.run(&mut session, "system", &[], Some(&whitelist), &caps, &ctx, CancellationToken::new()).await.expect("run succeeds");

        assert_eq!(outcome.status, RunStatus::Completed);
        let tool_result = session.messages.iter().find_map(|m| match &m.content {
            forge_core::Content::ToolResult(r) => Some(r.clone()),
            _ => None,
        });
        let tool_result = tool_result.expect("a tool-result message was recorded");
        assert!(tool_result.is_error);
        assert!(tool_result.content.contains("restricted"));
    }

    #[tokio::test]
    async fn a_tripped_resource_cap_fails_the_run_before_the_next_llm_call() {
        let llm = Arc::new(ScriptedProvider::new(vec![vec![StreamEvent::TextDelta("irrelevant".to_string()), StreamEvent::Done]]));
        let runtime = AgentRuntime::new(llm, test_gateway(), Arc::new(TokenBudgeter::new()), Arc::new(HookDispatcher::new(Vec::new(), DispatcherConfig::default())));

        let mut session = Session::new(None);
        session.push_message(Message::user("hi"));
        let event_bus = Arc::new(EventBus::new());
        let ctx = test_tool_ctx(event_bus);
        let caps = RunCaps { max_iterations: 0, ..RunCaps::default() };

        let result = runtime.run(&mut session, "system", &[], None, &caps, &ctx, CancellationToken::new()).await;
        let error = result.expect_err("zero max_iterations must fail immediately");
        assert_eq!(error.kind(), forge_core::ErrorKind::LimitExceeded);
    }

    #[tokio::test]
    async fn cancellation_before_the_first_iteration_yields_cancelled_status() {
        let llm = Arc::new(ScriptedProvider::new(vec![vec![StreamEvent::TextDelta("never seen".to_string()), StreamEvent::Done]]));
        let runtime = AgentRuntime::new(llm, test_gateway(), Arc::new(TokenBudgeter::new()), Arc::new(HookDispatcher::new(Vec::new(), DispatcherConfig::default())));

        let mut session = Session::new(None);
        session.push_message(Message::user("hi"));
        let event_bus = Arc::new(EventBus::new());
        let ctx = test_tool_ctx(event_bus);
        let caps = RunCaps::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = runtime.run(&mut session, "system", &[], None, &caps, &ctx, cancel).await.expect("cancellation is not an error");
        assert_eq!(outcome.status, RunStatus::Cancelled);
    }
}
