//! Context truncation: fitting a conversation history under a token
//! budget without breaking the assistant-tool-call / tool-result pairing
//! invariant.

use std::collections::HashSet;

use forge_core::message::{Content, Message, Role};
use forge_core::types::ToolCallId;
use forge_llm::LlmProvider;

use crate::budget::render_for_counting;

/// How [`fit`] should reduce a message list to fit a token budget.
#[derive(Debug, Clone)]
pub enum TruncateStrategy {
    /// Keep only the last `keep_last` messages (measured in atomic
    /// assistant-tool-call/tool-result units, so a unit is never split).
    SlidingWindow {
        /// Number of trailing units to retain.
        keep_last: usize,
    },
    /// Drop the oldest non-system units until the total fits the budget.
    TokenBudget,
    /// Keep the leading system message(s) and the last `keep_last` units,
    /// dropping a contiguous middle band and replacing it with a single
    /// placeholder message.
    Smart {
        /// Number of trailing units to retain unconditionally.
        keep_last: usize,
    },
    /// Drop individual tool-result messages whose content exceeds
    /// `max_tool_result_chars`, leaving their originating assistant
    /// message (and any other tool results in the same call) untouched.
    Selective {
        /// Byte length above which a tool-result message is dropped.
        max_tool_result_chars: usize,
    },
    /// Like [`TruncateStrategy::Smart`], but compress the dropped middle
    /// band into a single assistant summary message via the LLM instead
    /// of a static placeholder.
    Summarize {
        /// Number of trailing units to retain unconditionally.
        keep_last: usize,
    },
    /// Apply each strategy in order, stopping as soon as one brings the
    /// total under budget.
    Composite(Vec<TruncateStrategy>),
}

/// Result of a single [`fit`] call.
#[derive(Debug, Clone)]
pub struct TruncateOutcome {
    /// The (possibly reduced) message list.
    pub messages: Vec<Message>,
    /// Whether anything was actually dropped.
    pub was_truncated: bool,
    /// How many original messages were dropped (placeholders/summaries
    /// inserted are not counted).
    pub dropped_count: usize,
}

const ELISION_NOTICE: &str = "elided";

/// Fit `messages` under `budget` tokens according to `strategy`.
///
/// `provider` supplies the token counter; `Summarize` additionally uses it
/// to generate the compressed note, so it is the only strategy that can
/// fail — every other strategy is infallible.
///
/// # Errors
///
/// Returns an error only if a `Summarize` stage's LLM call fails.
pub async fn fit(
    messages: &[Message],
    budget: usize,
    strategy: &TruncateStrategy,
    provider: &dyn LlmProvider,
) -> forge_core::ForgeResult<TruncateOutcome> {
    let units = build_units(messages);

    match strategy {
        TruncateStrategy::SlidingWindow { keep_last } => Ok(sliding_window(messages, &units, *keep_last)),
        TruncateStrategy::TokenBudget => Ok(token_budget(messages, &units, budget, provider)),
        TruncateStrategy::Smart { keep_last } => Ok(smart(messages, &units, *keep_last)),
        TruncateStrategy::Selective { max_tool_result_chars } => Ok(selective(messages, *max_tool_result_chars)),
        TruncateStrategy::Summarize { keep_last } => summarize(messages, &units, *keep_last, provider).await,
        TruncateStrategy::Composite(stages) => {
            let mut current = messages.to_vec();
            let mut total_dropped = 0;
            let mut any_truncation = false;
            for stage in stages {
                let count = provider.count_tokens(&current.iter().map(render_for_counting).collect::<Vec<_>>().join("\n"));
                if count <= budget {
                    break;
                }
                let outcome = Box::pin(fit(&current, budget, stage, provider)).await?;
                total_dropped += outcome.dropped_count;
                any_truncation = any_truncation || outcome.was_truncated;
                current = outcome.messages;
            }
            Ok(TruncateOutcome { messages: current, was_truncated: any_truncation, dropped_count: total_dropped })
        }
    }
}

/// One atomic group of message indices: either a single ordinary message,
/// or an assistant tool-call message plus its immediately-following
/// matching tool-result messages. A unit is always kept or dropped whole,
/// which is what keeps the tool-call/tool-result pairing invariant intact
/// across every strategy below.
type Unit = Vec<usize>;

fn build_units(messages: &[Message]) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut i = 0;
    while i < messages.len() {
        if let Content::ToolCalls(calls) = &messages[i].content {
            let ids: HashSet<ToolCallId> = calls.iter().map(|c| c.id.clone()).collect();
            let mut idxs = vec![i];
            let mut j = i + 1;
            while j < messages.len() {
                let matches = matches!(&messages[j].content, Content::ToolResult(r) if ids.contains(&r.call_id));
                if !matches {
                    break;
                }
                idxs.push(j);
                j += 1;
            }
            units.push(idxs);
            i = j;
        } else {
            units.push(vec![i]);
            i += 1;
        }
    }
    units
}

fn collect(messages: &[Message], units: &[Unit], keep: impl Fn(usize) -> bool) -> (Vec<Message>, usize) {
    let mut kept = Vec::new();
    let mut dropped = 0;
    for (unit_idx, unit) in units.iter().enumerate() {
        if keep(unit_idx) {
            kept.extend(unit.iter().map(|&i| messages[i].clone()));
        } else {
            dropped += unit.len();
        }
    }
    (kept, dropped)
}

fn sliding_window(messages: &[Message], units: &[Unit], keep_last: usize) -> TruncateOutcome {
    let total = units.len();
    let start = total.saturating_sub(keep_last);
    let (kept, dropped) = collect(messages, units, |idx| idx >= start);
    TruncateOutcome { messages: kept, was_truncated: dropped > 0, dropped_count: dropped }
}

fn token_budget(messages: &[Message], units: &[Unit], budget: usize, provider: &dyn LlmProvider) -> TruncateOutcome {
    let unit_tokens: Vec<usize> = units
        .iter()
        .map(|unit| unit.iter().map(|&i| provider.count_tokens(&render_for_counting(&messages[i]))).sum())
        .collect();

    let mut keep = vec![true; units.len()];
    let mut total: usize = unit_tokens.iter().sum();

    for idx in 0..units.len() {
        if total <= budget {
            break;
        }
        let is_system = units[idx].iter().any(|&i| messages[i].role == Role::System);
        if is_system {
            continue;
        }
        keep[idx] = false;
        total -= unit_tokens[idx];
    }

    let (kept, dropped) = collect(messages, units, |idx| keep[idx]);
    TruncateOutcome { messages: kept, was_truncated: dropped > 0, dropped_count: dropped }
}

fn smart(messages: &[Message], units: &[Unit], keep_last: usize) -> TruncateOutcome {
    let leading_system = units.iter().take_while(|u| u.iter().all(|&i| messages[i].role == Role::System)).count();
    let tail_start = units.len().saturating_sub(keep_last).max(leading_system);

    if tail_start <= leading_system {
        let (kept, dropped) = collect(messages, units, |_| true);
        return TruncateOutcome { messages: kept, was_truncated: dropped > 0, dropped_count: dropped };
    }

    let (mut kept, dropped) = collect(messages, units, |idx| idx < leading_system || idx >= tail_start);
    if dropped > 0 {
        let placeholder = Message::system(format!("[... {dropped} messages {ELISION_NOTICE} ...]"));
        kept.insert(leading_system, placeholder);
    }
    TruncateOutcome { messages: kept, was_truncated: dropped > 0, dropped_count: dropped }
}

fn selective(messages: &[Message], max_tool_result_chars: usize) -> TruncateOutcome {
    let mut kept = Vec::with_capacity(messages.len());
    let mut dropped = 0;
    for message in messages {
        if message.role == Role::Tool {
            if let Content::ToolResult(result) = &message.content {
                if result.content.len() > max_tool_result_chars {
                    dropped += 1;
                    continue;
                }
            }
        }
        kept.push(message.clone());
    }
    TruncateOutcome { messages: kept, was_truncated: dropped > 0, dropped_count: dropped }
}

async fn summarize(
    messages: &[Message],
    units: &[Unit],
    keep_last: usize,
    provider: &dyn LlmProvider,
) -> forge_core::ForgeResult<TruncateOutcome> {
    let leading_system = units.iter().take_while(|u| u.iter().all(|&i| messages[i].role == Role::System)).count();
    let tail_start = units.len().saturating_sub(keep_last).max(leading_system);

    if tail_start <= leading_system {
        let (kept, dropped) = collect(messages, units, |_| true);
        return Ok(TruncateOutcome { messages: kept, was_truncated: dropped > 0, dropped_count: dropped });
    }

    let dropped_band: String = units[leading_system..tail_start]
        .iter()
        .flat_map(|u| u.iter())
        .map(|&i| render_for_counting(&messages[i]))
        .collect::<Vec<_>>()
        .join("\n---\n");

    let (mut kept, dropped) = collect(messages, units, |idx| idx < leading_system || idx >= tail_start);
    if dropped > 0 {
        let prompt = format!(
            "Summarize the following conversation excerpt into one concise note \
             preserving any decisions, facts, or file paths a later turn would need:\n\n{dropped_band}"
        );
        let summary = provider
            .complete_simple(&prompt)
            .await
            .map_err(|e| forge_core::ForgeError::Internal(format!("context summarization failed: {e}")))?;
        kept.insert(leading_system, Message::assistant(summary));
    }
    Ok(TruncateOutcome { messages: kept, was_truncated: dropped > 0, dropped_count: dropped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forge_core::message::ToolCall;
    use forge_core::message::ToolCallResult;
    use forge_llm::{LlmResponse, LlmResult, LlmToolDefinition, StreamBox};

    struct StubProvider;

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        fn model(&self) -> &str {
            "stub-model"
        }
        async fn stream(&self, _: &[Message], _: &[LlmToolDefinition], _: &str) -> LlmResult<StreamBox> {
            unimplemented!()
        }
        async fn complete(&self, _: &[Message], _: &[LlmToolDefinition], _: &str) -> LlmResult<LlmResponse> {
            unimplemented!()
        }
        async fn complete_simple(&self, _prompt: &str) -> LlmResult<String> {
            Ok("summary note".to_string())
        }
        fn max_context_length(&self) -> usize {
            200_000
        }
    }

    fn history_with_tool_pair() -> Vec<Message> {
        let id = ToolCallId::from("call-1");
        vec![
            Message::system("be helpful"),
            Message::user("read the file"),
            Message::assistant_tool_calls(vec![ToolCall::new(id.clone(), "read_file")]),
            Message::tool_result(ToolCallResult::success(id, "file contents")),
            Message::assistant("here you go"),
        ]
    }

    #[tokio::test]
    async fn sliding_window_never_splits_a_tool_call_pair() {
        let messages = history_with_tool_pair();
        let outcome = fit(&messages, 0, &TruncateStrategy::SlidingWindow { keep_last: 1 }, &StubProvider)
            .await
            .unwrap();
        // The last unit is the final assistant text message alone.
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.messages[0].text(), Some("here you go"));
    }

    #[tokio::test]
    async fn token_budget_keeps_system_message() {
        let messages = history_with_tool_pair();
        let outcome = fit(&messages, 1, &TruncateStrategy::TokenBudget, &StubProvider).await.unwrap();
        assert!(outcome.messages.iter().any(|m| m.role == Role::System));
    }

    #[tokio::test]
    async fn smart_inserts_placeholder_for_dropped_band() {
        let mut messages = history_with_tool_pair();
        for i in 0..10 {
            messages.push(Message::user(format!("filler {i}")));
        }
        let outcome = fit(&messages, 0, &TruncateStrategy::Smart { keep_last: 2 }, &StubProvider).await.unwrap();
        assert!(outcome.was_truncated);
        assert!(outcome.messages.iter().any(|m| m.text().is_some_and(|t| t.contains(ELISION_NOTICE))));
    }

    #[tokio::test]
    async fn selective_drops_oversized_tool_results_only() {
        let id = ToolCallId::from("call-big");
        let messages = vec![
            Message::assistant_tool_calls(vec![ToolCall::new(id.clone(), "grep")]),
            Message::tool_result(ToolCallResult::success(id, "x".repeat(100))),
        ];
        let outcome = fit(&messages, 0, &TruncateStrategy::Selective { max_tool_result_chars: 10 }, &StubProvider)
            .await
            .unwrap();
        assert_eq!(outcome.dropped_count, 1);
        // The assistant tool-call message survives even though its result was dropped.
        assert!(outcome.messages.iter().any(|m| m.tool_calls().is_some()));
    }

    #[tokio::test]
    async fn summarize_replaces_dropped_band_with_llm_note() {
        let mut messages = history_with_tool_pair();
        for i in 0..5 {
            messages.push(Message::user(format!("filler {i}")));
        }
        let outcome = fit(&messages, 0, &TruncateStrategy::Summarize { keep_last: 1 }, &StubProvider).await.unwrap();
        assert!(outcome.messages.iter().any(|m| m.text() == Some("summary note")));
    }

    #[tokio::test]
    async fn composite_stops_at_first_stage_that_fits() {
        let messages = history_with_tool_pair();
        let strategy = TruncateStrategy::Composite(vec![
            TruncateStrategy::SlidingWindow { keep_last: 100 },
            TruncateStrategy::TokenBudget,
        ]);
        // budget huge: first stage already fits, second stage never runs.
        let outcome = fit(&messages, 1_000_000, &strategy, &StubProvider).await.unwrap();
        assert!(!outcome.was_truncated);
        assert_eq!(outcome.messages.len(), messages.len());
    }

    #[tokio::test]
    async fn applying_fit_twice_with_same_budget_is_a_fixed_point() {
        let messages = history_with_tool_pair();
        let strategy = TruncateStrategy::TokenBudget;
        let once = fit(&messages, 1, &strategy, &StubProvider).await.unwrap();
        let twice = fit(&once.messages, 1, &strategy, &StubProvider).await.unwrap();
        assert_eq!(twice.messages.len(), once.messages.len());
        assert!(!twice.was_truncated);
    }
}
