//! Token budgeting: approximate token counts and the system/conversation/
//! tools/response split of a model's context window.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use lru::LruCache;

use forge_core::message::{Content, ContentPart, Message, ToolCall};
use forge_llm::LlmProvider;

/// Default bound on the token-count cache, per spec's "default 1000
/// entries, configurable" cache policy.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// The four-way split of a model's context window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextBudget {
    /// Tokens reserved for the system prompt.
    pub system: usize,
    /// Tokens reserved for conversation history.
    pub conversation: usize,
    /// Tokens reserved for tool definitions.
    pub tools: usize,
    /// Tokens reserved for the model's response.
    pub response: usize,
}

impl ContextBudget {
    /// Total tokens across all four bands.
    #[must_use]
    pub fn total(&self) -> usize {
        self.system + self.conversation + self.tools + self.response
    }
}

/// The fractional split applied to a total token budget. Ratios need not
/// sum to exactly 1.0; each band is computed independently and rounded
/// down, so a budget can be split conservatively.
#[derive(Debug, Clone, Copy)]
pub struct BudgetSplit {
    /// Fraction reserved for the system prompt.
    pub system: f64,
    /// Fraction reserved for conversation history.
    pub conversation: f64,
    /// Fraction reserved for tool definitions.
    pub tools: f64,
    /// Fraction reserved for the model's response.
    pub response: f64,
}

impl Default for BudgetSplit {
    /// The default 10/60/10/20 split named in the token budgeter's public
    /// contract.
    fn default() -> Self {
        Self {
            system: 0.10,
            conversation: 0.60,
            tools: 0.10,
            response: 0.20,
        }
    }
}

impl BudgetSplit {
    fn apply(&self, total: usize) -> ContextBudget {
        #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let band = |fraction: f64| ((total as f64) * fraction) as usize;
        ContextBudget {
            system: band(self.system),
            conversation: band(self.conversation),
            tools: band(self.tools),
            response: band(self.response),
        }
    }
}

/// Counts tokens for `(model, content)` pairs, caching by content hash so
/// the same message is never re-tokenized twice, and allocates a model's
/// total context window across the four bands above.
///
/// Counting never fails: a provider that does not recognize its own model
/// id for tokenizer purposes still answers through [`LlmProvider::count_tokens`]'s
/// approximate fallback, and the first time that happens for a given model
/// this budgeter emits a single warning rather than erroring.
pub struct TokenBudgeter {
    cache: Mutex<LruCache<u64, usize>>,
    splits: HashMap<String, BudgetSplit>,
    default_split: BudgetSplit,
    warned_models: Mutex<std::collections::HashSet<String>>,
}

impl TokenBudgeter {
    /// Build a budgeter with the default cache capacity and no per-model
    /// split overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Build a budgeter with an explicit cache capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to at least 1");
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            splits: HashMap::new(),
            default_split: BudgetSplit::default(),
            warned_models: Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Register a per-model override of the default 10/60/10/20 split.
    pub fn set_split(&mut self, model_id: impl Into<String>, split: BudgetSplit) {
        self.splits.insert(model_id.into(), split);
    }

    /// Count the tokens in a single message, via the cache.
    #[must_use]
    pub fn count_message(&self, provider: &dyn LlmProvider, message: &Message) -> usize {
        let text = render_for_counting(message);
        let key = cache_key(provider.model(), &text);

        if let Some(&cached) = self.cache.lock().expect("token cache lock poisoned").get(&key) {
            return cached;
        }

        if self.warned_models.lock().expect("warned-models lock poisoned").insert(provider.model().to_string()) {
            tracing::warn!(model = provider.model(), "no model-specific tokenizer available, using approximate token counting");
        }

        let count = provider.count_tokens(&text);
        self.cache.lock().expect("token cache lock poisoned").put(key, count);
        count
    }

    /// Count the tokens across a whole message slice.
    #[must_use]
    pub fn count_messages(&self, provider: &dyn LlmProvider, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count_message(provider, m)).sum()
    }

    /// Split `total_budget` tokens across the four bands, using the
    /// model's registered override if one was set.
    #[must_use]
    pub fn allocate(&self, model_id: &str, total_budget: usize) -> ContextBudget {
        self.splits.get(model_id).unwrap_or(&self.default_split).apply(total_budget)
    }

    /// Number of entries currently cached.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.lock().expect("token cache lock poisoned").len()
    }
}

impl Default for TokenBudgeter {
    fn default() -> Self {
        Self::new()
    }
}

fn cache_key(model: &str, text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    model.hash(&mut hasher);
    text.hash(&mut hasher);
    hasher.finish()
}

/// Render a message's textual payload for token counting. This mirrors
/// `Message::approx_char_len`'s traversal but produces the actual text a
/// tokenizer would see rather than just its length.
pub(crate) fn render_for_counting(message: &Message) -> String {
    match &message.content {
        Content::Text(s) => s.clone(),
        Content::ToolCalls(calls) => calls.iter().map(render_tool_call).collect::<Vec<_>>().join("\n"),
        Content::ToolResult(r) => r.content.clone(),
        Content::MultiPart(parts) => parts
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => text.clone(),
                ContentPart::Image { data, .. } => format!("<image:{} bytes>", data.len()),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn render_tool_call(call: &ToolCall) -> String {
    format!("{}({})", call.name, call.arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_llm::{LlmResult, LlmResponse, LlmToolDefinition, StreamBox};
    use async_trait::async_trait;

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
        fn max_context_length(&self) -> usize {
            200_000
        }
    }

    #[test]
    fn default_split_sums_to_total_budget() {
        let budgeter = TokenBudgeter::new();
        let budget = budgeter.allocate("any-model", 100_000);
        assert_eq!(budget.system, 10_000);
        assert_eq!(budget.conversation, 60_000);
        assert_eq!(budget.tools, 10_000);
        assert_eq!(budget.response, 20_000);
        assert_eq!(budget.total(), 100_000);
    }

    #[test]
    fn per_model_override_is_applied() {
        let mut budgeter = TokenBudgeter::new();
        budgeter.set_split(
            "big-context",
            BudgetSplit { system: 0.05, conversation: 0.80, tools: 0.05, response: 0.10 },
        );
        let budget = budgeter.allocate("big-context", 100_000);
        assert_eq!(budget.conversation, 80_000);
        let default_budget = budgeter.allocate("other-model", 100_000);
        assert_eq!(default_budget.conversation, 60_000);
    }

    #[test]
    fn counting_is_cached_and_monotone() {
        let budgeter = TokenBudgeter::new();
        let provider = StubProvider;
        let a = budgeter.count_messages(&provider, &[Message::user("hello")]);
        let b = budgeter.count_messages(&provider, &[Message::user("hello"), Message::assistant("world")]);
        assert!(b >= a);
        assert_eq!(budgeter.cache_len(), 2);

        let a_again = budgeter.count_message(&provider, &Message::user("hello"));
        assert_eq!(a_again, a);
        assert_eq!(budgeter.cache_len(), 2);
    }

    #[test]
    fn cache_evicts_past_capacity() {
        let budgeter = TokenBudgeter::with_capacity(2);
        let provider = StubProvider;
        budgeter.count_message(&provider, &Message::user("one"));
        budgeter.count_message(&provider, &Message::user("two"));
        budgeter.count_message(&provider, &Message::user("three"));
        assert_eq!(budgeter.cache_len(), 2);
    }
}
