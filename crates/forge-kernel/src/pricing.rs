//! Rough USD cost estimation for a completed run's token usage.
//!
//! Rates are a hardcoded table of USD per 1K tokens, keyed by a substring
//! match against the model name — the same matching style
//! `OpenAiCompatProvider::openai`'s context-window lookup uses. Good enough
//! for a cost display, not a billing reconciliation.

/// Per-1K-token input/output rates, in USD, for a model family.
struct Rate {
    input_per_1k: f64,
    output_per_1k: f64,
}

const RATES: &[(&str, Rate)] = &[
    ("claude-opus", Rate { input_per_1k: 0.015, output_per_1k: 0.075 }),
    ("claude-sonnet", Rate { input_per_1k: 0.003, output_per_1k: 0.015 }),
    ("claude-haiku", Rate { input_per_1k: 0.0008, output_per_1k: 0.004 }),
    ("gpt-4o", Rate { input_per_1k: 0.0025, output_per_1k: 0.01 }),
    ("gpt-4-turbo", Rate { input_per_1k: 0.01, output_per_1k: 0.03 }),
    ("gpt-4", Rate { input_per_1k: 0.03, output_per_1k: 0.06 }),
    ("gpt-3.5-turbo", Rate { input_per_1k: 0.0005, output_per_1k: 0.0015 }),
];

/// Fallback rate applied to a model name matching nothing in [`RATES`]
/// (e.g. a local LM Studio / Ollama model, which costs nothing to run but
/// whose usage is still worth approximating at the cheapest known tier for
/// a rough upper bound).
const DEFAULT_RATE: Rate = Rate { input_per_1k: 0.0, output_per_1k: 0.0 };

/// Estimate USD cost for a completed run, by model name and token usage.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn tokens_to_usd(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let rate = RATES.iter().find(|(needle, _)| model.contains(needle)).map_or(&DEFAULT_RATE, |(_, rate)| rate);
    let input_cost = (input_tokens as f64 / 1000.0) * rate.input_per_1k;
    let output_cost = (output_tokens as f64 / 1000.0) * rate.output_per_1k;
    input_cost + output_cost
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_sonnet_matches_its_rate() {
        let cost = tokens_to_usd("claude-sonnet-4-20250514", 1000, 1000);
        assert!((cost - 0.018).abs() < 1e-9);
    }

    #[test]
    fn unrecognized_model_falls_back_to_zero() {
        assert_eq!(tokens_to_usd("local-model", 5000, 5000), 0.0);
    }

    #[test]
    fn zero_usage_is_zero_cost() {
        assert_eq!(tokens_to_usd("gpt-4o", 0, 0), 0.0);
    }
}
