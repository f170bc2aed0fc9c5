//! The Permission Resolver: evaluates the ordered rule set for one tool
//! invocation and enforces rate-limited lockout on repeated denials.

use std::sync::RwLock;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::ratelimit::RateLimiter;
use crate::rule::{select_winner, CompiledRule, PermissionLevel, PermissionRule, RuleSource};

/// The outcome of [`PermissionResolver::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// The resolved verdict.
    pub level: PermissionLevel,
    /// The id of the rule that produced this verdict, if any rule matched.
    pub matched_rule: Option<String>,
    /// Human-readable justification (rule source/pattern, or a built-in
    /// reason like `"rate-limited"` or `"no matching rule, default ask"`).
    pub reason: String,
}

impl Decision {
    fn from_rule(rule: &CompiledRule) -> Self {
        Self {
            level: rule.rule.level,
            matched_rule: Some(rule.rule.id.clone()),
            reason: format!("matched {:?} rule {:?} (pattern {:?})", rule.rule.source, rule.rule.id, rule.rule.pattern),
        }
    }
}

/// Evaluates tool invocations against session/project/user/default rules.
///
/// Project and user rules are supplied at construction (loaded once from
/// `permissions.yaml` files by the caller); session rules may be added and
/// removed at runtime and are held only in memory, guarded by their own
/// lock so that read-mostly project/user rule sets never contend with the
/// more volatile session layer.
pub struct PermissionResolver {
    session_rules: RwLock<Vec<CompiledRule>>,
    project_rules: Vec<CompiledRule>,
    user_rules: Vec<CompiledRule>,
    default_rules: Vec<CompiledRule>,
    rate_limiter: RateLimiter,
}

/// Tuning knobs for the resolver's rate limiter, mirroring
/// `forge_config::RateLimitsSection`. Kept crate-local so `forge-permissions`
/// does not need to depend on `forge-config`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Denials within `window` before lockout trips.
    pub denial_threshold: u32,
    /// Sliding window width over which denials are counted.
    pub window: Duration,
    /// How long a tripped lockout forces DENY.
    pub cooldown: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            denial_threshold: 10,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(300),
        }
    }
}

/// Built-in default rules applied when no session/project/user rule
/// matches: a conservative baseline that allows read-only inspection tools
/// and asks about everything else.
#[must_use]
pub fn built_in_default_rules() -> Vec<PermissionRule> {
    vec![
        PermissionRule::new("default-glob", "glob", PermissionLevel::Allow, RuleSource::Default),
        PermissionRule::new("default-grep", "grep", PermissionLevel::Allow, RuleSource::Default),
        PermissionRule::new("default-read", "read_file", PermissionLevel::Allow, RuleSource::Default),
        PermissionRule::new("default-write", "write_file", PermissionLevel::Ask, RuleSource::Default),
        PermissionRule::new("default-edit", "edit_file", PermissionLevel::Ask, RuleSource::Default),
        PermissionRule::new("default-bash", "bash", PermissionLevel::Ask, RuleSource::Default),
    ]
}

impl PermissionResolver {
    /// Build a resolver from project- and user-level rule sets (typically
    /// loaded from their respective `permissions.yaml` files), plus the
    /// built-in defaults. Rules that fail to compile are dropped with a
    /// logged warning rather than failing construction.
    #[must_use]
    pub fn new(project_rules: Vec<PermissionRule>, user_rules: Vec<PermissionRule>, rate_limits: RateLimitConfig) -> Self {
        Self {
            session_rules: RwLock::new(Vec::new()),
            project_rules: compile_all(project_rules),
            user_rules: compile_all(user_rules),
            default_rules: compile_all(built_in_default_rules()),
            rate_limiter: RateLimiter::new(rate_limits.denial_threshold, rate_limits.window, rate_limits.cooldown),
        }
    }

    /// A resolver with no project/user rules, just the built-in defaults —
    /// useful for tests and for a config-less quick start.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Vec::new(), Vec::new(), RateLimitConfig::default())
    }

    /// Evaluate a tool invocation, applying rate-limit lockout before
    /// consulting the rule set.
    #[must_use]
    pub fn check(&self, tool_name: &str, args: &Value, principal: &str) -> Decision {
        if self.rate_limiter.is_locked_out(principal, tool_name) {
            return Decision {
                level: PermissionLevel::Deny,
                matched_rule: None,
                reason: "rate-limited".to_string(),
            };
        }

        let session_rules = self.session_rules.read().expect("session rule lock poisoned");
        let mut candidates: Vec<&CompiledRule> = Vec::new();
        for set in [&*session_rules, &self.project_rules, &self.user_rules, &self.default_rules] {
            candidates.extend(set.iter().filter(|r| r.matches(tool_name, args)));
        }

        match select_winner(&candidates) {
            Some(rule) => Decision::from_rule(rule),
            None => Decision {
                level: PermissionLevel::Ask,
                matched_rule: None,
                reason: "no matching rule, default ask".to_string(),
            },
        }
    }

    /// Record a denial (resolver DENY, or a user rejecting an ASK prompt)
    /// toward the rate-limit lockout counter for `(principal, tool_name)`.
    pub fn record_denial(&self, tool_name: &str, principal: &str) {
        self.rate_limiter.record_denial(principal, tool_name);
    }

    /// Add a session-scoped rule, atomically under the resolver's lock.
    /// Returns `false` without mutating state if the rule's patterns fail
    /// to compile (the caller should surface a `Warning` event).
    pub fn add_session_rule(&self, rule: PermissionRule) -> bool {
        let Some(compiled) = CompiledRule::compile(rule) else {
            warn!("permission rule has an invalid pattern and was not added");
            return false;
        };
        self.session_rules.write().expect("session rule lock poisoned").push(compiled);
        true
    }

    /// Remove a session-scoped rule by id. Returns `false` if no rule with
    /// that id was registered.
    pub fn remove_session_rule(&self, id: &str) -> bool {
        let mut rules = self.session_rules.write().expect("session rule lock poisoned");
        let before = rules.len();
        rules.retain(|r| r.rule.id != id);
        rules.len() != before
    }

    /// Snapshot the currently active session rules (for display/audit).
    #[must_use]
    pub fn session_rules(&self) -> Vec<PermissionRule> {
        self.session_rules
            .read()
            .expect("session rule lock poisoned")
            .iter()
            .map(|c| c.rule.clone())
            .collect()
    }
}

fn compile_all(rules: Vec<PermissionRule>) -> Vec<CompiledRule> {
    rules
        .into_iter()
        .filter_map(|r| {
            let pattern = r.pattern.clone();
            let compiled = CompiledRule::compile(r);
            if compiled.is_none() {
                warn!(pattern = %pattern, "permission rule has an invalid pattern and was dropped");
            }
            compiled
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_allow_read_only_tools() {
        let resolver = PermissionResolver::with_defaults();
        let decision = resolver.check("glob", &Value::Null, "user");
        assert_eq!(decision.level, PermissionLevel::Allow);
    }

    #[test]
    fn default_rules_ask_for_bash() {
        let resolver = PermissionResolver::with_defaults();
        let decision = resolver.check("bash", &Value::Null, "user");
        assert_eq!(decision.level, PermissionLevel::Ask);
    }

    #[test]
    fn unmatched_tool_defaults_to_ask() {
        let resolver = PermissionResolver::with_defaults();
        let decision = resolver.check("totally_unknown_tool", &Value::Null, "user");
        assert_eq!(decision.level, PermissionLevel::Ask);
        assert!(decision.matched_rule.is_none());
    }

    #[test]
    fn session_rule_overrides_default() {
        let resolver = PermissionResolver::with_defaults();
        assert!(resolver.add_session_rule(PermissionRule::new(
            "session-allow-bash",
            "bash",
            PermissionLevel::Allow,
            RuleSource::Session,
        )));
        let decision = resolver.check("bash", &Value::Null, "user");
        assert_eq!(decision.level, PermissionLevel::Allow);
        assert_eq!(decision.matched_rule.as_deref(), Some("session-allow-bash"));
    }

    #[test]
    fn removing_session_rule_falls_back_to_default() {
        let resolver = PermissionResolver::with_defaults();
        resolver.add_session_rule(PermissionRule::new(
            "session-allow-bash",
            "bash",
            PermissionLevel::Allow,
            RuleSource::Session,
        ));
        assert!(resolver.remove_session_rule("session-allow-bash"));
        let decision = resolver.check("bash", &Value::Null, "user");
        assert_eq!(decision.level, PermissionLevel::Ask);
    }

    #[test]
    fn remove_nonexistent_rule_returns_false() {
        let resolver = PermissionResolver::with_defaults();
        assert!(!resolver.remove_session_rule("nope"));
    }

    #[test]
    fn rate_limit_locks_out_after_repeated_denials() {
        let resolver = PermissionResolver::new(
            Vec::new(),
            Vec::new(),
            RateLimitConfig {
                denial_threshold: 2,
                window: Duration::from_secs(60),
                cooldown: Duration::from_secs(300),
            },
        );
        resolver.add_session_rule(PermissionRule::new("deny-bash", "bash", PermissionLevel::Deny, RuleSource::Session));
        for _ in 0..3 {
            let decision = resolver.check("bash", &Value::Null, "alice");
            resolver.record_denial("bash", "alice");
            assert_eq!(decision.level, PermissionLevel::Deny);
        }
        let locked = resolver.check("bash", &Value::Null, "alice");
        assert_eq!(locked.reason, "rate-limited");
    }

    #[test]
    fn invalid_session_rule_is_rejected_without_mutating_state() {
        let resolver = PermissionResolver::with_defaults();
        assert!(!resolver.add_session_rule(PermissionRule::new(
            "bad",
            "^(unterminated",
            PermissionLevel::Deny,
            RuleSource::Session,
        )));
        assert!(resolver.session_rules().is_empty());
    }

    #[test]
    fn determinism_same_inputs_same_decision() {
        let resolver = PermissionResolver::with_defaults();
        let a = resolver.check("glob", &serde_json::json!({"pattern": "*.rs"}), "user");
        let b = resolver.check("glob", &serde_json::json!({"pattern": "*.rs"}), "user");
        assert_eq!(a, b);
    }
}
