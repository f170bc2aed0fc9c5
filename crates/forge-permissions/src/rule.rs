//! Permission rules: declarative predicates over a tool invocation.
//!
//! A [`PermissionRule`] is the persisted/authored form (serializable, as it
//! appears in `permissions.yaml` or a session's in-memory rule list). A
//! [`CompiledRule`] wraps one with its pattern matcher pre-compiled, built
//! once at registration time so hot-path matching never recompiles a regex.

use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The verdict a matched (or unmatched) rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermissionLevel {
    /// The action may proceed without prompting.
    Allow,
    /// The human must be asked before the action proceeds.
    Ask,
    /// The action is refused outright.
    Deny,
}

impl PermissionLevel {
    /// Tie-break rank used when two rules match with identical specificity:
    /// higher ranks win. Per spec, "DENY beats ALLOW on equal specificity";
    /// `Ask` is treated as the middle, safer-than-Allow ground.
    fn safety_rank(self) -> u8 {
        match self {
            Self::Deny => 2,
            Self::Ask => 1,
            Self::Allow => 0,
        }
    }
}

/// Where a rule came from. Precedence is the enum's declaration order:
/// session overrides project, project overrides user, user overrides
/// built-in defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    /// Added at runtime for the current session only (in-memory, never
    /// persisted); highest precedence.
    Session,
    /// Loaded from `<workspace>/.forge/permissions.yaml`.
    Project,
    /// Loaded from `<config_dir>/permissions.yaml`.
    User,
    /// Built into the resolver, used when no configured rule matches at all
    /// higher-precedence sources; lowest precedence.
    Default,
}

impl RuleSource {
    /// Higher number = higher precedence, so sorting by this value
    /// descending matches the spec's source ordering directly.
    fn precedence(self) -> u8 {
        match self {
            Self::Session => 3,
            Self::Project => 2,
            Self::User => 1,
            Self::Default => 0,
        }
    }
}

/// An optional constraint on one named argument of the tool call, in
/// addition to matching the tool name itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgPattern {
    /// The argument name to constrain (e.g. `"path"`, `"command"`).
    pub arg_name: String,
    /// Glob (default) or regex (prefixed `^`) pattern the argument's string
    /// form must match.
    pub pattern: String,
    /// When true, the argument is treated as a filesystem path and is
    /// normalized (resolve `.`/`..`, strip a trailing slash) before
    /// matching, to thwart traversal-style evasion of path-scoped rules.
    #[serde(default)]
    pub path_like: bool,
}

/// A declarative predicate over a tool invocation: pattern, verdict, source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Stable id, used by `remove_session_rule` and for audit logging.
    pub id: String,
    /// Tool-name pattern: a literal name, a glob (contains `*`/`?`/`[`), or
    /// a regex if prefixed with `^`.
    pub pattern: String,
    /// An additional constraint on a named argument, if any.
    #[serde(default)]
    pub arg_pattern: Option<ArgPattern>,
    /// The verdict this rule produces when matched.
    pub level: PermissionLevel,
    /// Where this rule was loaded from.
    pub source: RuleSource,
}

impl PermissionRule {
    /// Build a rule matching a literal or glob tool-name pattern.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        pattern: impl Into<String>,
        level: PermissionLevel,
        source: RuleSource,
    ) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            arg_pattern: None,
            level,
            source,
        }
    }

    /// Attach an argument constraint to this rule.
    #[must_use]
    pub fn with_arg_pattern(mut self, arg_pattern: ArgPattern) -> Self {
        self.arg_pattern = Some(arg_pattern);
        self
    }
}

/// How a pattern string is interpreted, decided once at compile time.
enum Matcher {
    Literal(String),
    Glob(Box<GlobMatcher>),
    Regex(Box<regex::Regex>),
}

impl Matcher {
    fn compile(pattern: &str) -> Option<Self> {
        if let Some(body) = pattern.strip_prefix('^') {
            return regex::Regex::new(&format!("^{body}"))
                .ok()
                .map(|re| Self::Regex(Box::new(re)));
        }
        if pattern.contains(['*', '?', '[', ']']) {
            return Glob::new(pattern)
                .ok()
                .map(|g| Self::Glob(Box::new(g.compile_matcher())));
        }
        Some(Self::Literal(pattern.to_string()))
    }

    fn is_match(&self, candidate: &str) -> bool {
        match self {
            Self::Literal(lit) => lit == candidate,
            Self::Glob(g) => g.is_match(candidate),
            Self::Regex(re) => re.is_match(candidate),
        }
    }

    /// A rough specificity score: longer, more literal patterns outrank
    /// short/wildcard ones. Literal patterns get a flat bonus over globs
    /// and regexes of comparable length, since an exact match is always the
    /// most specific thing a rule can say.
    fn specificity(&self, raw: &str) -> u32 {
        let bonus = match self {
            Self::Literal(_) => 10_000,
            Self::Glob(_) => 1_000,
            Self::Regex(_) => 0,
        };
        bonus + u32::try_from(raw.len()).unwrap_or(u32::MAX - bonus)
    }
}

/// Normalize a path-like argument: resolve `.`/`..` components (lexically,
/// without touching the filesystem) and strip a trailing slash, so
/// `"src/../../etc/passwd"` cannot slip past a rule scoped to `"src/*"`.
fn normalize_path_like(raw: &str) -> String {
    let path = Path::new(raw);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    let mut s = out.to_string_lossy().into_owned();
    if s.len() > 1 && s.ends_with('/') {
        s.pop();
    }
    s
}

/// A [`PermissionRule`] with its pattern matcher(s) pre-compiled.
pub struct CompiledRule {
    /// The rule this was compiled from.
    pub rule: PermissionRule,
    matcher: Matcher,
    arg_matcher: Option<Matcher>,
}

impl CompiledRule {
    /// Compile a rule's patterns. Returns `None` (the rule is "inert") if
    /// either the tool-name pattern or the argument pattern fails to
    /// compile as a regex/glob — the caller should surface a `Warning`
    /// event and otherwise behave as though the rule were absent, rather
    /// than fail the whole resolver.
    #[must_use]
    pub fn compile(rule: PermissionRule) -> Option<Self> {
        let matcher = Matcher::compile(&rule.pattern)?;
        let arg_matcher = match &rule.arg_pattern {
            Some(ap) => Some(Matcher::compile(&ap.pattern)?),
            None => None,
        };
        Some(Self {
            rule,
            matcher,
            arg_matcher,
        })
    }

    /// Whether this rule's tool-name (and, if present, argument) pattern
    /// matches the given invocation.
    #[must_use]
    pub fn matches(&self, tool_name: &str, args: &Value) -> bool {
        if !self.matcher.is_match(tool_name) {
            return false;
        }
        match (&self.arg_matcher, &self.rule.arg_pattern) {
            (Some(matcher), Some(ap)) => {
                let Some(value) = args.get(&ap.arg_name) else {
                    return false;
                };
                let candidate = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let candidate = if ap.path_like {
                    normalize_path_like(&candidate)
                } else {
                    candidate
                };
                matcher.is_match(&candidate)
            }
            _ => true,
        }
    }

    /// Sort key: (source precedence, pattern specificity, verdict safety).
    /// Sorting descending by this tuple and taking the first element
    /// implements the full "most specific, highest-precedence source,
    /// DENY-wins-ties" resolution rule in one comparison.
    fn sort_key(&self) -> (u8, u32, u8) {
        (
            self.rule.source.precedence(),
            self.matcher.specificity(&self.rule.pattern),
            self.rule.level.safety_rank(),
        )
    }
}

/// Pick the winning rule among a set of already-filtered candidates
/// (everything that matched the invocation). Returns `None` if `candidates`
/// is empty.
#[must_use]
pub fn select_winner(candidates: &[&CompiledRule]) -> Option<&CompiledRule> {
    candidates.iter().max_by_key(|c| c.sort_key()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, level: PermissionLevel, source: RuleSource) -> PermissionRule {
        PermissionRule::new(format!("r-{pattern}"), pattern, level, source)
    }

    #[test]
    fn literal_pattern_matches_exact_name_only() {
        let r = CompiledRule::compile(rule("bash", PermissionLevel::Ask, RuleSource::Default)).unwrap();
        assert!(r.matches("bash", &Value::Null));
        assert!(!r.matches("bash2", &Value::Null));
    }

    #[test]
    fn glob_pattern_matches_family_of_tools() {
        let r = CompiledRule::compile(rule("mcp__*", PermissionLevel::Allow, RuleSource::User)).unwrap();
        assert!(r.matches("mcp__github__search", &Value::Null));
        assert!(!r.matches("bash", &Value::Null));
    }

    #[test]
    fn regex_pattern_requires_caret_prefix() {
        let r = CompiledRule::compile(rule("^(read|write)_file$", PermissionLevel::Allow, RuleSource::User)).unwrap();
        assert!(r.matches("read_file", &Value::Null));
        assert!(!r.matches("read_file_extra", &Value::Null));
    }

    #[test]
    fn invalid_regex_renders_rule_inert() {
        assert!(CompiledRule::compile(rule("^(unterminated", PermissionLevel::Deny, RuleSource::User)).is_none());
    }

    #[test]
    fn arg_pattern_constrains_match() {
        let r = CompiledRule::compile(
            rule("bash", PermissionLevel::Deny, RuleSource::Session).with_arg_pattern(ArgPattern {
                arg_name: "command".to_string(),
                pattern: "rm*".to_string(),
                path_like: false,
            }),
        )
        .unwrap();
        assert!(r.matches("bash", &serde_json::json!({"command": "rm -rf /"})));
        assert!(!r.matches("bash", &serde_json::json!({"command": "ls"})));
    }

    #[test]
    fn path_like_arg_normalizes_traversal() {
        let r = CompiledRule::compile(
            rule("read_file", PermissionLevel::Deny, RuleSource::Project).with_arg_pattern(ArgPattern {
                arg_name: "path".to_string(),
                pattern: "/etc/*".to_string(),
                path_like: true,
            }),
        )
        .unwrap();
        assert!(r.matches("read_file", &serde_json::json!({"path": "src/../../etc/passwd"})));
    }

    #[test]
    fn winner_prefers_higher_precedence_source() {
        let session = CompiledRule::compile(rule("bash", PermissionLevel::Allow, RuleSource::Session)).unwrap();
        let default = CompiledRule::compile(rule("bash", PermissionLevel::Deny, RuleSource::Default)).unwrap();
        let winner = select_winner(&[&default, &session]).unwrap();
        assert_eq!(winner.rule.source, RuleSource::Session);
    }

    #[test]
    fn winner_prefers_more_specific_pattern_same_source() {
        let specific = CompiledRule::compile(rule("bash", PermissionLevel::Deny, RuleSource::User)).unwrap();
        let wildcard = CompiledRule::compile(rule("*", PermissionLevel::Allow, RuleSource::User)).unwrap();
        let winner = select_winner(&[&wildcard, &specific]).unwrap();
        assert_eq!(winner.rule.pattern, "bash");
    }

    #[test]
    fn deny_wins_equal_specificity_tie() {
        let allow = CompiledRule::compile(rule("bash", PermissionLevel::Allow, RuleSource::User)).unwrap();
        let deny = CompiledRule::compile(rule("bash", PermissionLevel::Deny, RuleSource::User)).unwrap();
        let winner = select_winner(&[&allow, &deny]).unwrap();
        assert_eq!(winner.rule.level, PermissionLevel::Deny);
    }
}
