//! A single hook registration: which event it fires on, what it runs, and
//! under what policy.

use std::collections::HashMap;
use std::path::PathBuf;

use globset::Glob;
use serde::{Deserialize, Serialize};

use crate::event::HookEvent;

/// One user-configured hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    /// Stable id, used to serialize per-hook execution (see
    /// [`crate::dispatcher::HookDispatcher`]'s one-instance-at-a-time rule).
    pub id: String,
    /// The lifecycle event this hook fires on.
    pub event: HookEvent,
    /// Glob matched against the tool name (for `tool:*`/`agent:*` events) or
    /// the literal event name otherwise. `None` matches unconditionally.
    pub match_pattern: Option<String>,
    /// The shell command to invoke.
    pub command: String,
    /// Arguments passed to `command`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-hook timeout. `None` defers to the dispatcher's configured
    /// default.
    pub timeout_ms: Option<u64>,
    /// Maximum retry attempts for transient failures (spawn error, timeout,
    /// or an exit code in the dispatcher's configured retry set).
    #[serde(default)]
    pub max_retries: u32,
    /// Working directory for the spawned process. Defaults to the current
    /// process's working directory.
    pub working_dir: Option<PathBuf>,
    /// Explicit environment variable overrides. Entries naming a
    /// denylisted variable (`LD_PRELOAD`, ...) are stripped with a warning
    /// rather than silently honored.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// If true, a non-zero exit on a `*:pre` event aborts the about-to-happen
    /// operation (`HookBlocked`). Ignored on non-`*:pre` events.
    #[serde(default)]
    pub blocking: bool,
}

impl Hook {
    /// Build a hook with default (non-blocking, no retries, inherited
    /// timeout) policy.
    #[must_use]
    pub fn new(id: impl Into<String>, event: HookEvent, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            event,
            match_pattern: None,
            command: command.into(),
            args: Vec::new(),
            timeout_ms: None,
            max_retries: 0,
            working_dir: None,
            env: HashMap::new(),
            blocking: false,
        }
    }

    /// Restrict this hook to tool/agent names matching a glob.
    #[must_use]
    pub fn with_match_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.match_pattern = Some(pattern.into());
        self
    }

    /// Mark this hook as blocking (only meaningful on `*:pre` events).
    #[must_use]
    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    /// Whether this hook applies to the given event, and — for events that
    /// carry a subject name (a tool or agent type name) — whether that name
    /// matches this hook's pattern.
    #[must_use]
    pub fn applies_to(&self, event: HookEvent, subject: Option<&str>) -> bool {
        if self.event != event {
            return false;
        }
        match (&self.match_pattern, subject) {
            (None, _) => true,
            (Some(pattern), Some(name)) => Glob::new(pattern)
                .map(|g| g.compile_matcher().is_match(name))
                .unwrap_or(false),
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_without_pattern_matches_any_subject() {
        let hook = Hook::new("h1", HookEvent::ToolPre, "echo");
        assert!(hook.applies_to(HookEvent::ToolPre, Some("bash")));
        assert!(hook.applies_to(HookEvent::ToolPre, None));
    }

    #[test]
    fn hook_with_pattern_filters_by_subject() {
        let hook = Hook::new("h1", HookEvent::ToolPre, "echo").with_match_pattern("bash*");
        assert!(hook.applies_to(HookEvent::ToolPre, Some("bash")));
        assert!(!hook.applies_to(HookEvent::ToolPre, Some("glob")));
    }

    #[test]
    fn hook_never_matches_a_different_event() {
        let hook = Hook::new("h1", HookEvent::ToolPre, "echo");
        assert!(!hook.applies_to(HookEvent::ToolPost, Some("bash")));
    }
}
