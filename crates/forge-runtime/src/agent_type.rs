//! Agent type presets: named, frozen configurations of prompt, tool
//! whitelist, and resource caps that the Task tool and the Workflow Engine
//! construct sub-agent runs from.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use forge_core::{ForgeError, ForgeResult};

use crate::runtime::RunCaps;

/// One registered agent type: a name, its system prompt template, the
/// tools it may call, and the resource caps its runs are bounded by.
#[derive(Debug, Clone)]
pub struct AgentTypeDefinition {
    /// Kebab-case identifier, e.g. `"code-review"`.
    pub name: String,
    /// Human-readable summary surfaced to operators and the Task tool's
    /// own schema description.
    pub description: String,
    /// System prompt used to seed runs of this type.
    pub prompt_template: String,
    /// Tool names this type's Tool Gateway calls are restricted to.
    pub allowed_tools: HashSet<String>,
    /// Resource caps applied to every run of this type.
    pub caps: RunCaps,
}

impl AgentTypeDefinition {
    /// Build a definition with the given allowed-tool list.
    pub fn new(name: impl Into<String>, description: impl Into<String>, prompt_template: impl Into<String>, allowed_tools: impl IntoIterator<Item = &'static str>, caps: RunCaps) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            prompt_template: prompt_template.into(),
            allowed_tools: allowed_tools.into_iter().map(str::to_string).collect(),
            caps,
        }
    }
}

/// Registry of agent type presets, populated at startup and frozen
/// thereafter; a duplicate name is rejected rather than overwriting the
/// existing definition.
pub struct AgentTypeRegistry {
    types: HashMap<String, AgentTypeDefinition>,
    frozen: bool,
}

impl AgentTypeRegistry {
    /// An empty, unfrozen registry.
    #[must_use]
    pub fn new() -> Self {
        Self { types: HashMap::new(), frozen: false }
    }

    /// Register a definition. Fails if the registry is frozen or a
    /// definition of the same name already exists.
    pub fn register(&mut self, def: AgentTypeDefinition) -> ForgeResult<()> {
        if self.frozen {
            return Err(ForgeError::WorkflowInvalid(format!("agent type registry is frozen, cannot register {}", def.name)));
        }
        match self.types.entry(def.name.clone()) {
            Entry::Occupied(_) => Err(ForgeError::WorkflowInvalid(format!("duplicate agent type: {}", def.name))),
            Entry::Vacant(slot) => {
                slot.insert(def);
                Ok(())
            }
        }
    }

    /// Prevent further registration. Idempotent.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether the registry has been frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Look up a definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AgentTypeDefinition> {
        self.types.get(name)
    }

    /// Whether a name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Every registered name.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for AgentTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

const FULL_TOOLSET: &[&str] = &["read_file", "write_file", "edit_file", "glob", "grep", "bash", "web_search", "web_fetch"];
const READ_ONLY_TOOLSET: &[&str] = &["read_file", "glob", "grep", "bash", "web_search", "web_fetch"];
const WRITE_TOOLSET: &[&str] = &["read_file", "write_file", "edit_file", "glob", "grep", "bash"];

fn caps(max_tokens: u64, max_wall_seconds: u64, max_tool_calls: u64, max_iterations: u64) -> RunCaps {
    RunCaps {
        max_tokens,
        max_wall: std::time::Duration::from_secs(max_wall_seconds),
        max_tool_calls,
        max_iterations,
        tool_fan_out: 4,
    }
}

/// The ~20 built-in agent type presets, covering the common sub-agent
/// shapes a coding assistant delegates to: broad implementation work,
/// narrow read-only analysis, and everything in between.
#[must_use]
pub fn built_in_presets() -> Vec<AgentTypeDefinition> {
    vec![
        AgentTypeDefinition::new(
            "general-purpose",
            "Handles open-ended multi-step tasks with the full tool set.",
            "You are a general-purpose coding agent. Complete the given task using the available tools, verifying your work where possible.",
            FULL_TOOLSET.iter().copied(),
            caps(200_000, 900, 80, 40),
        ),
        AgentTypeDefinition::new(
            "code-review",
            "Reviews a diff or file set for correctness, style, and risk.",
            "You are a code reviewer. Read the referenced changes and report concrete, file-and-line-anchored findings. Do not modify files.",
            READ_ONLY_TOOLSET.iter().copied(),
            caps(120_000, 600, 40, 25),
        ),
        AgentTypeDefinition::new(
            "test-runner",
            "Runs a project's test suite and summarizes failures.",
            "You run the project's tests via the shell and summarize pass/fail counts and failure causes. Do not edit source files.",
            &["bash", "read_file", "grep"],
            caps(80_000, 600, 30, 20),
        ),
        AgentTypeDefinition::new(
            "docs-writer",
            "Writes or updates documentation for existing code.",
            "You write clear, accurate documentation for the code you are shown. Match the surrounding project's tone and structure.",
            WRITE_TOOLSET.iter().copied(),
            caps(150_000, 600, 40, 25),
        ),
        AgentTypeDefinition::new(
            "bug-hunter",
            "Searches a codebase for a described defect and proposes a fix.",
            "You hunt for the root cause of a described bug across the codebase, then propose a minimal, targeted fix.",
            FULL_TOOLSET.iter().copied(),
            caps(180_000, 900, 60, 35),
        ),
        AgentTypeDefinition::new(
            "refactorer",
            "Restructures code without changing observable behavior.",
            "You refactor the referenced code for clarity and maintainability without changing its external behavior. Keep diffs minimal.",
            WRITE_TOOLSET.iter().copied(),
            caps(180_000, 900, 60, 35),
        ),
        AgentTypeDefinition::new(
            "security-audit",
            "Audits a codebase or diff for security issues.",
            "You audit the referenced code for security vulnerabilities (injection, auth, secrets, unsafe deserialization). Report findings; do not modify files.",
            READ_ONLY_TOOLSET.iter().copied(),
            caps(150_000, 900, 50, 30),
        ),
        AgentTypeDefinition::new(
            "dependency-upgrade",
            "Plans and applies a dependency version upgrade.",
            "You upgrade the referenced dependency, resolving breaking changes and updating call sites.",
            FULL_TOOLSET.iter().copied(),
            caps(150_000, 900, 50, 30),
        ),
        AgentTypeDefinition::new(
            "release-notes",
            "Drafts release notes from a set of changes.",
            "You draft concise, user-facing release notes summarizing the referenced changes. Do not modify source files.",
            &["bash", "read_file", "grep"],
            caps(80_000, 400, 20, 15),
        ),
        AgentTypeDefinition::new(
            "migration-planner",
            "Produces a step-by-step plan for a larger migration.",
            "You produce a concrete, ordered migration plan for the described change, without carrying out the migration yourself.",
            READ_ONLY_TOOLSET.iter().copied(),
            caps(150_000, 600, 40, 25),
        ),
        AgentTypeDefinition::new(
            "research",
            "Investigates a question against the codebase and summarizes findings.",
            "You research the given question using the codebase and report a clear, sourced summary. Do not modify files.",
            READ_ONLY_TOOLSET.iter().copied(),
            caps(150_000, 600, 50, 30),
        ),
        AgentTypeDefinition::new(
            "debugger",
            "Reproduces and diagnoses a failure, proposing a fix.",
            "You reproduce the described failure, trace it to its cause, and propose a fix. Explain your diagnosis before changing code.",
            FULL_TOOLSET.iter().copied(),
            caps(180_000, 900, 60, 35),
        ),
        AgentTypeDefinition::new(
            "performance-profiler",
            "Identifies performance hot spots and proposes optimizations.",
            "You identify performance bottlenecks in the referenced code and propose concrete optimizations with their expected impact.",
            READ_ONLY_TOOLSET.iter().copied(),
            caps(150_000, 900, 50, 30),
        ),
        AgentTypeDefinition::new(
            "api-designer",
            "Designs or revises a public API surface.",
            "You design the requested API surface, favoring clarity and consistency with the existing codebase's conventions.",
            WRITE_TOOLSET.iter().copied(),
            caps(150_000, 600, 40, 25),
        ),
        AgentTypeDefinition::new(
            "schema-migrator",
            "Writes a data or config schema migration.",
            "You write a schema migration for the described change, including any required backfill or compatibility handling.",
            WRITE_TOOLSET.iter().copied(),
            caps(150_000, 900, 50, 30),
        ),
        AgentTypeDefinition::new(
            "ci-triage",
            "Diagnoses a CI failure from logs and code.",
            "You triage a CI failure: read the failing job's output and the referenced code, and report the root cause.",
            &["bash", "read_file", "grep"],
            caps(100_000, 600, 30, 20),
        ),
        AgentTypeDefinition::new(
            "changelog-writer",
            "Writes a changelog entry for a set of commits or a diff.",
            "You write a changelog entry for the referenced changes, grouped by kind (feature, fix, breaking).",
            &["bash", "read_file", "grep"],
            caps(60_000, 300, 15, 10),
        ),
        AgentTypeDefinition::new(
            "code-search",
            "Finds every relevant site for a described pattern or concept.",
            "You exhaustively search the codebase for every site matching the described pattern or concept, and report file:line references.",
            &["glob", "grep", "read_file"],
            caps(100_000, 400, 40, 20),
        ),
        AgentTypeDefinition::new(
            "onboarding-guide",
            "Writes an orientation guide to a subsystem for a new contributor.",
            "You write an onboarding guide to the referenced subsystem, covering its structure, entry points, and conventions.",
            READ_ONLY_TOOLSET.iter().copied(),
            caps(150_000, 600, 40, 25),
        ),
        AgentTypeDefinition::new(
            "style-enforcer",
            "Applies a project's style conventions to the referenced code.",
            "You bring the referenced code into line with the project's existing style conventions without changing its behavior.",
            WRITE_TOOLSET.iter().copied(),
            caps(120_000, 600, 40, 25),
        ),
    ]
}

/// Register every built-in preset into `registry`. Does not freeze the
/// registry — the caller (the Dependencies Container) freezes it once any
/// deployment-specific extra types have also been registered.
pub fn register_builtin_presets(registry: &mut AgentTypeRegistry) -> ForgeResult<()> {
    for def in built_in_presets() {
        registry.register(def)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_presets_have_unique_names() {
        let mut registry = AgentTypeRegistry::new();
        register_builtin_presets(&mut registry).expect("no duplicate names among built-ins");
        assert_eq!(registry.len(), built_in_presets().len());
    }

    #[test]
    fn builtin_presets_count_matches_roster() {
        assert_eq!(built_in_presets().len(), 20);
    }

    #[test]
    fn every_preset_has_a_nonempty_whitelist_and_kebab_case_name() {
        for def in built_in_presets() {
            assert!(!def.allowed_tools.is_empty(), "{} has an empty whitelist", def.name);
            assert!(!def.name.contains('_'), "{} is not kebab-case", def.name);
            assert!(!def.name.contains(char::is_uppercase), "{} is not kebab-case", def.name);
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = AgentTypeRegistry::new();
        registry.register(built_in_presets().remove(0)).unwrap();
        let dup = built_in_presets().remove(0);
        let err = registry.register(dup).unwrap_err();
        assert_eq!(err.kind(), forge_core::ErrorKind::WorkflowInvalid);
    }

    #[test]
    fn frozen_registry_rejects_further_registration() {
        let mut registry = AgentTypeRegistry::new();
        registry.freeze();
        let err = registry.register(built_in_presets().remove(0)).unwrap_err();
        assert_eq!(err.kind(), forge_core::ErrorKind::WorkflowInvalid);
    }

    #[test]
    fn lookup_by_name_succeeds_for_a_known_preset() {
        let mut registry = AgentTypeRegistry::new();
        register_builtin_presets(&mut registry).unwrap();
        assert!(registry.get("general-purpose").is_some());
        assert!(registry.get("not-a-real-type").is_none());
    }
}
