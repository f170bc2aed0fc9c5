//! The workflow definition data model: parsed from a declarative YAML
//! document or built up programmatically, then handed to [`crate::validate`].

use forge_core::{ForgeError, ForgeResult, StepId};
use serde::{Deserialize, Serialize};

fn default_max_retries() -> u32 {
    0
}

/// One node in a workflow's DAG.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Unique identifier within the workflow, referenced by `depends_on`,
    /// `parallel_with`, and condition field paths.
    pub id: StepId,
    /// The registered agent type this step's sub-agent is spawned as.
    #[serde(alias = "agent")]
    pub agent_type: String,
    /// The task prompt handed to the spawned sub-agent. May reference
    /// prior steps' outputs; substitution is the caller's responsibility.
    #[serde(alias = "task")]
    pub task_template: String,
    /// Human-readable summary, not interpreted by the engine.
    #[serde(default)]
    pub description: Option<String>,
    /// Arbitrary structured input bound to this step's task template.
    #[serde(default)]
    pub inputs: serde_json::Value,
    /// Steps that must reach a terminal state before this one becomes
    /// eligible to run.
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    /// Steps this one may run concurrently alongside, once both are ready.
    #[serde(default)]
    pub parallel_with: Vec<StepId>,
    /// A condition-grammar expression; the step is skipped if it evaluates
    /// false (or touches a missing field).
    #[serde(default)]
    pub condition: Option<String>,
    /// Retry attempts for a step whose sub-agent run fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-step wall timeout, in seconds. Falls back to the engine's
    /// configured default when absent.
    #[serde(default)]
    pub timeout_sec: Option<u64>,
}

/// A parsed workflow definition: a name, version, and its steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    /// Workflow name.
    pub name: String,
    /// Human-readable summary.
    #[serde(default)]
    pub description: Option<String>,
    /// Definition schema version, opaque to the engine.
    pub version: String,
    /// The workflow's steps, in declaration order (not necessarily
    /// topological order).
    pub steps: Vec<Step>,
    /// When `true`, a failed step does not abort the workflow; its
    /// dependents that have no other unmet dependency still run, and the
    /// workflow's terminal status is `partial` rather than `failed`.
    #[serde(default)]
    pub continue_on_error: bool,
}

impl WorkflowDefinition {
    /// Parse a workflow definition from its declarative YAML form.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::WorkflowInvalid`] if the document does not
    /// match the expected schema.
    pub fn from_yaml(input: &str) -> ForgeResult<Self> {
        serde_yaml::from_str(input).map_err(|e| ForgeError::WorkflowInvalid(format!("failed to parse workflow definition: {e}")))
    }

    /// Serialize this definition back to its declarative YAML form.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::WorkflowInvalid`] on a serialization failure
    /// (not expected in practice, since the type is plain data).
    pub fn to_yaml(&self) -> ForgeResult<String> {
        serde_yaml::to_string(self).map_err(|e| ForgeError::WorkflowInvalid(format!("failed to serialize workflow definition: {e}")))
    }

    /// Look up a step by id.
    #[must_use]
    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|s| &s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
name: release-prep
version: "1"
steps:
  - id: review
    agent_type: code-review
    task_template: "Review the pending diff"
  - id: tests
    agent_type: test-runner
    task_template: "Run the full test suite"
    depends_on: [review]
  - id: notes
    agent_type: release-notes
    task_template: "Draft release notes"
    depends_on: [review, tests]
    condition: "tests.success"
"#;

    #[test]
    fn parses_a_declarative_document() {
        let def = WorkflowDefinition::from_yaml(DOC).unwrap();
        assert_eq!(def.name, "release-prep");
        assert_eq!(def.steps.len(), 3);
        assert_eq!(def.steps[1].depends_on, vec![StepId::new("review")]);
    }

    #[test]
    fn round_trips_through_yaml_preserving_semantic_equality() {
        let def = WorkflowDefinition::from_yaml(DOC).unwrap();
        let serialized = def.to_yaml().unwrap();
        let reparsed = WorkflowDefinition::from_yaml(&serialized).unwrap();
        assert_eq!(def, reparsed);
    }

    #[test]
    fn agent_alias_is_accepted_for_agent_type() {
        let doc = "name: a\nversion: \"1\"\nsteps:\n  - id: s1\n    agent: general-purpose\n    task: do it\n";
        let def = WorkflowDefinition::from_yaml(doc).unwrap();
        assert_eq!(def.steps[0].agent_type, "general-purpose");
        assert_eq!(def.steps[0].task_template, "do it");
    }

    #[test]
    fn step_lookup_by_id() {
        let def = WorkflowDefinition::from_yaml(DOC).unwrap();
        assert!(def.step(&StepId::new("tests")).is_some());
        assert!(def.step(&StepId::new("missing")).is_none());
    }
}
