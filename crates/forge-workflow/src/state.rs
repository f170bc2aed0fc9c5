//! Workflow execution state: the mutable record the engine advances one
//! step transition at a time, and its atomic on-disk checkpoint.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use forge_core::{AgentRunId, ForgeError, ForgeResult, StepId, Timestamp, WorkflowId};
use serde::{Deserialize, Serialize};

use crate::definition::WorkflowDefinition;

/// Lifecycle status of an entire workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created but not yet started.
    Pending,
    /// The scheduler loop is in progress.
    Running,
    /// Every step completed, failed, or was skipped, with no failures.
    Completed,
    /// At least one step failed and `continue_on_error` was not set.
    Failed,
    /// Cancelled before reaching a terminal state on its own.
    Cancelled,
    /// Checkpointed mid-run, not currently executing (reserved for a future
    /// interactive pause; the engine does not produce this state itself).
    Paused,
    /// Every step reached a terminal state, at least one failed, and
    /// `continue_on_error` was set.
    Partial,
}

impl WorkflowStatus {
    /// Whether this status is final — no further step transitions occur.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled | Self::Partial)
    }
}

/// The recorded outcome of one step's sub-agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// The sub-agent run this step was carried out by.
    pub agent_run_id: Option<AgentRunId>,
    /// Whether the sub-agent run completed successfully.
    pub success: bool,
    /// The sub-agent's output, parsed as JSON when it is valid JSON so
    /// condition expressions can address nested fields; stored as a JSON
    /// string otherwise.
    pub result: Option<serde_json::Value>,
    /// Failure detail, when `success` is false.
    pub error: Option<String>,
    /// When the step's sub-agent run started.
    pub started_at: Timestamp,
    /// When the step reached a terminal state.
    pub ended_at: Timestamp,
    /// Wall-clock duration, in seconds.
    pub duration_sec: f64,
}

/// The full mutable state of one workflow run, checkpointed atomically
/// after every step transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// This run's identifier.
    pub workflow_id: WorkflowId,
    /// The definition this state tracks execution against.
    pub definition: WorkflowDefinition,
    /// Current lifecycle status.
    pub status: WorkflowStatus,
    /// Steps that completed successfully.
    pub completed: Vec<StepId>,
    /// Steps whose sub-agent run failed.
    pub failed: Vec<StepId>,
    /// Steps skipped because their condition evaluated false.
    pub skipped: Vec<StepId>,
    /// Steps currently running. A list rather than a single id since the
    /// scheduler launches up to `maxParallel` steps at once.
    pub running: Vec<StepId>,
    /// Per-step results, keyed by step id.
    pub step_results: HashMap<StepId, StepResult>,
    /// When this run was created.
    pub created_at: Timestamp,
    /// When this state was last mutated.
    pub updated_at: Timestamp,
    /// Terminal failure detail (e.g. a timeout), when `status` is `failed`.
    pub error: Option<String>,
}

impl WorkflowState {
    /// A fresh, `pending` state for a newly validated definition.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, definition: WorkflowDefinition) -> Self {
        let now = chrono::Utc::now();
        Self {
            workflow_id,
            definition,
            status: WorkflowStatus::Pending,
            completed: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            running: Vec::new(),
            step_results: HashMap::new(),
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }

    /// Record a step as launched.
    pub fn mark_running(&mut self, id: StepId) {
        self.running.push(id);
        self.touch();
    }

    /// Record a step's terminal result, moving it out of `running` and into
    /// `completed` or `failed`.
    pub fn record_result(&mut self, id: StepId, result: StepResult) {
        self.running.retain(|r| r != &id);
        if result.success {
            self.completed.push(id.clone());
        } else {
            self.failed.push(id.clone());
        }
        self.step_results.insert(id, result);
        self.touch();
    }

    /// Record a step as skipped by its condition. Treated as "completed,
    /// result absent" by dependents.
    pub fn record_skipped(&mut self, id: StepId) {
        self.running.retain(|r| r != &id);
        self.skipped.push(id);
        self.touch();
    }

    /// Whether a step has already reached a terminal outcome (completed,
    /// failed, or skipped) in this state — used by the scheduler to avoid
    /// re-running a step on resume.
    #[must_use]
    pub fn is_terminal_step(&self, id: &StepId) -> bool {
        self.completed.contains(id) || self.failed.contains(id) || self.skipped.contains(id)
    }

    /// The condition-evaluation environment: `{stepId => {success, result}}`
    /// for every step that has produced a result so far. A step absent
    /// from this map (not yet run, still running, or skipped) resolves to
    /// `undefined` field access, per the condition grammar's semantics.
    #[must_use]
    pub fn condition_env(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (id, result) in &self.step_results {
            map.insert(
                id.as_str().to_string(),
                serde_json::json!({
                    "success": result.success,
                    "result": result.result.clone().unwrap_or(serde_json::Value::Null),
                }),
            );
        }
        serde_json::Value::Object(map)
    }
}

/// Parse a sub-agent's raw text output as JSON when possible, so condition
/// expressions can address nested fields (`review.result.count`); falls
/// back to a plain JSON string when the output is not itself valid JSON.
#[must_use]
pub fn output_to_result_value(output: &str) -> serde_json::Value {
    serde_json::from_str(output).unwrap_or_else(|_| serde_json::Value::String(output.to_string()))
}

/// Durable, atomic checkpoint storage for workflow runs, one file per run
/// under a dedicated directory — mirroring the Session Store's write
/// pattern (temp file in the same directory, fsync, rename over target)
/// without the backup-rotation layer a long-lived session needs.
pub struct WorkflowCheckpointStore {
    config_dir: PathBuf,
}

impl WorkflowCheckpointStore {
    /// Build a store rooted at `config_dir` (checkpoints land under
    /// `<config_dir>/workflows`).
    #[must_use]
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self { config_dir: config_dir.into() }
    }

    fn path_for(&self, id: &WorkflowId) -> PathBuf {
        forge_core::dirs::workflow_checkpoint_path(&self.config_dir, id)
    }

    /// Atomically persist `state`'s current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Io`] on filesystem failure or
    /// [`ForgeError::Serialization`] if the state cannot be encoded.
    pub async fn save(&self, state: &WorkflowState) -> ForgeResult<()> {
        let dir = forge_core::dirs::workflows_dir(&self.config_dir);
        tokio::fs::create_dir_all(&dir).await?;
        let path = self.path_for(&state.workflow_id);
        let state = state.clone();
        tokio::task::spawn_blocking(move || write_checkpoint(&path, &state))
            .await
            .map_err(|e| ForgeError::Internal(e.to_string()))??;
        Ok(())
    }

    /// Load the latest checkpoint for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Internal`] if no checkpoint exists, or
    /// [`ForgeError::Serialization`] if the file is corrupt.
    pub async fn load(&self, id: &WorkflowId) -> ForgeResult<WorkflowState> {
        let path = self.path_for(id);
        let id = id.clone();
        tokio::task::spawn_blocking(move || read_checkpoint(&id, &path))
            .await
            .map_err(|e| ForgeError::Internal(e.to_string()))?
    }

    /// Delete a run's checkpoint file, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Io`] on filesystem failure.
    pub async fn delete(&self, id: &WorkflowId) -> ForgeResult<()> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_checkpoint(path: &Path, state: &WorkflowState) -> ForgeResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let body = serde_json::to_string_pretty(state)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(body.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ForgeError::Io(e.error))?;
    Ok(())
}

fn read_checkpoint(id: &WorkflowId, path: &Path) -> ForgeResult<WorkflowState> {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).map_err(ForgeError::Serialization),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ForgeError::Internal(format!("no checkpoint found for workflow {id}")))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowDefinition;
    use tempfile::TempDir;

    fn sample_definition() -> WorkflowDefinition {
        WorkflowDefinition::from_yaml(
            r#"
name: sample
version: "1"
steps:
  - id: a
    agent_type: general-purpose
    task_template: "do a"
"#,
        )
        .unwrap()
    }

    #[test]
    fn condition_env_reflects_recorded_results() {
        let mut state = WorkflowState::new(WorkflowId::new(), sample_definition());
        state.record_result(
            StepId::new("a"),
            StepResult {
                agent_run_id: None,
                success: true,
                result: Some(output_to_result_value(r#"{"count": 3}"#)),
                error: None,
                started_at: chrono::Utc::now(),
                ended_at: chrono::Utc::now(),
                duration_sec: 1.0,
            },
        );
        let env = state.condition_env();
        assert_eq!(env["a"]["success"], serde_json::json!(true));
        assert_eq!(env["a"]["result"]["count"], serde_json::json!(3));
    }

    #[test]
    fn non_json_output_is_preserved_as_a_plain_string() {
        let value = output_to_result_value("plain text output");
        assert_eq!(value, serde_json::Value::String("plain text output".to_string()));
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowCheckpointStore::new(dir.path());
        let state = WorkflowState::new(WorkflowId::new(), sample_definition());

        store.save(&state).await.unwrap();
        let loaded = store.load(&state.workflow_id).await.unwrap();
        assert_eq!(loaded.workflow_id, state.workflow_id);
        assert_eq!(loaded.status, WorkflowStatus::Pending);
    }

    #[tokio::test]
    async fn missing_checkpoint_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowCheckpointStore::new(dir.path());
        let result = store.load(&WorkflowId::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_removes_the_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowCheckpointStore::new(dir.path());
        let state = WorkflowState::new(WorkflowId::new(), sample_definition());
        store.save(&state).await.unwrap();
        store.delete(&state.workflow_id).await.unwrap();
        assert!(store.load(&state.workflow_id).await.is_err());
    }

    #[test]
    fn record_skipped_is_treated_as_terminal() {
        let mut state = WorkflowState::new(WorkflowId::new(), sample_definition());
        state.mark_running(StepId::new("a"));
        state.record_skipped(StepId::new("a"));
        assert!(state.running.is_empty());
        assert!(state.is_terminal_step(&StepId::new("a")));
    }
}
