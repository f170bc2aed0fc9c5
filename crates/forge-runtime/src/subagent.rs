//! Sub-Agent pool: concurrency and depth bookkeeping for Task-tool-spawned
//! child agent runs.
//!
//! One pool is shared by a whole top-level run and every descendant it
//! spawns, so depth is tracked relative to the true root (not reset per
//! branch) and the concurrency semaphore is a single shared budget rather
//! than one per parent.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use forge_core::{AgentRunId, ForgeError, ForgeResult};
use tokio::sync::{Notify, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::runtime::RunOutcome;

/// Default number of completed sub-agent runs retained for history before
/// FIFO eviction.
const DEFAULT_MAX_HISTORY: usize = 1000;

/// Lifecycle state of one sub-agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubAgentStatus {
    /// Registered but not yet streaming.
    Initializing,
    /// The agent runtime loop is in progress.
    Running,
    /// Finished with a completed [`RunOutcome`].
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before reaching a terminal state on its own.
    Cancelled,
    /// Exceeded its configured wall-clock budget.
    TimedOut,
}

impl SubAgentStatus {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut)
    }
}

impl std::fmt::Display for SubAgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        })
    }
}

/// Handle to one tracked sub-agent run, shared between the pool and
/// whatever spawned it.
pub struct SubAgentHandle {
    /// This run's id, doubling as its `AgentRunId` in events/hooks.
    pub id: AgentRunId,
    /// The run that spawned this one, if any.
    pub parent_id: Option<AgentRunId>,
    /// The registered agent type this run was spawned as.
    pub agent_type: String,
    /// The task description passed to the Task tool.
    pub task: String,
    /// Depth relative to the true top-level run (0).
    pub depth: u32,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    status: RwLock<SubAgentStatus>,
    completed_at: RwLock<Option<DateTime<Utc>>>,
    outcome: RwLock<Option<RunOutcome>>,
    error: RwLock<Option<String>>,
    cancel: CancellationToken,
    permit: std::sync::Mutex<Option<OwnedSemaphorePermit>>,
}

impl SubAgentHandle {
    fn new(agent_type: impl Into<String>, task: impl Into<String>, parent_id: Option<AgentRunId>, depth: u32, permit: OwnedSemaphorePermit, cancel: CancellationToken) -> Self {
        Self {
            id: AgentRunId::new(),
            parent_id,
            agent_type: agent_type.into(),
            task: task.into(),
            depth,
            started_at: Utc::now(),
            status: RwLock::new(SubAgentStatus::Initializing),
            completed_at: RwLock::new(None),
            outcome: RwLock::new(None),
            error: RwLock::new(None),
            cancel,
            permit: std::sync::Mutex::new(Some(permit)),
        }
    }

    /// Current lifecycle state.
    pub async fn status(&self) -> SubAgentStatus {
        *self.status.read().await
    }

    /// Cooperative cancellation token for this run, to be threaded into
    /// `AgentRuntime::run`.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn set_status(&self, status: SubAgentStatus) {
        *self.status.write().await = status;
        if status.is_terminal() {
            *self.completed_at.write().await = Some(Utc::now());
        }
    }

    /// Transition to `Running`.
    pub async fn mark_running(&self) {
        self.set_status(SubAgentStatus::Running).await;
    }

    /// Record a completed outcome and transition to a terminal state. A
    /// `Cancelled` [`RunOutcome`] is recorded as `Cancelled`, not
    /// `Completed`.
    pub async fn complete(&self, outcome: RunOutcome) {
        let status = match outcome.status {
            crate::runtime::RunStatus::Completed => SubAgentStatus::Completed,
            crate::runtime::RunStatus::Cancelled => SubAgentStatus::Cancelled,
        };
        *self.outcome.write().await = Some(outcome);
        self.set_status(status).await;
    }

    /// Record a failure and transition to `Failed`.
    pub async fn fail(&self, error: impl Into<String>) {
        *self.error.write().await = Some(error.into());
        self.set_status(SubAgentStatus::Failed).await;
    }

    /// Transition to `TimedOut`.
    pub async fn timeout(&self) {
        self.set_status(SubAgentStatus::TimedOut).await;
    }

    /// The recorded outcome, once terminal.
    pub async fn outcome(&self) -> Option<RunOutcome> {
        self.outcome.read().await.clone()
    }

    /// The recorded error message, if this run failed.
    pub async fn error(&self) -> Option<String> {
        self.error.read().await.clone()
    }

    /// Whether this run has reached a terminal state.
    pub async fn is_done(&self) -> bool {
        self.status().await.is_terminal()
    }

    fn release_permit(&self) {
        let _ = self.permit.lock().expect("sub-agent permit mutex poisoned").take();
    }
}

/// Pool tracking every live and recently-completed sub-agent run spawned
/// (directly or transitively) by one top-level agent run.
pub struct SubAgentPool {
    max_depth: u32,
    max_history: usize,
    semaphore: Arc<Semaphore>,
    active: RwLock<HashMap<AgentRunId, Arc<SubAgentHandle>>>,
    completed: RwLock<VecDeque<Arc<SubAgentHandle>>>,
    completion_notify: Notify,
}

impl SubAgentPool {
    /// Build a pool with the default history retention (1000 entries).
    #[must_use]
    pub fn new(max_concurrent: usize, max_depth: u32) -> Self {
        Self::with_max_history(max_concurrent, max_depth, DEFAULT_MAX_HISTORY)
    }

    /// Build a pool with explicit history retention.
    #[must_use]
    pub fn with_max_history(max_concurrent: usize, max_depth: u32, max_history: usize) -> Self {
        Self {
            max_depth,
            max_history,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            active: RwLock::new(HashMap::new()),
            completed: RwLock::new(VecDeque::new()),
            completion_notify: Notify::new(),
        }
    }

    /// Register a new sub-agent run one level deeper than `parent` (or at
    /// depth 0 if this is the first level). Fails `DEPTH_EXCEEDED` once the
    /// child's depth would exceed `max_depth`, and fails `LIMIT_EXCEEDED`
    /// if the pool's concurrency budget is exhausted.
    ///
    /// Depth exceeding is checked as `depth > max_depth`, not `>=`: a run
    /// at exactly `max_depth` is the deepest one still allowed to run, only
    /// the next level past it is rejected.
    pub async fn spawn(&self, agent_type: impl Into<String>, task: impl Into<String>, parent: Option<&SubAgentHandle>) -> ForgeResult<Arc<SubAgentHandle>> {
        let depth = parent.map_or(0, |p| p.depth + 1);
        if depth > self.max_depth {
            return Err(ForgeError::DepthExceeded { max: self.max_depth });
        }

        let permit = self.semaphore.clone().try_acquire_owned().map_err(|_| ForgeError::LimitExceeded {
            limit: "max_concurrent_subagents".to_string(),
            cap: self.semaphore.available_permits() as u64,
            reached: self.semaphore.available_permits() as u64 + 1,
        })?;

        let handle = Arc::new(SubAgentHandle::new(agent_type, task, parent.map(|p| p.id.clone()), depth, permit, CancellationToken::new()));
        self.active.write().await.insert(handle.id.clone(), handle.clone());
        Ok(handle)
    }

    /// Remove a run from the active table (its status should already be
    /// terminal) and move it into history, releasing its concurrency
    /// permit so another run can be spawned.
    pub async fn release(&self, id: &AgentRunId) {
        let mut active = self.active.write().await;
        if let Some(handle) = active.remove(id) {
            handle.release_permit();
            self.push_history(handle).await;
            if active.is_empty() {
                self.completion_notify.notify_waiters();
            }
        }
    }

    /// Cancel an active run and move it into history.
    pub async fn stop(&self, id: &AgentRunId) -> Option<Arc<SubAgentHandle>> {
        let mut active = self.active.write().await;
        if let Some(handle) = active.remove(id) {
            handle.cancel.cancel();
            handle.release_permit();
            self.push_history(handle.clone()).await;
            if active.is_empty() {
                self.completion_notify.notify_waiters();
            }
            Some(handle)
        } else {
            None
        }
    }

    async fn push_history(&self, handle: Arc<SubAgentHandle>) {
        let mut completed = self.completed.write().await;
        if completed.len() >= self.max_history {
            completed.pop_front();
        }
        completed.push_back(handle);
    }

    /// Look up an active run.
    pub async fn get(&self, id: &AgentRunId) -> Option<Arc<SubAgentHandle>> {
        self.active.read().await.get(id).cloned()
    }

    /// Every currently active run.
    pub async fn list_active(&self) -> Vec<Arc<SubAgentHandle>> {
        self.active.read().await.values().cloned().collect()
    }

    /// Number of currently active runs.
    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    /// Remaining concurrency budget.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait until the active table is empty (used by shutdown/drain paths).
    pub async fn wait_idle(&self) {
        while self.active_count().await > 0 {
            self.completion_notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RunStatus;

    fn outcome(status: RunStatus) -> RunOutcome {
        RunOutcome { status, output: None, usage: crate::runtime::RunUsage::default() }
    }

    #[tokio::test]
    async fn depth_zero_and_depth_equal_to_max_both_succeed() {
        let pool = SubAgentPool::new(10, 2);
        let root = pool.spawn("reviewer", "review the diff", None).await.expect("depth 0 allowed");
        assert_eq!(root.depth, 0);
        let child = pool.spawn("reviewer", "nested", Some(&root)).await.expect("depth 1 allowed");
        assert_eq!(child.depth, 1);
        let grandchild = pool.spawn("reviewer", "deeper", Some(&child)).await.expect("depth == max_depth allowed");
        assert_eq!(grandchild.depth, 2);
    }

    #[tokio::test]
    async fn depth_exceeding_max_by_exactly_one_is_rejected() {
        let pool = SubAgentPool::new(10, 1);
        let root = pool.spawn("reviewer", "top", None).await.unwrap();
        let child = pool.spawn("reviewer", "at max depth", Some(&root)).await.unwrap();
        assert_eq!(child.depth, 1);
        let err = pool.spawn("reviewer", "one too deep", Some(&child)).await.unwrap_err();
        assert_eq!(err.kind(), forge_core::ErrorKind::DepthExceeded);
    }

    #[tokio::test]
    async fn concurrency_cap_rejects_once_the_budget_is_exhausted() {
        let pool = SubAgentPool::new(1, 5);
        let first = pool.spawn("worker", "a", None).await.expect("first spawn succeeds");
        let err = pool.spawn("worker", "b", None).await.unwrap_err();
        assert_eq!(err.kind(), forge_core::ErrorKind::LimitExceeded);
        pool.release(&first.id).await;
        pool.spawn("worker", "c", None).await.expect("spawn succeeds again after release");
    }

    #[tokio::test]
    async fn release_moves_a_run_out_of_the_active_table() {
        let pool = SubAgentPool::new(5, 5);
        let handle = pool.spawn("worker", "task", None).await.unwrap();
        handle.mark_running().await;
        handle.complete(outcome(RunStatus::Completed)).await;
        assert_eq!(pool.active_count().await, 1);
        pool.release(&handle.id).await;
        assert_eq!(pool.active_count().await, 0);
        assert!(pool.get(&handle.id).await.is_none());
    }

    #[tokio::test]
    async fn stop_cancels_an_active_run() {
        let pool = SubAgentPool::new(5, 5);
        let handle = pool.spawn("worker", "task", None).await.unwrap();
        let cancel = handle.cancellation_token();
        assert!(!cancel.is_cancelled());
        pool.stop(&handle.id).await;
        assert!(cancel.is_cancelled());
        assert_eq!(pool.active_count().await, 0);
    }

    #[tokio::test]
    async fn history_evicts_fifo_past_capacity() {
        let pool = SubAgentPool::with_max_history(5, 5, 2);
        for i in 0..5 {
            let handle = pool.spawn("worker", format!("task {i}"), None).await.unwrap();
            handle.complete(outcome(RunStatus::Completed)).await;
            pool.release(&handle.id).await;
        }
        assert_eq!(pool.completed.read().await.len(), 2);
    }
}
