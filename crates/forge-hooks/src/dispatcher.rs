//! The Hook Dispatcher: fires named lifecycle events to user-configured
//! external commands with timeout, retry, and dry-run support.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use forge_core::env_policy;
use forge_core::retry::RetryConfig;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::error::{HookError, HookResult};
use crate::event::HookEvent;
use crate::hook::Hook;

/// Tuning knobs for the dispatcher, mirroring `forge_config::HooksSection`.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Timeout applied when a [`Hook`] does not specify its own.
    pub default_timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL on timeout.
    pub kill_grace: Duration,
    /// Exit codes (beyond spawn error / timeout) that count as transient
    /// and are eligible for retry.
    pub retryable_exit_codes: Vec<i32>,
    /// When true, hooks are resolved and logged but never spawned; the
    /// commands that *would* run are returned instead.
    pub dry_run: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            kill_grace: Duration::from_secs(2),
            retryable_exit_codes: Vec::new(),
            dry_run: false,
        }
    }
}

/// The result of running (or, in dry-run mode, resolving) one hook.
#[derive(Debug, Clone)]
pub struct HookOutcome {
    /// The hook's id.
    pub hook_id: String,
    /// Exit code, if the process ran to completion (never set in dry-run
    /// or on an unrecoverable spawn failure).
    pub exit_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Total wall-clock duration across all attempts.
    pub duration: Duration,
    /// Total attempts made (1 = succeeded or failed on the first try).
    pub attempts: u32,
    /// Whether the process was killed for exceeding its timeout.
    pub timed_out: bool,
    /// In dry-run mode, the command line that would have been executed.
    pub dry_run_command: Option<String>,
}

impl HookOutcome {
    /// Whether this outcome represents success: ran to completion, exit
    /// code zero, did not time out.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Fires lifecycle events against registered [`Hook`]s.
///
/// Hooks matching the same registration never run concurrently with
/// themselves — each hook id has its own queue lock — which prevents a slow
/// or hung hook from self-fork-bombing under a busy event stream.
pub struct HookDispatcher {
    hooks: Vec<Hook>,
    config: DispatcherConfig,
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl HookDispatcher {
    /// Build a dispatcher from a fixed set of registered hooks.
    #[must_use]
    pub fn new(hooks: Vec<Hook>, config: DispatcherConfig) -> Self {
        Self {
            hooks,
            config,
            locks: DashMap::new(),
        }
    }

    /// Fire `event` for `subject` (a tool or agent type name, when the
    /// event carries one) with `payload` delivered on each matching hook's
    /// stdin as compact JSON.
    ///
    /// Returns every matching hook's outcome. If any *blocking* hook on a
    /// `*:pre` event exited non-zero, returns `Err(HookError::Blocked)`
    /// instead — per spec, a blocked pre-event aborts the about-to-happen
    /// operation and later hooks in the batch are not run.
    pub async fn dispatch(&self, event: HookEvent, subject: Option<&str>, payload: Value) -> HookResult<Vec<HookOutcome>> {
        let matching: Vec<&Hook> = self.hooks.iter().filter(|h| h.applies_to(event, subject)).collect();
        let mut outcomes = Vec::with_capacity(matching.len());

        for hook in matching {
            let outcome = self.run_hook(hook, &payload).await;

            if event.is_pre() && hook.blocking && !outcome.is_success() {
                let reason = if outcome.timed_out {
                    "hook timed out".to_string()
                } else if !outcome.stderr.is_empty() {
                    outcome.stderr.clone()
                } else {
                    format!("exit code {:?}", outcome.exit_code)
                };
                return Err(HookError::Blocked {
                    hook: hook.id.clone(),
                    reason,
                });
            }

            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn run_hook(&self, hook: &Hook, payload: &Value) -> HookOutcome {
        if self.config.dry_run {
            return HookOutcome {
                hook_id: hook.id.clone(),
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::ZERO,
                attempts: 0,
                timed_out: false,
                dry_run_command: Some(render_command_line(hook)),
            };
        }

        let lock = Arc::clone(
            self.locks
                .entry(hook.id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .value(),
        );
        let _guard = lock.lock().await;

        let timeout = Duration::from_millis(hook.timeout_ms.unwrap_or(self.config.default_timeout.as_millis() as u64));
        let retry_config = RetryConfig::new(hook.max_retries, Duration::from_millis(200), Duration::from_secs(5), 2.0);

        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let single = execute_once(hook, payload, timeout, self.config.kill_grace).await;
            let retryable = is_retryable(&single, &self.config.retryable_exit_codes);

            if !retryable || !retry_config.should_retry(attempt - 1) {
                return HookOutcome {
                    duration: started.elapsed(),
                    attempts: attempt,
                    ..single
                };
            }

            let delay = retry_config.delay_for_attempt(attempt);
            debug!(hook = %hook.id, attempt, delay_ms = delay.as_millis(), "retrying transient hook failure");
            tokio::time::sleep(delay).await;
        }
    }
}

fn is_retryable(outcome: &HookOutcome, retryable_exit_codes: &[i32]) -> bool {
    if outcome.timed_out {
        return true;
    }
    match outcome.exit_code {
        None => true, // spawn failure
        Some(0) => false,
        Some(code) => retryable_exit_codes.contains(&code),
    }
}

fn render_command_line(hook: &Hook) -> String {
    let mut parts = vec![hook.command.clone()];
    parts.extend(hook.args.iter().cloned());
    parts.join(" ")
}

async fn execute_once(hook: &Hook, payload: &Value, timeout: Duration, kill_grace: Duration) -> HookOutcome {
    let mut cmd = Command::new(&hook.command);
    cmd.args(&hook.args);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    if let Some(dir) = &hook.working_dir {
        cmd.current_dir(dir);
    }

    let (allowed_overrides, stripped) = env_policy::filter_env(hook.env.clone());
    if !stripped.is_empty() {
        warn!(hook = %hook.id, vars = ?stripped, "hook env override attempted a denylisted variable, stripped");
    }
    for (key, value) in allowed_overrides {
        cmd.env(key, value);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return HookOutcome {
                hook_id: hook.id.clone(),
                exit_code: None,
                stdout: String::new(),
                stderr: format!("failed to spawn hook: {e}"),
                duration: Duration::ZERO,
                attempts: 0,
                timed_out: false,
                dry_run_command: None,
            };
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let body = payload.to_string();
        let _ = stdin.write_all(body.as_bytes()).await;
        let _ = stdin.shutdown().await;
    }

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });

    let wait_result = tokio::time::timeout(timeout, child.wait()).await;

    match wait_result {
        Ok(Ok(status)) => HookOutcome {
            hook_id: hook.id.clone(),
            exit_code: status.code(),
            stdout: stdout_task.await.unwrap_or_default(),
            stderr: stderr_task.await.unwrap_or_default(),
            duration: Duration::ZERO,
            attempts: 0,
            timed_out: false,
            dry_run_command: None,
        },
        Ok(Err(e)) => HookOutcome {
            hook_id: hook.id.clone(),
            exit_code: None,
            stdout: String::new(),
            stderr: format!("error waiting on hook process: {e}"),
            duration: Duration::ZERO,
            attempts: 0,
            timed_out: false,
            dry_run_command: None,
        },
        Err(_elapsed) => {
            terminate(&mut child, kill_grace).await;
            HookOutcome {
                hook_id: hook.id.clone(),
                exit_code: None,
                stdout: stdout_task.await.unwrap_or_default(),
                stderr: stderr_task.await.unwrap_or_default(),
                duration: Duration::ZERO,
                attempts: 0,
                timed_out: true,
                dry_run_command: None,
            }
        }
    }
}

#[cfg(unix)]
async fn terminate(child: &mut tokio::process::Child, kill_grace: Duration) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
    if tokio::time::timeout(kill_grace, child.wait()).await.is_err() {
        let _ = child.kill().await;
        let _ = child.wait().await;
    }
}

#[cfg(not(unix))]
async fn terminate(child: &mut tokio::process::Child, _kill_grace: Duration) {
    let _ = child.kill().await;
    let _ = child.wait().await;
}

/// Build the payload every hook receives on stdin: the event name plus an
/// arbitrary JSON body supplied by the caller.
#[must_use]
pub fn build_payload(event: HookEvent, subject: Option<&str>, mut body: HashMap<String, Value>) -> Value {
    body.insert("event".to_string(), Value::String(event.name().to_string()));
    if let Some(subject) = subject {
        body.insert("subject".to_string(), Value::String(subject.to_string()));
    }
    serde_json::to_value(body).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn echo_hook(id: &str, blocking: bool) -> Hook {
        let mut hook = Hook::new(id, HookEvent::ToolPre, "sh").with_match_pattern("*");
        hook.args = vec!["-c".to_string(), "cat >/dev/null; exit 0".to_string()];
        hook.blocking = blocking;
        hook
    }

    #[tokio::test]
    async fn successful_hook_runs_and_reports_success() {
        let dispatcher = HookDispatcher::new(vec![echo_hook("h1", false)], DispatcherConfig::default());
        let outcomes = dispatcher
            .dispatch(HookEvent::ToolPre, Some("bash"), serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_success());
    }

    #[tokio::test]
    async fn non_matching_hook_is_skipped() {
        let hook = Hook::new("h1", HookEvent::ToolPost, "true");
        let dispatcher = HookDispatcher::new(vec![hook], DispatcherConfig::default());
        let outcomes = dispatcher
            .dispatch(HookEvent::ToolPre, Some("bash"), serde_json::json!({}))
            .await
            .unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn blocking_failure_on_pre_event_aborts() {
        let mut hook = Hook::new("h1", HookEvent::ToolPre, "sh").blocking();
        hook.args = vec!["-c".to_string(), "exit 1".to_string()];
        let dispatcher = HookDispatcher::new(vec![hook], DispatcherConfig::default());
        let result = dispatcher.dispatch(HookEvent::ToolPre, Some("bash"), serde_json::json!({})).await;
        assert!(matches!(result, Err(HookError::Blocked { .. })));
    }

    #[tokio::test]
    async fn non_blocking_failure_is_reported_not_raised() {
        let mut hook = Hook::new("h1", HookEvent::ToolPost, "sh");
        hook.args = vec!["-c".to_string(), "exit 1".to_string()];
        let dispatcher = HookDispatcher::new(vec![hook], DispatcherConfig::default());
        let outcomes = dispatcher
            .dispatch(HookEvent::ToolPost, Some("bash"), serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(outcomes[0].exit_code, Some(1));
        assert!(!outcomes[0].is_success());
    }

    #[tokio::test]
    async fn timeout_kills_the_process() {
        let mut hook = Hook::new("h1", HookEvent::ToolPre, "sh");
        hook.args = vec!["-c".to_string(), "sleep 5".to_string()];
        hook.timeout_ms = Some(50);
        let dispatcher = HookDispatcher::new(
            vec![hook],
            DispatcherConfig {
                kill_grace: Duration::from_millis(50),
                ..DispatcherConfig::default()
            },
        );
        let outcomes = dispatcher
            .dispatch(HookEvent::ToolPre, Some("bash"), serde_json::json!({}))
            .await
            .unwrap();
        assert!(outcomes[0].timed_out);
    }

    #[tokio::test]
    async fn dry_run_never_spawns() {
        let mut hook = Hook::new("h1", HookEvent::ToolPre, "sh");
        hook.args = vec!["-c".to_string(), "exit 1".to_string()];
        let dispatcher = HookDispatcher::new(vec![hook], DispatcherConfig { dry_run: true, ..DispatcherConfig::default() });
        let outcomes = dispatcher
            .dispatch(HookEvent::ToolPre, Some("bash"), serde_json::json!({}))
            .await
            .unwrap();
        assert!(outcomes[0].dry_run_command.is_some());
        assert_eq!(outcomes[0].exit_code, None);
    }

    #[tokio::test]
    async fn env_denylist_is_stripped_from_hook_env() {
        let mut hook = Hook::new("h1", HookEvent::ToolPre, "sh");
        hook.env.insert("LD_PRELOAD".to_string(), "evil.so".to_string());
        hook.args = vec!["-c".to_string(), "test -z \"$LD_PRELOAD\"".to_string()];
        let dispatcher = HookDispatcher::new(vec![hook], DispatcherConfig::default());
        let outcomes = dispatcher
            .dispatch(HookEvent::ToolPre, Some("bash"), serde_json::json!({}))
            .await
            .unwrap();
        assert!(outcomes[0].is_success());
    }

    #[test]
    fn payload_carries_event_and_subject() {
        let payload = build_payload(HookEvent::ToolPre, Some("bash"), StdHashMap::new());
        assert_eq!(payload["event"], "tool:pre");
        assert_eq!(payload["subject"], "bash");
    }
}
