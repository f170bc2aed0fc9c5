//! Bash tool — executes shell commands with a persistent working directory.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use forge_core::env_policy;
use serde_json::Value;
use tokio::process::Command;
use tracing::warn;

use crate::context::ToolContext;
use crate::descriptor::{HandlerError, ToolHandler};

/// Default timeout in milliseconds when the call omits one.
const DEFAULT_TIMEOUT_MS: u64 = 120_000;
/// Hard ceiling on the requested timeout, regardless of argument value.
const MAX_TIMEOUT_MS: u64 = 600_000;
/// Sentinel marking the boundary between command output and the `pwd`
/// probe used to track `cd` across invocations.
const CWD_SENTINEL: &str = "__FORGE_CWD__";

/// Built-in tool for executing bash commands.
///
/// The working directory persists across calls within one agent run via
/// `ctx.cwd` (shared, not cloned — see [`ToolContext`]), the same way a
/// human's shell session persists `cd` between commands.
pub struct BashTool;

impl BashTool {
    /// Description surfaced to the LLM.
    pub const DESCRIPTION: &'static str = "Executes a bash command. The working directory persists between invocations. \
         Use for git, cargo, and other terminal operations. Optional timeout in milliseconds (max 600000).";

    /// JSON schema for this tool's arguments.
    #[must_use]
    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in milliseconds (default: 120000, max: 600000)"
                }
            },
            "required": ["command"]
        })
    }
}

#[async_trait]
impl ToolHandler for BashTool {
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String, HandlerError> {
        let command = args.get("command").and_then(Value::as_str).ok_or_else(|| HandlerError::InvalidArguments("command is required".into()))?;

        let timeout_ms = args.get("timeout").and_then(Value::as_u64).unwrap_or(DEFAULT_TIMEOUT_MS).min(MAX_TIMEOUT_MS);
        let cwd = ctx.cwd.read().await.clone();

        let wrapped = format!("{command}\n__forge_exit__=$?\necho \"{CWD_SENTINEL}\"\npwd\nexit $__forge_exit__");

        let outcome = tokio::select! {
            result = tokio::time::timeout(Duration::from_millis(timeout_ms), run_bash(&wrapped, &cwd)) => result,
            () = ctx.cancellation.cancelled() => return Err(HandlerError::ExecutionFailed("cancelled".to_string())),
        };

        match outcome {
            Ok(Ok((stdout, stderr, exit_code))) => {
                let (output, new_cwd) = parse_sentinel_output(&stdout);
                if let Some(new_cwd) = new_cwd {
                    *ctx.cwd.write().await = new_cwd;
                }

                let mut text = String::new();
                if !output.is_empty() {
                    text.push_str(&output);
                }
                if !stderr.is_empty() {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str("STDERR:\n");
                    text.push_str(&stderr);
                }
                if exit_code != 0 {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&format!("(exit code: {exit_code})"));
                }
                if text.is_empty() {
                    text.push_str("(no output)");
                }
                Ok(crate::builtin::truncate_output(text))
            }
            Ok(Err(e)) => Err(HandlerError::ExecutionFailed(e.to_string())),
            Err(_elapsed) => Err(HandlerError::ExecutionFailed(format!("command timed out after {timeout_ms}ms"))),
        }
    }
}

async fn run_bash(command: &str, cwd: &std::path::Path) -> std::io::Result<(String, String, i32)> {
    let mut cmd = Command::new("bash");
    cmd.arg("-c").arg(command).current_dir(cwd);

    let (_allowed, stripped) = env_policy::filter_env(std::env::vars());
    if !stripped.is_empty() {
        warn!(vars = ?stripped, "denylisted environment variables present in process env, stripping before bash subprocess");
        for name in &stripped {
            cmd.env_remove(name);
        }
    }

    let output = cmd.output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);
    Ok((stdout, stderr, exit_code))
}

fn parse_sentinel_output(stdout: &str) -> (String, Option<PathBuf>) {
    if let Some(pos) = stdout.find(CWD_SENTINEL) {
        let output = stdout[..pos].trim_end().to_string();
        let after = &stdout[pos + CWD_SENTINEL.len()..];
        let new_cwd = after.lines().find(|l| !l.is_empty()).map(|l| PathBuf::from(l.trim()));
        (output, new_cwd)
    } else {
        (stdout.to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ctx(root: &std::path::Path) -> ToolContext {
        ToolContext::new(root.to_path_buf(), "test", Arc::new(forge_events::EventBus::new()))
    }

    #[tokio::test]
    async fn runs_simple_command() {
        let dir = std::env::temp_dir();
        let result = BashTool.call(serde_json::json!({"command": "echo hello"}), &ctx(&dir)).await.unwrap();
        assert!(result.contains("hello"));
    }

    #[tokio::test]
    async fn cwd_persists_across_calls() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        let context = ctx(dir.path());

        BashTool.call(serde_json::json!({"command": "cd sub"}), &context).await.unwrap();
        let result = BashTool.call(serde_json::json!({"command": "pwd"}), &context).await.unwrap();
        assert!(result.contains("sub"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let dir = std::env::temp_dir();
        let result = BashTool.call(serde_json::json!({"command": "exit 3"}), &ctx(&dir)).await.unwrap();
        assert!(result.contains("exit code: 3"));
    }

    #[tokio::test]
    async fn missing_command_is_invalid_argument() {
        let result = BashTool.call(serde_json::json!({}), &ctx(&std::env::temp_dir())).await;
        assert!(matches!(result, Err(HandlerError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn timeout_is_reported_as_execution_failure() {
        let dir = std::env::temp_dir();
        let result = BashTool.call(serde_json::json!({"command": "sleep 5", "timeout": 50}), &ctx(&dir)).await;
        assert!(matches!(result, Err(HandlerError::ExecutionFailed(ref m)) if m.contains("timed out")));
    }
}
