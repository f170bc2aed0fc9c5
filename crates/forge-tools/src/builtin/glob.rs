//! Glob tool — finds files matching a glob pattern.

use std::fmt::Write;
use std::path::PathBuf;
use std::time::SystemTime;

use async_trait::async_trait;
use serde_json::Value;
use walkdir::WalkDir;

use crate::context::ToolContext;
use crate::descriptor::{HandlerError, ToolHandler};

/// Built-in tool for finding files by glob pattern.
pub struct GlobTool;

impl GlobTool {
    /// Description surfaced to the LLM.
    pub const DESCRIPTION: &'static str = "Finds files matching a glob pattern (e.g. \"**/*.rs\", \"src/**/*.ts\"). \
         Returns matching file paths sorted by modification time (most recent first).";

    /// JSON schema for this tool's arguments.
    #[must_use]
    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match files against"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (defaults to workspace root)"
                }
            },
            "required": ["pattern"]
        })
    }
}

#[async_trait]
impl ToolHandler for GlobTool {
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String, HandlerError> {
        let pattern = args.get("pattern").and_then(Value::as_str).ok_or_else(|| HandlerError::InvalidArguments("pattern is required".into()))?;

        let search_dir = args.get("path").and_then(Value::as_str).map_or_else(|| ctx.workspace_root.clone(), PathBuf::from);

        if !search_dir.exists() {
            return Err(HandlerError::NotFound(search_dir.display().to_string()));
        }
        let search_dir = search_dir.canonicalize().map_err(|e| HandlerError::ExecutionFailed(e.to_string()))?;

        let glob = globset::GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|e| HandlerError::InvalidArguments(format!("invalid glob pattern: {e}")))?
            .compile_matcher();

        let mut matches: Vec<(PathBuf, SystemTime)> = Vec::new();
        for entry in WalkDir::new(&search_dir).follow_links(false).into_iter().filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            e.file_name().to_str().is_none_or(|s| !s.starts_with('.'))
        }) {
            let Ok(entry) = entry else { continue };
            if entry.file_type().is_dir() {
                continue;
            }

            let rel_path = entry.path().strip_prefix(&search_dir).unwrap_or(entry.path());
            if glob.is_match(rel_path) {
                let mtime = entry.metadata().ok().and_then(|m| m.modified().ok()).unwrap_or(SystemTime::UNIX_EPOCH);
                matches.push((entry.path().to_path_buf(), mtime));
            }
        }

        matches.sort_by(|a, b| b.1.cmp(&a.1));

        if matches.is_empty() {
            return Ok(format!("No files matching \"{pattern}\" found"));
        }

        let mut output = String::new();
        for (path, _) in &matches {
            output.push_str(&path.display().to_string());
            output.push('\n');
        }
        let _ = write!(output, "\n({} files matched)", matches.len());
        Ok(crate::builtin::truncate_output(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn ctx(root: &std::path::Path) -> ToolContext {
        ToolContext::new(root.to_path_buf(), "test", Arc::new(forge_events::EventBus::new()))
    }

    #[tokio::test]
    async fn matches_simple_pattern() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("c.txt"), "").unwrap();

        let result = GlobTool.call(serde_json::json!({"pattern": "*.rs"}), &ctx(dir.path())).await.unwrap();
        assert!(result.contains("a.rs"));
        assert!(!result.contains("c.txt"));
    }

    #[tokio::test]
    async fn recursive_pattern_descends_subdirectories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/sub")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/sub/lib.rs"), "").unwrap();

        let result = GlobTool.call(serde_json::json!({"pattern": "**/*.rs"}), &ctx(dir.path())).await.unwrap();
        assert!(result.contains("main.rs"));
        assert!(result.contains("lib.rs"));
    }

    #[tokio::test]
    async fn skips_hidden_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "").unwrap();
        std::fs::write(dir.path().join("visible.rs"), "").unwrap();

        let result = GlobTool.call(serde_json::json!({"pattern": "**/*"}), &ctx(dir.path())).await.unwrap();
        assert!(result.contains("visible.rs"));
        assert!(!result.contains(".git"));
    }

    #[tokio::test]
    async fn invalid_pattern_is_invalid_argument() {
        let result = GlobTool.call(serde_json::json!({"pattern": "[invalid"}), &ctx(&std::env::temp_dir())).await;
        assert!(matches!(result, Err(HandlerError::InvalidArguments(_))));
    }
}
