//! Grep tool — searches file contents by regular expression.

use std::fmt::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use walkdir::WalkDir;

use crate::context::ToolContext;
use crate::descriptor::{HandlerError, ToolHandler};

const MAX_MATCHES: usize = 500;

/// Built-in tool for searching file contents by regular expression.
pub struct GrepTool;

impl GrepTool {
    /// Description surfaced to the LLM.
    pub const DESCRIPTION: &'static str = "Searches file contents for a regular expression pattern. \
         Returns matching lines as \"path:line: text\", capped at 500 matches. \
         Use `glob` to filter the file set narrower than `path`.";

    /// JSON schema for this tool's arguments.
    #[must_use]
    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search in (defaults to workspace root)"
                },
                "glob": {
                    "type": "string",
                    "description": "Restrict the search to files whose relative path matches this glob"
                }
            },
            "required": ["pattern"]
        })
    }
}

#[async_trait]
impl ToolHandler for GrepTool {
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String, HandlerError> {
        let pattern = args.get("pattern").and_then(Value::as_str).ok_or_else(|| HandlerError::InvalidArguments("pattern is required".into()))?;
        let regex = Regex::new(pattern).map_err(|e| HandlerError::InvalidArguments(format!("invalid regex: {e}")))?;

        let search_root = args.get("path").and_then(Value::as_str).map_or_else(|| ctx.workspace_root.clone(), PathBuf::from);
        if !search_root.exists() {
            return Err(HandlerError::NotFound(search_root.display().to_string()));
        }

        let file_glob = args
            .get("glob")
            .and_then(Value::as_str)
            .map(|p| globset::GlobBuilder::new(p).literal_separator(false).build().map(|g| g.compile_matcher()))
            .transpose()
            .map_err(|e| HandlerError::InvalidArguments(format!("invalid glob: {e}")))?;

        let files: Vec<PathBuf> = if search_root.is_file() {
            vec![search_root.clone()]
        } else {
            WalkDir::new(&search_root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || e.file_name().to_str().is_none_or(|s| !s.starts_with('.')))
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| e.path().to_path_buf())
                .collect()
        };

        let mut output = String::new();
        let mut match_count = 0usize;

        'files: for path in &files {
            if let Some(glob) = &file_glob {
                let rel = path.strip_prefix(&search_root).unwrap_or(path);
                if !glob.is_match(rel) {
                    continue;
                }
            }

            let Ok(text) = tokio::fs::read_to_string(path).await else { continue };
            for (idx, line) in text.lines().enumerate() {
                if regex.is_match(line) {
                    let _ = writeln!(output, "{}:{}: {}", path.display(), idx + 1, line.trim_end());
                    match_count += 1;
                    if match_count >= MAX_MATCHES {
                        let _ = writeln!(output, "\n(stopped after {MAX_MATCHES} matches)");
                        break 'files;
                    }
                }
            }
        }

        if match_count == 0 {
            return Ok(format!("No matches for \"{pattern}\""));
        }
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
    async fn finds_matching_lines() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\nstruct Foo;\n").unwrap();

        let result = GrepTool.call(serde_json::json!({"pattern": "struct \\w+"}), &ctx(dir.path())).await.unwrap();
        assert!(result.contains("struct Foo"));
        assert!(result.contains("a.rs:2"));
    }

    #[tokio::test]
    async fn no_matches_reports_clearly() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\n").unwrap();

        let result = GrepTool.call(serde_json::json!({"pattern": "nonexistent_token"}), &ctx(dir.path())).await.unwrap();
        assert!(result.contains("No matches"));
    }

    #[tokio::test]
    async fn glob_restricts_file_set() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "needle\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "needle\n").unwrap();

        let result = GrepTool.call(serde_json::json!({"pattern": "needle", "glob": "*.rs"}), &ctx(dir.path())).await.unwrap();
        assert!(result.contains("a.rs"));
        assert!(!result.contains("b.txt"));
    }

    #[tokio::test]
    async fn invalid_regex_is_invalid_argument() {
        let result = GrepTool.call(serde_json::json!({"pattern": "(unterminated"}), &ctx(&std::env::temp_dir())).await;
        assert!(matches!(result, Err(HandlerError::InvalidArguments(_))));
    }
}
