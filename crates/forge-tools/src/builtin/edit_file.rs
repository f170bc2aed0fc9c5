//! Edit file tool — performs exact string replacements in files.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ToolContext;
use crate::descriptor::{HandlerError, ToolHandler};

/// Built-in tool for editing files via string replacement.
pub struct EditFileTool;

impl EditFileTool {
    /// Description surfaced to the LLM.
    pub const DESCRIPTION: &'static str = "Performs exact string replacements in files. The old_string must be unique in the file \
         unless replace_all is true. Fails if old_string is not found or matches multiple times \
         (without replace_all).";

    /// JSON schema for this tool's arguments.
    #[must_use]
    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute path to the file to edit"
                },
                "old_string": {
                    "type": "string",
                    "description": "The exact text to find and replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false)"
                }
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }
}

#[async_trait]
impl ToolHandler for EditFileTool {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, HandlerError> {
        let file_path = args.get("file_path").and_then(Value::as_str).ok_or_else(|| HandlerError::InvalidArguments("file_path is required".into()))?;
        let old_string = args.get("old_string").and_then(Value::as_str).ok_or_else(|| HandlerError::InvalidArguments("old_string is required".into()))?;
        let new_string = args.get("new_string").and_then(Value::as_str).ok_or_else(|| HandlerError::InvalidArguments("new_string is required".into()))?;
        let replace_all = args.get("replace_all").and_then(Value::as_bool).unwrap_or(false);

        let path = std::path::Path::new(file_path);
        if !path.exists() {
            return Err(HandlerError::NotFound(file_path.to_string()));
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| HandlerError::ExecutionFailed(e.to_string()))?;
        let count = content.matches(old_string).count();

        if count == 0 {
            return Err(HandlerError::ExecutionFailed(format!("old_string not found in {file_path}")));
        }
        if count > 1 && !replace_all {
            return Err(HandlerError::ExecutionFailed(format!(
                "old_string found {count} times in {file_path} — use replace_all or provide more context to make it unique"
            )));
        }

        let new_content = if replace_all { content.replace(old_string, new_string) } else { content.replacen(old_string, new_string, 1) };

        tokio::fs::write(path, &new_content).await.map_err(|e| HandlerError::ExecutionFailed(e.to_string()))?;

        if replace_all && count > 1 {
            Ok(format!("Replaced {count} occurrences in {file_path}"))
        } else {
            Ok(format!("Edited {file_path}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn ctx() -> ToolContext {
        ToolContext::new(std::env::temp_dir(), "test", Arc::new(forge_events::EventBus::new()))
    }

    #[tokio::test]
    async fn replaces_unique_match() {
        let f = NamedTempFile::new().unwrap();
        std::fs::write(f.path(), "hello world").unwrap();

        let result = EditFileTool
            .call(serde_json::json!({"file_path": f.path().to_str().unwrap(), "old_string": "hello", "new_string": "goodbye"}), &ctx())
            .await
            .unwrap();

        assert!(result.contains("Edited"));
        assert_eq!(std::fs::read_to_string(f.path()).unwrap(), "goodbye world");
    }

    #[tokio::test]
    async fn non_unique_match_without_replace_all_fails() {
        let f = NamedTempFile::new().unwrap();
        std::fs::write(f.path(), "aaa bbb aaa").unwrap();

        let result = EditFileTool
            .call(serde_json::json!({"file_path": f.path().to_str().unwrap(), "old_string": "aaa", "new_string": "ccc"}), &ctx())
            .await;

        assert!(matches!(result, Err(HandlerError::ExecutionFailed(ref m)) if m.contains("2 times")));
    }

    #[tokio::test]
    async fn replace_all_replaces_every_occurrence() {
        let f = NamedTempFile::new().unwrap();
        std::fs::write(f.path(), "aaa bbb aaa").unwrap();

        let result = EditFileTool
            .call(
                serde_json::json!({"file_path": f.path().to_str().unwrap(), "old_string": "aaa", "new_string": "ccc", "replace_all": true}),
                &ctx(),
            )
            .await
            .unwrap();

        assert!(result.contains("2 occurrences"));
        assert_eq!(std::fs::read_to_string(f.path()).unwrap(), "ccc bbb ccc");
    }

    #[tokio::test]
    async fn missing_old_string_fails() {
        let f = NamedTempFile::new().unwrap();
        std::fs::write(f.path(), "hello world").unwrap();

        let result = EditFileTool
            .call(serde_json::json!({"file_path": f.path().to_str().unwrap(), "old_string": "absent", "new_string": "x"}), &ctx())
            .await;

        assert!(matches!(result, Err(HandlerError::ExecutionFailed(ref m)) if m.contains("not found")));
    }
}
