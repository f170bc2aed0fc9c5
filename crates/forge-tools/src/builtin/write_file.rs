//! Write file tool — creates or overwrites a file with the given content.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ToolContext;
use crate::descriptor::{HandlerError, ToolHandler};

/// Built-in tool for writing files.
pub struct WriteFileTool;

impl WriteFileTool {
    /// Description surfaced to the LLM.
    pub const DESCRIPTION: &'static str = "Writes content to a file, creating it (and any missing parent directories) if it does not exist, \
         or overwriting it if it does.";

    /// JSON schema for this tool's arguments.
    #[must_use]
    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["file_path", "content"]
        })
    }
}

#[async_trait]
impl ToolHandler for WriteFileTool {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, HandlerError> {
        let file_path = args.get("file_path").and_then(Value::as_str).ok_or_else(|| HandlerError::InvalidArguments("file_path is required".into()))?;
        let content = args.get("content").and_then(Value::as_str).ok_or_else(|| HandlerError::InvalidArguments("content is required".into()))?;

        let path = std::path::Path::new(file_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| HandlerError::ExecutionFailed(e.to_string()))?;
            }
        }

        tokio::fs::write(path, content).await.map_err(|e| HandlerError::ExecutionFailed(e.to_string()))?;

        Ok(format!("Wrote {} bytes to {file_path}", content.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn ctx() -> ToolContext {
        ToolContext::new(std::env::temp_dir(), "test", Arc::new(forge_events::EventBus::new()))
    }

    #[tokio::test]
    async fn writes_new_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let result = WriteFileTool.call(serde_json::json!({"file_path": path.to_str().unwrap(), "content": "hello"}), &ctx()).await.unwrap();
        assert!(result.contains("5 bytes"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("out.txt");
        WriteFileTool.call(serde_json::json!({"file_path": path.to_str().unwrap(), "content": "x"}), &ctx()).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "old").unwrap();
        WriteFileTool.call(serde_json::json!({"file_path": path.to_str().unwrap(), "content": "new"}), &ctx()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[tokio::test]
    async fn missing_args_are_invalid() {
        let result = WriteFileTool.call(serde_json::json!({}), &ctx()).await;
        assert!(matches!(result, Err(HandlerError::InvalidArguments(_))));
    }
}
