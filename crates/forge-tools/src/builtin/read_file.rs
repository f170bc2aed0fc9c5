//! Read file tool — reads a file with line numbers (`cat -n` style).

use std::fmt::Write;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ToolContext;
use crate::descriptor::{HandlerError, ToolHandler};

const DEFAULT_LINE_LIMIT: usize = 2000;
const MAX_LINE_LENGTH: usize = 2000;

/// Built-in tool for reading files.
pub struct ReadFileTool;

impl ReadFileTool {
    /// Description surfaced to the LLM.
    pub const DESCRIPTION: &'static str = "Reads a file from the filesystem. Returns contents with line numbers (cat -n format). \
         Default reads up to 2000 lines. Use offset and limit for large files. \
         Lines longer than 2000 characters are truncated.";

    /// JSON schema for this tool's arguments.
    #[must_use]
    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute path to the file to read"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line number to start reading from (1-based). Only provide for large files."
                },
                "limit": {
                    "type": "integer",
                    "description": "Number of lines to read. Only provide for large files."
                }
            },
            "required": ["file_path"]
        })
    }
}

#[async_trait]
impl ToolHandler for ReadFileTool {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, HandlerError> {
        let file_path = args.get("file_path").and_then(Value::as_str).ok_or_else(|| HandlerError::InvalidArguments("file_path is required".into()))?;

        let offset = args.get("offset").and_then(Value::as_u64).map(|v| usize::try_from(v).unwrap_or(usize::MAX));
        let limit = args.get("limit").and_then(Value::as_u64).map_or(DEFAULT_LINE_LIMIT, |v| usize::try_from(v).unwrap_or(usize::MAX));

        let path = std::path::Path::new(file_path);
        if !path.exists() {
            return Err(HandlerError::NotFound(file_path.to_string()));
        }

        let raw = tokio::fs::read(path).await.map_err(|e| HandlerError::ExecutionFailed(e.to_string()))?;
        let check_len = raw.len().min(8192);
        if raw[..check_len].contains(&0) {
            return Err(HandlerError::ExecutionFailed(format!("{file_path} appears to be a binary file")));
        }

        let content = String::from_utf8(raw).map_err(|_| HandlerError::ExecutionFailed(format!("{file_path} is not valid UTF-8")))?;

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        let start = offset.map_or(0, |o| o.saturating_sub(1));
        let end = start.saturating_add(limit).min(total_lines);

        if start >= total_lines {
            return Ok(format!("(file has {total_lines} lines, offset {start} is past end)"));
        }

        let mut output = String::new();
        for (idx, &line) in lines[start..end].iter().enumerate() {
            let line_num = start + idx + 1;
            let display_line = if line.len() > MAX_LINE_LENGTH { &line[..MAX_LINE_LENGTH] } else { line };
            let _ = writeln!(output, "{line_num:>6}\t{display_line}");
        }

        if end < total_lines {
            let _ = write!(output, "\n(showing lines {}-{} of {total_lines}; use offset/limit for more)", start.saturating_add(1), end);
        }

        Ok(crate::builtin::truncate_output(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as IoWrite;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn ctx() -> ToolContext {
        ToolContext::new(std::env::temp_dir(), "test", Arc::new(forge_events::EventBus::new()))
    }

    #[tokio::test]
    async fn reads_lines_with_numbers() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "line one").unwrap();
        writeln!(f, "line two").unwrap();

        let result = ReadFileTool.call(serde_json::json!({"file_path": f.path().to_str().unwrap()}), &ctx()).await.unwrap();

        assert!(result.contains("line one"));
        assert!(result.contains("     1\t"));
        assert!(result.contains("     2\t"));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let result = ReadFileTool.call(serde_json::json!({"file_path": "/tmp/forge_nonexistent_12345.txt"}), &ctx()).await;
        assert!(matches!(result, Err(HandlerError::NotFound(_))));
    }

    #[tokio::test]
    async fn offset_and_limit_apply() {
        let mut f = NamedTempFile::new().unwrap();
        for i in 1..=20 {
            writeln!(f, "line {i}").unwrap();
        }

        let result = ReadFileTool
            .call(serde_json::json!({"file_path": f.path().to_str().unwrap(), "offset": 5, "limit": 3}), &ctx())
            .await
            .unwrap();

        assert!(result.contains("line 5"));
        assert!(result.contains("line 7"));
        assert!(!result.contains("line 8"));
    }

    #[tokio::test]
    async fn binary_file_is_rejected() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&[0x00, 0x01, 0x02, 0xFF]).unwrap();

        let result = ReadFileTool.call(serde_json::json!({"file_path": f.path().to_str().unwrap()}), &ctx()).await;
        assert!(matches!(result, Err(HandlerError::ExecutionFailed(ref m)) if m.contains("binary")));
    }

    #[tokio::test]
    async fn missing_arg_is_invalid() {
        let result = ReadFileTool.call(serde_json::json!({}), &ctx()).await;
        assert!(matches!(result, Err(HandlerError::InvalidArguments(_))));
    }
}
