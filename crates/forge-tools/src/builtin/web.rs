//! Web tools — registered descriptors documenting an external contract
//! boundary. Fetching and searching the live web is outside this core's
//! scope; these handlers exist so the registry isn't silently missing
//! entries the external interface promises.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ToolContext;
use crate::descriptor::{HandlerError, ToolHandler};

/// Registered descriptor for fetching a URL. Always returns
/// [`HandlerError::NotImplemented`].
pub struct WebFetchTool;

impl WebFetchTool {
    /// Description surfaced to the LLM.
    pub const DESCRIPTION: &'static str = "Fetches the contents of a URL. Not implemented in this deployment.";

    /// JSON schema for this tool's arguments.
    #[must_use]
    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            },
            "required": ["url"]
        })
    }
}

#[async_trait]
impl ToolHandler for WebFetchTool {
    async fn call(&self, _args: Value, _ctx: &ToolContext) -> Result<String, HandlerError> {
        Err(HandlerError::NotImplemented)
    }
}

/// Registered descriptor for searching the web. Always returns
/// [`HandlerError::NotImplemented`].
pub struct WebSearchTool;

impl WebSearchTool {
    /// Description surfaced to the LLM.
    pub const DESCRIPTION: &'static str = "Searches the web for a query. Not implemented in this deployment.";

    /// JSON schema for this tool's arguments.
    #[must_use]
    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                }
            },
            "required": ["query"]
        })
    }
}

#[async_trait]
impl ToolHandler for WebSearchTool {
    async fn call(&self, _args: Value, _ctx: &ToolContext) -> Result<String, HandlerError> {
        Err(HandlerError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ctx() -> ToolContext {
        ToolContext::new(std::env::temp_dir(), "test", Arc::new(forge_events::EventBus::new()))
    }

    #[tokio::test]
    async fn web_fetch_is_not_implemented() {
        let result = WebFetchTool.call(serde_json::json!({"url": "https://example.com"}), &ctx()).await;
        assert!(matches!(result, Err(HandlerError::NotImplemented)));
    }

    #[tokio::test]
    async fn web_search_is_not_implemented() {
        let result = WebSearchTool.call(serde_json::json!({"query": "rust async"}), &ctx()).await;
        assert!(matches!(result, Err(HandlerError::NotImplemented)));
    }
}
