//! Concrete built-in tools: the hot-path coding operations exercised
//! end-to-end through the gateway.

mod bash;
mod edit_file;
mod glob;
mod grep;
mod read_file;
mod web;
mod write_file;

pub use bash::BashTool;
pub use edit_file::EditFileTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use read_file::ReadFileTool;
pub use web::{WebFetchTool, WebSearchTool};
pub use write_file::WriteFileTool;

use crate::descriptor::ToolDescriptor;
use crate::registry::ToolRegistry;

/// Maximum output size in characters before truncation.
const MAX_OUTPUT_CHARS: usize = 30_000;

/// Truncate a string at the nearest char boundary at or before `max_chars`
/// characters, appending a notice when truncation occurred.
#[must_use]
pub fn truncate_output(output: String) -> String {
    if output.chars().count() <= MAX_OUTPUT_CHARS {
        return output;
    }
    let mut truncated: String = output.chars().take(MAX_OUTPUT_CHARS).collect();
    truncated.push_str("\n\n... (output truncated — exceeded 30000 character limit)");
    truncated
}

/// Register every built-in tool with default policy.
pub fn register_defaults(registry: &mut ToolRegistry) {
    registry.register(ToolDescriptor::new("read_file", ReadFileTool::DESCRIPTION, ReadFileTool::schema(), ReadFileTool));
    registry.register(ToolDescriptor::new("write_file", WriteFileTool::DESCRIPTION, WriteFileTool::schema(), WriteFileTool));
    registry.register(ToolDescriptor::new("edit_file", EditFileTool::DESCRIPTION, EditFileTool::schema(), EditFileTool));
    registry.register(ToolDescriptor::new("glob", GlobTool::DESCRIPTION, GlobTool::schema(), GlobTool));
    registry.register(ToolDescriptor::new("grep", GrepTool::DESCRIPTION, GrepTool::schema(), GrepTool));
    registry.register(ToolDescriptor::new("bash", BashTool::DESCRIPTION, BashTool::schema(), BashTool));
    registry.register(ToolDescriptor::new("web_search", WebSearchTool::DESCRIPTION, WebSearchTool::schema(), WebSearchTool));
    registry.register(ToolDescriptor::new("web_fetch", WebFetchTool::DESCRIPTION, WebFetchTool::schema(), WebFetchTool));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_output_small_passes_through() {
        assert_eq!(truncate_output("hello".to_string()), "hello");
    }

    #[test]
    fn truncate_output_large_is_truncated() {
        let large = "x".repeat(40_000);
        let result = truncate_output(large);
        assert!(result.len() < 40_000);
        assert!(result.contains("output truncated"));
    }

    #[test]
    fn register_defaults_populates_all_eight_tools() {
        let mut registry = ToolRegistry::new();
        register_defaults(&mut registry);
        for name in ["read_file", "write_file", "edit_file", "glob", "grep", "bash", "web_search", "web_fetch"] {
            assert!(registry.get(name).is_some(), "{name} missing");
        }
        assert_eq!(registry.len(), 8);
    }
}
