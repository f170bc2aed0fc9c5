//! Convenience re-exports for dependent crates.

pub use crate::{
    HandlerError, ToolContext, ToolDescriptor, ToolGateway, ToolHandler, ToolRegistry,
    DEFAULT_TOOL_TIMEOUT,
};
