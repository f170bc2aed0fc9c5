//! Convenience re-exports for dependent crates.

pub use crate::{Session, SessionError, SessionIndex, SessionResult, SessionStore, SessionSummary, TokenUsage, ToolInvocationRecord};
