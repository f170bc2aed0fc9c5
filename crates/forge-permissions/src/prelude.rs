//! Commonly used types for convenient import.

pub use crate::resolver::{Decision, PermissionResolver, RateLimitConfig};
pub use crate::rule::{ArgPattern, PermissionLevel, PermissionRule, RuleSource};
