//! Convenience re-exports for dependent crates.

pub use crate::{build_payload, DispatcherConfig, Hook, HookDispatcher, HookError, HookEvent, HookOutcome, HookResult};
