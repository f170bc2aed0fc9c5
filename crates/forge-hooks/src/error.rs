//! Hook dispatcher errors.

use thiserror::Error;

/// Errors the Hook Dispatcher can surface to a caller.
#[derive(Debug, Error)]
pub enum HookError {
    /// A blocking hook on a `*:pre` event exited non-zero; the
    /// about-to-happen operation must be aborted.
    #[error("hook {hook} blocked the operation: {reason}")]
    Blocked {
        /// The hook id that blocked the operation.
        hook: String,
        /// Why it blocked (typically the hook's stderr, truncated).
        reason: String,
    },
}

/// Result alias for this crate.
pub type HookResult<T> = Result<T, HookError>;
