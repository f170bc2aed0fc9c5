//! Permission-resolution specific errors.

use thiserror::Error;

/// Errors the permission resolver can return.
///
/// Invalid patterns are deliberately *not* modelled here: per spec a bad
/// regex renders a single rule inert (with a warning) rather than failing
/// the whole resolver, so [`crate::rule::CompiledRule::compile`] returns an
/// `Option` instead of a `Result`.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// A rule referenced by id did not exist (e.g. `remove_session_rule`).
    #[error("no rule with id {0} is registered")]
    RuleNotFound(String),

    /// The on-disk rule file (`permissions.yaml`) failed to parse.
    #[error("failed to parse permission rules: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Filesystem I/O failure loading or saving rules.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for this crate.
pub type PermissionResult<T> = Result<T, PermissionError>;
