//! Layered configuration loading, merging, and validation.
//!
//! Precedence is embedded defaults, then `~/.forge/config.toml`, then
//! `{workspace}/.forge/config.toml`, then environment variable fallbacks
//! for fields still left at their type default. Every section of [`Config`]
//! implements [`Default`] so a config file can omit a whole `[section]`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod env;
mod error;
mod loader;
mod merge;
pub mod prelude;
mod types;
mod validate;

pub use env::{apply_env_fallbacks, debug_requested};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load, load_file};
pub use merge::deep_merge;
pub use types::{
    Config, EventsSection, HooksSection, LoggingSection, ModelConfig, RateLimitsSection,
    RetrySection, RuntimeSection, SessionsSection, SubagentsSection, WorkflowSection,
    WorkspaceSection,
};
pub use validate::validate;
