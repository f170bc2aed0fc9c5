//! The kernel's own error type: every lower-level error the Dependencies
//! Container and CLI-surface methods can raise, folded into one enum so
//! callers match on a single type instead of threading five.

use thiserror::Error;

/// Errors raised while bootstrapping the container or servicing a
/// CLI-surface call.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] forge_config::ConfigError),

    /// A core substrate operation failed.
    #[error(transparent)]
    Forge(#[from] forge_core::ForgeError),

    /// A session store operation failed.
    #[error(transparent)]
    Session(#[from] forge_session::SessionError),

    /// A permission or hook rules file exists but is not valid YAML.
    #[error("failed to parse {path}: {source}")]
    RulesFile {
        /// The file that failed to parse.
        path: String,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A requested named workflow definition does not exist on disk.
    #[error("no workflow named {0} found under .forge/workflows")]
    WorkflowNotFound(String),

    /// The configured model provider is not recognized.
    #[error("unknown LLM provider: {0}")]
    UnknownProvider(String),

    /// The configured provider requires an API key and none was supplied,
    /// neither in configuration nor via `FORGE_LLM_API_KEY`.
    #[error("no API key configured for provider {0}")]
    MissingApiKey(String),

    /// An I/O error outside the paths already wrapped by the above.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
