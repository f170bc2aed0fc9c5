//! Configuration loading and validation errors.

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    ReadFailed {
        /// The file that could not be read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A config file's TOML could not be parsed.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// The file that failed to parse.
        path: String,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The merged configuration failed a validation rule.
    #[error("invalid configuration field {field}: {message}")]
    ValidationError {
        /// The dotted field path that failed validation.
        field: String,
        /// A human-readable description of the failure.
        message: String,
    },

    /// The home directory could not be determined and no override was given.
    #[error("could not determine home directory")]
    NoHomeDirectory,
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
