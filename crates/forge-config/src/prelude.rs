//! Convenience re-exports for dependent crates.

pub use crate::{load, load_file, Config, ConfigError, ConfigResult, ModelConfig};
