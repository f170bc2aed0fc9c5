//! Convenience re-exports for dependent crates.

pub use crate::{setup_default_logging, setup_logging, LogConfig, LogFormat, LogTarget, RequestContext, RequestGuard, TelemetryError, TelemetryResult};
