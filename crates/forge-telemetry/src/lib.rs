//! Logging setup and request-correlation spans for the Forge agent
//! execution substrate.
//!
//! ```rust,no_run
//! use forge_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), forge_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug").with_format(LogFormat::Pretty).with_directive("forge_runtime=trace");
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("agent_runtime").with_operation("run");
//! let _guard = ctx.enter();
//! tracing::info!("processing turn");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod context;
mod error;
mod logging;
pub mod prelude;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{setup_default_logging, setup_logging, LogConfig, LogFormat, LogTarget};
