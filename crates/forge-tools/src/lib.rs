//! The tool gateway: a single choke point between the agent runtime and
//! every tool invocation, plus the built-in handler set.
//!
//! Every call flows through [`ToolGateway::dispatch`]: resolve, validate
//! arguments against the declared schema, check permissions, run the
//! `tool:pre` hook, invoke under a timeout, canonicalize the result, run
//! the `tool:post` hook. Nothing calls a [`ToolHandler`] directly.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod builtin;
mod context;
mod descriptor;
mod gateway;
pub mod prelude;
mod registry;
mod sanitize;
mod schema;

pub use context::ToolContext;
pub use descriptor::{HandlerError, ToolDescriptor, ToolHandler};
pub use gateway::{ToolGateway, DEFAULT_TOOL_TIMEOUT};
pub use registry::ToolRegistry;
pub use sanitize::sanitize_message;
pub use schema::validate as validate_schema;
