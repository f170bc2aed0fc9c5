//! Dependencies Container and CLI-surface contract.
//!
//! [`Container::bootstrap`] wires every substrate component (event bus,
//! tool registry, permission resolver, hook dispatcher, token budgeter,
//! agent type registry, sub-agent pool, LLM provider, tool gateway, session
//! store, workflow engine) into one process, in dependency order. [`Kernel`]
//! wraps a container and exposes the methods a frontend — a REPL, a thin
//! CLI, a server — drives: `run`, `run_workflow`, `cancel`,
//! `resume_workflow`, `list_sessions`, `resume_session`, `delete_session`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod container;
mod error;
mod kernel;
pub mod pricing;
pub mod prelude;
mod templating;

pub use container::Container;
pub use error::{KernelError, KernelResult};
pub use kernel::Kernel;
