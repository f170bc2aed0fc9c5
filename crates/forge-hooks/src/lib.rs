//! Hook Dispatcher: fires named lifecycle events (`session:start`,
//! `tool:pre`, `workflow:failed`, ...) to user-configured external
//! commands, with per-hook timeout, bounded retry of transient failures,
//! dry-run inspection, and blocking `*:pre` hooks that can abort the
//! about-to-happen operation.
//!
//! Each hook registration is serialized against itself: a slow or hung
//! hook queues rather than piling up concurrent instances of itself under
//! a busy event stream.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod dispatcher;
mod error;
mod event;
mod hook;
pub mod prelude;

pub use dispatcher::{build_payload, DispatcherConfig, HookDispatcher, HookOutcome};
pub use error::{HookError, HookResult};
pub use event::HookEvent;
pub use hook::Hook;
