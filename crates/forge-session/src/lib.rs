//! Session Store: durable persistence of conversation state.
//!
//! Sessions are written with the atomic-rename pattern (temp file, fsync,
//! rename), rotate the previous version into a backup directory on
//! overwrite, and recover from the most recent valid backup when the
//! primary file is found corrupt. An index file tracks per-session
//! summaries so listing never requires reading every session in full.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod model;
pub mod prelude;
mod store;

pub use error::{SessionError, SessionResult};
pub use model::{Session, SessionIndex, SessionSummary, TokenUsage, ToolInvocationRecord};
pub use store::SessionStore;
