//! Workflow Engine: declarative multi-step agent orchestration over a DAG
//! of sub-agent runs.
//!
//! A [`WorkflowDefinition`] is parsed and validated ([`validate::validate`])
//! into a topological plan, then driven to a terminal state by a
//! [`WorkflowEngine`], which launches each ready step as a sub-agent run
//! (mirroring `forge_runtime`'s Task tool), evaluates step conditions
//! through a safe recursive-descent grammar ([`condition`]), and
//! checkpoints [`WorkflowState`] after every terminal step so a run can
//! resume after a crash or cancellation.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod condition;
mod definition;
mod engine;
pub mod prelude;
mod state;
mod validate;

pub use condition::{evaluate, parse, CmpOp, Expr, FieldPath, Literal, Operand};
pub use definition::{Step, WorkflowDefinition};
pub use engine::WorkflowEngine;
pub use state::{output_to_result_value, StepResult, WorkflowCheckpointStore, WorkflowState, WorkflowStatus};
pub use validate::validate;
