//! Convenience re-exports for dependent crates.

pub use crate::{
    evaluate, output_to_result_value, parse, validate, CmpOp, Expr, FieldPath, Literal, Operand,
    Step, StepResult, WorkflowCheckpointStore, WorkflowDefinition, WorkflowEngine, WorkflowState,
    WorkflowStatus,
};
