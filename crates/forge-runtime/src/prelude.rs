//! Convenience re-exports for dependent crates.

pub use crate::{
    AgentRuntime, AgentTypeDefinition, AgentTypeRegistry, BudgetSplit, ContextBudget, RunCaps,
    RunOutcome, RunStatus, RunUsage, SubAgentHandle, SubAgentPool, SubAgentStatus, TaskTool,
    TaskToolHandle, TokenBudgeter, TruncateOutcome, TruncateStrategy,
};
