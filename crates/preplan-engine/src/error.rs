//! Run-level engine errors
//!
//! Step-level failures (evaluation, tool, retrieval) live on the step
//! results they belong to; this type covers failures of the run itself.

use preplan_core::route::StrategyKind;
use preplan_core::ValidationError;

use crate::context::RunStatus;

/// Failure of a run or of the engine front door.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The plan never passed validation; execution never started
    #[error("plan validation failed with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    /// The router selected a strategy nothing has registered
    #[error("no execution strategy registered for {kind} plans")]
    StrategyUnavailable { kind: StrategyKind },

    /// A step tried to bind a variable name that is already bound
    #[error("variable '{name}' is already bound (write-once per run)")]
    BindingConflict { name: String },

    /// Context state machine violation
    #[error("illegal run state transition {from:?} -> {to:?}")]
    IllegalTransition { from: RunStatus, to: RunStatus },
}
