//! Error types for the plan foundation
//!
//! One enum per concern:
//! - `ValidationError` — structural plan violations, always collected into a
//!   list so an author can fix a plan in one pass
//! - `EvaluationError` — formula failures at compute time
//! - `CycleError` — defensive re-check inside the dependency resolver

use crate::plan::StepKind;

/// A single structural violation found while validating a plan.
///
/// The validator never stops at the first problem; callers receive a
/// `Vec<ValidationError>` with one entry per violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Two steps share the same identifier
    #[error("duplicate step id '{step_id}'")]
    DuplicateStepId { step_id: String },

    /// A step declares no output variables
    #[error("step '{step_id}' declares no outputs")]
    EmptyOutputs { step_id: String },

    /// A step is missing the payload field its kind requires
    #[error("step '{step_id}' is missing the '{field}' field required for {kind} steps")]
    MissingPayload {
        step_id: String,
        kind: StepKind,
        field: &'static str,
    },

    /// A variable has more than one producing step
    #[error("variable '{variable}' is produced by both step '{first}' and step '{second}'")]
    DuplicateProducer {
        variable: String,
        first: String,
        second: String,
    },

    /// A step output would overwrite a scenario-supplied input
    #[error("step '{step_id}' output '{variable}' would overwrite a scenario input")]
    ShadowsScenarioInput { step_id: String, variable: String },

    /// An input reference resolves to neither a scenario input nor any
    /// step's output
    #[error("step '{step_id}' input '{parameter}' references unknown variable '{variable}'")]
    UnresolvedInput {
        step_id: String,
        parameter: String,
        variable: String,
    },

    /// The induced dependency graph contains a cycle
    #[error("dependency cycle: {}", cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },
}

/// Failure while evaluating a restricted arithmetic formula.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// Identifier not present in the supplied bindings
    #[error("unknown identifier '{name}'")]
    UnknownIdentifier { name: String },

    /// Function name outside the restricted grammar
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    /// `min`/`max` called with fewer arguments than required
    #[error("function '{function}' requires at least {minimum} arguments, got {found}")]
    ArityMismatch {
        function: String,
        minimum: usize,
        found: usize,
    },

    /// Division by zero fails rather than producing infinity
    #[error("division by zero")]
    DivisionByZero,

    /// A bound value could not be used as a number
    #[error("variable '{name}' is not numeric (found {found})")]
    TypeMismatch { name: String, found: String },

    /// The formula text does not match the restricted grammar
    #[error("malformed formula: {detail}")]
    Malformed { detail: String },
}

/// Cycle found by the dependency resolver.
///
/// The validator should have rejected the plan already; this exists as
/// defense in depth for graphs constructed outside the validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dependency cycle: {}", cycle.join(" -> "))]
pub struct CycleError {
    /// Step ids along the offending cycle, in traversal order
    pub cycle: Vec<String>,
}
