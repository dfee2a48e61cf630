//! Preplan Engine - step-graph execution
//!
//! The async half of the preplan engine. A [`ValidatedPlan`] from
//! `preplan-core` goes in; an [`AuditTrail`] comes out:
//! - Per-run state with write-once bindings and provenance (`context`)
//! - Tool/retrieval capabilities and failure classification (`invoke`)
//! - Bounded exponential retry for transient failures (`retry`)
//! - Single-step dispatch across all step kinds (`dispatch`)
//! - Wave-based concurrent scheduling with cancellation (`controller`)
//! - Strategy registry and the [`Engine`] front door (`strategy`)
//! - Audit trail assembly from terminal runs (`audit`)
//!
//! Step failures never panic and never surface as `Err` from the engine:
//! they terminate the run and are carried on the audit trail. The error
//! path is reserved for rejected plans, missing strategies, and broken run
//! invariants.
//!
//! [`ValidatedPlan`]: preplan_core::plan::ValidatedPlan

pub mod audit;
pub mod config;
pub mod context;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod invoke;
pub mod logging;
pub mod retry;
pub mod strategy;

pub use audit::AuditTrail;
pub use config::EngineConfig;
pub use context::{
    ExecutionContext, Provenance, RunStatus, StepResult, StepStatus, VariableBinding,
};
pub use controller::{CancelHandle, CancelToken, ExecutionController};
pub use dispatch::StepDispatcher;
pub use error::EngineError;
pub use invoke::{
    FailureKind, OutcomeValues, RetrievalClient, RetrievalError, RetrievalOutcome, ToolError,
    ToolInvoker, ToolOutcome,
};
pub use retry::RetryPolicy;
pub use strategy::{Engine, ExecutionStrategy, LinearStrategy};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
