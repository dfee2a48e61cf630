//! Preplan Core - plan foundation
//!
//! The pure, synchronous half of the preplan engine:
//! - Typed plan model and the JSON wire contract (`plan`)
//! - Structural validation producing a proof-carrying [`ValidatedPlan`]
//! - Dependency graph derivation and topological resolution (`graph`)
//! - The restricted formula evaluator (`eval`)
//! - Complexity-based strategy routing (`route`)
//!
//! Nothing in this crate performs I/O or depends on an async runtime; the
//! execution layer lives in `preplan-engine`.
//!
//! # Example
//!
//! ```rust
//! use preplan_core::plan::{validate, Plan, PlanDocument};
//!
//! let doc: PlanDocument = serde_json::from_str(r#"{
//!     "plan_id": "demo",
//!     "steps": [
//!         {"id": "c1", "type": "compute", "formula": "min(a,b)",
//!          "inputs": {"a": "{a}", "b": "{b}"}, "outputs": ["smaller"]}
//!     ],
//!     "plan_inputs": {"a": "", "b": ""},
//!     "plan_outputs": ["smaller"]
//! }"#).unwrap();
//!
//! let plan = Plan::try_from(doc).unwrap();
//! let validated = validate(plan).unwrap();
//! assert_eq!(validated.graph().topological_order(), &[0]);
//! ```

pub mod error;
pub mod eval;
pub mod graph;
pub mod plan;
pub mod route;

pub use error::{CycleError, EvaluationError, ValidationError};
pub use eval::evaluate;
pub use graph::DependencyGraph;
pub use plan::{
    validate, InputValue, Plan, PlanDocument, PlanStep, StepDocument, StepKind, StepPayload,
    ValidatedPlan, VariableSpec,
};
pub use route::{route, RouterConfig, RoutingReport, StrategyKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
