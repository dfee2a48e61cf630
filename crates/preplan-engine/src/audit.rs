//! Audit trail assembly
//!
//! A terminal [`ExecutionContext`] is flattened into a read-only trail the
//! caller can serialize, archive, or render. Every bound value keeps its
//! provenance, and the final outputs are selected by the plan's declared
//! `plan_outputs` rather than by whatever happened to be bound.

use crate::context::{ExecutionContext, RunStatus, StepResult, VariableBinding};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use preplan_core::plan::Plan;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record of one finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub execution_id: Uuid,
    pub plan_id: String,
    pub plan_title: String,
    pub status: RunStatus,
    /// Every binding the run produced, scenario inputs included
    pub bindings: IndexMap<String, VariableBinding>,
    /// Step results in execution order
    pub results: Vec<StepResult>,
    /// Declared plan outputs that ended up bound
    pub final_outputs: IndexMap<String, VariableBinding>,
    /// Declared plan outputs the run never produced
    pub missing_outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl AuditTrail {
    /// Flatten a terminal context into a trail.
    ///
    /// Callers hand in the plan so declared outputs can be selected; a
    /// completed run binds all of them, a failed run only the ones produced
    /// before the halt.
    #[must_use]
    pub fn assemble(ctx: &ExecutionContext, plan: &Plan) -> Self {
        debug_assert!(ctx.status().is_terminal());

        let mut final_outputs = IndexMap::with_capacity(plan.plan_outputs.len());
        let mut missing_outputs = Vec::new();
        for name in &plan.plan_outputs {
            match ctx.bindings().get(name) {
                Some(binding) => {
                    final_outputs.insert(name.clone(), binding.clone());
                }
                None => missing_outputs.push(name.clone()),
            }
        }

        Self {
            execution_id: ctx.execution_id(),
            plan_id: ctx.plan_id().to_string(),
            plan_title: plan.title.clone(),
            status: ctx.status(),
            bindings: ctx.bindings().clone(),
            results: ctx.results().to_vec(),
            final_outputs,
            missing_outputs,
            failure: ctx.failure().map(str::to_string),
            started_at: ctx.started_at(),
            finished_at: ctx.finished_at(),
        }
    }

    /// True when the run reached `Completed`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Count of successful step results.
    #[must_use]
    pub fn succeeded_steps(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }
}
