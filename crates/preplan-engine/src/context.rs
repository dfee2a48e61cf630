//! Per-run execution state
//!
//! An [`ExecutionContext`] is created per incoming scenario, mutated only by
//! the execution controller, and turned into an audit trail once terminal.
//! Bindings are write-once and the step-result log is append-only; both
//! invariants are enforced here rather than trusted to callers.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use preplan_core::StepKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall status of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Legal successor states.
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [RunStatus] {
        use RunStatus::*;
        match self {
            Pending => &[Running],
            Running => &[Completed, Failed],
            Completed => &[],
            Failed => &[],
        }
    }

    /// Terminal states are final; no resumption across contexts.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Recorded origin of a bound variable's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Provenance {
    /// Supplied by the caller when the run started
    Scenario,
    /// Computed by a formula step
    Formula { step_id: String, formula: String },
    /// Returned by an external tool
    Tool {
        step_id: String,
        tool_name: String,
        source: String,
    },
    /// Retrieved from a knowledge corpus
    Retrieval { step_id: String, citation: String },
}

/// One bound variable with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableBinding {
    pub name: String,
    pub value: serde_json::Value,
    /// Descriptive only, never dimensionally checked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub provenance: Provenance,
}

/// Outcome of one step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

/// Append-only record of one dispatched step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub kind: StepKind,
    /// Input values as resolved at execution time, for reproducibility
    pub inputs: IndexMap<String, serde_json::Value>,
    /// Bindings the step produced; empty when the step failed
    pub outputs: Vec<VariableBinding>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Invocation attempts including the final one (retries show up here)
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StepResult {
    /// True when the step succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// Mutable run-scoped state: plan identity, bindings, and the ordered step
/// log. Only the execution controller writes to this between waves.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    execution_id: Uuid,
    plan_id: String,
    status: RunStatus,
    bindings: IndexMap<String, VariableBinding>,
    results: Vec<StepResult>,
    failure: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExecutionContext {
    /// Create a pending context, seeding the binding map with the
    /// caller-supplied scenario values.
    #[must_use]
    pub fn new(plan_id: &str, scenario: IndexMap<String, serde_json::Value>) -> Self {
        let bindings = scenario
            .into_iter()
            .map(|(name, value)| {
                let binding = VariableBinding {
                    name: name.clone(),
                    value,
                    unit: None,
                    provenance: Provenance::Scenario,
                };
                (name, binding)
            })
            .collect();

        Self {
            execution_id: Uuid::new_v4(),
            plan_id: plan_id.to_string(),
            status: RunStatus::Pending,
            bindings,
            results: Vec::new(),
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    #[must_use]
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    #[must_use]
    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    #[must_use]
    pub fn bindings(&self) -> &IndexMap<String, VariableBinding> {
        &self.bindings
    }

    /// Current value of a variable, if bound.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&serde_json::Value> {
        self.bindings.get(name).map(|b| &b.value)
    }

    #[must_use]
    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Plain name-to-value view of the current bindings, handed to
    /// dispatched steps as their immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, serde_json::Value> {
        self.bindings
            .iter()
            .map(|(name, binding)| (name.clone(), binding.value.clone()))
            .collect()
    }

    /// Bind a new variable.
    ///
    /// # Errors
    /// `EngineError::BindingConflict` if the name is already bound; names
    /// are write-once per run so the audit trail stays unambiguous.
    pub fn bind(&mut self, binding: VariableBinding) -> Result<(), EngineError> {
        if self.bindings.contains_key(&binding.name) {
            return Err(EngineError::BindingConflict {
                name: binding.name,
            });
        }
        self.bindings.insert(binding.name.clone(), binding);
        Ok(())
    }

    /// Append a step result to the log. Results are never mutated after
    /// being recorded.
    pub fn record(&mut self, result: StepResult) {
        self.results.push(result);
    }

    fn transition(&mut self, to: RunStatus) -> Result<(), EngineError> {
        if !self.status.allowed_transitions().contains(&to) {
            return Err(EngineError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Pending -> Running.
    pub fn begin(&mut self) -> Result<(), EngineError> {
        self.started_at = Utc::now();
        self.transition(RunStatus::Running)
    }

    /// Running -> Completed.
    pub fn complete(&mut self) -> Result<(), EngineError> {
        self.transition(RunStatus::Completed)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Running -> Failed, with a structured reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), EngineError> {
        self.transition(RunStatus::Failed)?;
        self.failure = Some(reason.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}
