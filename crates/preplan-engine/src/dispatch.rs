//! Step dispatcher
//!
//! Executes exactly one step against an immutable binding snapshot and
//! returns a [`StepResult`]. Compute steps go through the formula
//! evaluator; tool and retrieval steps go through the external capabilities
//! with transient-failure retry. Provenance is recorded on every outcome,
//! success or not.

use crate::context::{Provenance, StepResult, StepStatus, VariableBinding};
use crate::invoke::{
    OutcomeValues, RetrievalClient, RetrievalError, ToolError, ToolInvoker,
};
use crate::retry::{retry_transient, RetryPolicy};
use chrono::Utc;
use indexmap::IndexMap;
use preplan_core::plan::{InputValue, PlanStep, StepPayload};
use preplan_core::EvaluationError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Executes one step of any kind.
pub struct StepDispatcher {
    tools: Arc<dyn ToolInvoker>,
    retrieval: Arc<dyn RetrievalClient>,
    retry: RetryPolicy,
    step_timeout: Duration,
}

impl StepDispatcher {
    #[must_use]
    pub fn new(
        tools: Arc<dyn ToolInvoker>,
        retrieval: Arc<dyn RetrievalClient>,
        retry: RetryPolicy,
        step_timeout: Duration,
    ) -> Self {
        Self {
            tools,
            retrieval,
            retry,
            step_timeout,
        }
    }

    /// Execute `step` against the snapshot, never panicking: every failure
    /// path lands in the returned result's error field.
    pub async fn dispatch(
        &self,
        step: &PlanStep,
        snapshot: &IndexMap<String, serde_json::Value>,
    ) -> StepResult {
        let started_at = Utc::now();
        let timer = Instant::now();
        tracing::debug!(step_id = %step.id, kind = %step.kind(), "dispatching step");

        let resolved = match resolve_inputs(step, snapshot) {
            Ok(resolved) => resolved,
            Err(message) => {
                return StepResult {
                    step_id: step.id.clone(),
                    kind: step.kind(),
                    inputs: IndexMap::new(),
                    outputs: Vec::new(),
                    status: StepStatus::Failed,
                    error: Some(message),
                    attempts: 1,
                    started_at,
                    duration_ms: timer.elapsed().as_millis() as u64,
                };
            }
        };

        let (outcome, attempts) = match &step.payload {
            StepPayload::Compute { formula } => (self.run_compute(step, formula, &resolved), 1),
            StepPayload::Tool { tool_name } => {
                self.run_tool(step, tool_name, &resolved).await
            }
            StepPayload::Retrieval { query } => {
                self.run_retrieval(step, query, &resolved, snapshot).await
            }
        };

        let duration_ms = timer.elapsed().as_millis() as u64;
        match outcome {
            Ok(outputs) => {
                tracing::info!(step_id = %step.id, attempts, "step succeeded");
                StepResult {
                    step_id: step.id.clone(),
                    kind: step.kind(),
                    inputs: resolved,
                    outputs,
                    status: StepStatus::Success,
                    error: None,
                    attempts,
                    started_at,
                    duration_ms,
                }
            }
            Err(message) => {
                tracing::warn!(step_id = %step.id, attempts, error = %message, "step failed");
                StepResult {
                    step_id: step.id.clone(),
                    kind: step.kind(),
                    inputs: resolved,
                    outputs: Vec::new(),
                    status: StepStatus::Failed,
                    error: Some(message),
                    attempts,
                    started_at,
                    duration_ms,
                }
            }
        }
    }

    fn run_compute(
        &self,
        step: &PlanStep,
        formula: &str,
        resolved: &IndexMap<String, serde_json::Value>,
    ) -> Result<Vec<VariableBinding>, String> {
        let numeric = numeric_bindings(resolved).map_err(|e| e.to_string())?;
        let value = preplan_core::evaluate(formula, &numeric).map_err(|e| e.to_string())?;

        let [output] = step.outputs.as_slice() else {
            return Err(format!(
                "formula produces a single value but step declares {} outputs",
                step.outputs.len()
            ));
        };
        Ok(vec![VariableBinding {
            name: output.clone(),
            value: serde_json::json!(value),
            unit: None,
            provenance: Provenance::Formula {
                step_id: step.id.clone(),
                formula: formula.to_string(),
            },
        }])
    }

    async fn run_tool(
        &self,
        step: &PlanStep,
        tool_name: &str,
        resolved: &IndexMap<String, serde_json::Value>,
    ) -> (Result<Vec<VariableBinding>, String>, u32) {
        let (outcome, attempts) = retry_transient(
            &self.retry,
            self.step_timeout,
            ToolError::is_transient,
            |elapsed| ToolError::transient(tool_name, format!("timed out after {elapsed:?}")),
            || self.tools.invoke(tool_name, resolved),
        )
        .await;

        let result = outcome.map_err(|e| e.to_string()).and_then(|outcome| {
            bind_values(step, outcome.values, outcome.unit, |_| Provenance::Tool {
                step_id: step.id.clone(),
                tool_name: tool_name.to_string(),
                source: outcome.source.clone(),
            })
        });
        (result, attempts)
    }

    async fn run_retrieval(
        &self,
        step: &PlanStep,
        query: &str,
        resolved: &IndexMap<String, serde_json::Value>,
        snapshot: &IndexMap<String, serde_json::Value>,
    ) -> (Result<Vec<VariableBinding>, String>, u32) {
        let filled = fill_template(query, resolved, snapshot);
        let (outcome, attempts) = retry_transient(
            &self.retry,
            self.step_timeout,
            RetrievalError::is_transient,
            |elapsed| RetrievalError::transient(format!("timed out after {elapsed:?}")),
            || self.retrieval.retrieve(&filled, resolved),
        )
        .await;

        let result = outcome.map_err(|e| e.to_string()).and_then(|outcome| {
            bind_values(step, outcome.values, None, |_| Provenance::Retrieval {
                step_id: step.id.clone(),
                citation: outcome.citation.clone(),
            })
        });
        (result, attempts)
    }
}

/// Resolve the step's declared inputs from literals and the snapshot.
///
/// An unbound reference here means the controller scheduled the step too
/// early; the validator rules it out for plans, so this is defensive.
fn resolve_inputs(
    step: &PlanStep,
    snapshot: &IndexMap<String, serde_json::Value>,
) -> Result<IndexMap<String, serde_json::Value>, String> {
    let mut resolved = IndexMap::with_capacity(step.inputs.len());
    for (parameter, input) in &step.inputs {
        let value = match input {
            InputValue::Literal(value) => value.clone(),
            InputValue::Variable(name) => snapshot
                .get(name)
                .cloned()
                .ok_or_else(|| format!("input '{parameter}' references unbound variable '{name}'"))?,
        };
        resolved.insert(parameter.clone(), value);
    }
    Ok(resolved)
}

/// Coerce resolved inputs to f64 for the evaluator. Numeric strings count
/// as numbers, matching how scenario values arrive from callers.
fn numeric_bindings(
    resolved: &IndexMap<String, serde_json::Value>,
) -> Result<HashMap<String, f64>, EvaluationError> {
    let mut numeric = HashMap::with_capacity(resolved.len());
    for (name, value) in resolved {
        let number = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match number {
            Some(n) => {
                numeric.insert(name.clone(), n);
            }
            None => {
                return Err(EvaluationError::TypeMismatch {
                    name: name.clone(),
                    found: type_name(value).to_string(),
                })
            }
        }
    }
    Ok(numeric)
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Turn an outcome's values into bindings for the step's declared outputs.
fn bind_values(
    step: &PlanStep,
    values: OutcomeValues,
    unit: Option<String>,
    provenance: impl Fn(&str) -> Provenance,
) -> Result<Vec<VariableBinding>, String> {
    match values {
        OutcomeValues::Single(value) => {
            let [output] = step.outputs.as_slice() else {
                return Err(format!(
                    "collaborator returned one value but step declares {} outputs",
                    step.outputs.len()
                ));
            };
            Ok(vec![VariableBinding {
                name: output.clone(),
                value,
                unit,
                provenance: provenance(output),
            }])
        }
        OutcomeValues::Named(mut map) => {
            let mut bindings = Vec::with_capacity(step.outputs.len());
            for output in &step.outputs {
                let Some(value) = map.swap_remove(output) else {
                    return Err(format!("collaborator did not return declared output '{output}'"));
                };
                bindings.push(VariableBinding {
                    name: output.clone(),
                    value,
                    unit: unit.clone(),
                    provenance: provenance(output),
                });
            }
            if !map.is_empty() {
                tracing::debug!(extra = ?map.keys().collect::<Vec<_>>(),
                    "ignoring undeclared collaborator outputs");
            }
            Ok(bindings)
        }
    }
}

/// Fill `{variable}` placeholders in a query template from the resolved
/// inputs, falling back to the context snapshot. Unknown placeholders stay
/// as written.
fn fill_template(
    template: &str,
    resolved: &IndexMap<String, serde_json::Value>,
    snapshot: &IndexMap<String, serde_json::Value>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                let value = resolved.get(name).or_else(|| snapshot.get(name));
                match value {
                    Some(serde_json::Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                    None => {
                        tracing::warn!(placeholder = name, "query placeholder not bound");
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
