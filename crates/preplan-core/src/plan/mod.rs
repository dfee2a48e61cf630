//! Typed plan model
//!
//! A [`Plan`] is the validated-input side of the engine: an ordered list of
//! typed steps, each declaring exactly the variables it reads and writes.
//! Plans arrive over the wire as [`wire::PlanDocument`] and are converted
//! into this model before validation; once validated they are immutable and
//! reused read-only across runs.

pub mod validate;
pub mod wire;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use validate::{validate, ValidatedPlan};
pub use wire::{PlanDocument, StepDocument};

/// Kind of work a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Knowledge retrieval against an external corpus (`rag` on the wire)
    #[serde(rename = "rag")]
    Retrieval,
    /// External tool invocation
    Tool,
    /// Formula evaluation over already-bound variables
    Compute,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Retrieval => write!(f, "rag"),
            StepKind::Tool => write!(f, "tool"),
            StepKind::Compute => write!(f, "compute"),
        }
    }
}

/// Kind-specific step payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepPayload {
    /// Query template; `{variable}` placeholders are filled at dispatch time
    Retrieval { query: String },
    /// Name of the external tool to invoke
    Tool { tool_name: String },
    /// Formula over the step's input parameter names
    Compute { formula: String },
}

impl StepPayload {
    /// Kind corresponding to this payload.
    #[must_use]
    pub fn kind(&self) -> StepKind {
        match self {
            StepPayload::Retrieval { .. } => StepKind::Retrieval,
            StepPayload::Tool { .. } => StepKind::Tool,
            StepPayload::Compute { .. } => StepKind::Compute,
        }
    }
}

/// One declared input of a step: either a literal or a reference to a
/// previously produced variable (`{name}` on the wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputValue {
    Literal(serde_json::Value),
    Variable(String),
}

impl InputValue {
    /// Decode the wire form: a string `"{name}"` is a variable reference,
    /// everything else is a literal.
    #[must_use]
    pub fn from_wire(value: serde_json::Value) -> Self {
        if let serde_json::Value::String(s) = &value {
            if let Some(inner) = s.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
                if !inner.is_empty() {
                    return InputValue::Variable(inner.to_string());
                }
            }
        }
        InputValue::Literal(value)
    }

    /// Variable name if this input is a reference.
    #[must_use]
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            InputValue::Variable(name) => Some(name.as_str()),
            InputValue::Literal(_) => None,
        }
    }
}

/// Atomic unit of work: a pure node in the dependency graph.
///
/// Inputs are exactly the variables the step reads; `outputs` exactly the
/// variables it writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Identifier, unique within the plan
    pub id: String,
    /// Human description, carried through to the audit trail
    pub description: String,
    /// Kind-specific payload
    pub payload: StepPayload,
    /// Formal parameter name to literal or variable reference
    pub inputs: IndexMap<String, InputValue>,
    /// Variables this step produces (non-empty)
    pub outputs: Vec<String>,
    /// Branching extension field; the linear engine never interprets it,
    /// but its presence routes the plan to the branching strategy
    pub condition: Option<String>,
}

impl PlanStep {
    /// Kind of this step.
    #[must_use]
    pub fn kind(&self) -> StepKind {
        self.payload.kind()
    }

    /// Variable names this step reads, in declaration order.
    pub fn referenced_variables(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs
            .iter()
            .filter_map(|(param, value)| value.as_variable().map(|v| (param.as_str(), v)))
    }
}

/// Documentation-only variable schema entry (units are descriptive, not
/// dimensionally checked).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Structured representation of an operational preplan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub title: String,
    pub description: String,
    pub version: String,
    /// Variable schema, documentation only
    pub variables: Vec<VariableSpec>,
    /// Steps in declaration order
    pub steps: Vec<PlanStep>,
    /// Scenario inputs the caller must supply (name to description)
    pub plan_inputs: IndexMap<String, String>,
    /// Variables exposed as the plan's final outputs
    pub plan_outputs: Vec<String>,
}

impl Plan {
    /// Step lookup by id.
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_value_wire_decoding() {
        assert_eq!(
            InputValue::from_wire(json!("{P_max_send}")),
            InputValue::Variable("P_max_send".to_string())
        );
        assert_eq!(
            InputValue::from_wire(json!("tianzhong_dc")),
            InputValue::Literal(json!("tianzhong_dc"))
        );
        assert_eq!(InputValue::from_wire(json!(3200.0)), InputValue::Literal(json!(3200.0)));
        // Empty braces are not a reference
        assert_eq!(InputValue::from_wire(json!("{}")), InputValue::Literal(json!("{}")));
    }

    #[test]
    fn step_kind_wire_names() {
        assert_eq!(serde_json::to_value(StepKind::Retrieval).unwrap(), json!("rag"));
        assert_eq!(serde_json::to_value(StepKind::Tool).unwrap(), json!("tool"));
        assert_eq!(serde_json::to_value(StepKind::Compute).unwrap(), json!("compute"));
    }
}
