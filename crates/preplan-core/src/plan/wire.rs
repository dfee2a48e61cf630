//! Wire contract for plan documents
//!
//! The external parser hands plans over as JSON documents. This module is
//! the serde mirror of that contract; [`Plan::try_from`] lifts a document
//! into the typed model, collecting payload errors instead of failing fast.
//! The producer is untrusted, so nothing here is assumed well-formed until
//! [`super::validate`] has run.

use super::{InputValue, Plan, PlanStep, StepKind, StepPayload, VariableSpec};
use crate::error::ValidationError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

fn default_version() -> String {
    "1.0".to_string()
}

/// One step as it appears on the wire: a `type` discriminator plus flat,
/// kind-specific optional fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl StepDocument {
    fn into_step(self) -> Result<PlanStep, ValidationError> {
        let payload = match self.step_type {
            StepKind::Retrieval => match self.query {
                Some(query) => StepPayload::Retrieval { query },
                None => {
                    return Err(ValidationError::MissingPayload {
                        step_id: self.id,
                        kind: StepKind::Retrieval,
                        field: "query",
                    })
                }
            },
            StepKind::Tool => match self.tool_name {
                Some(tool_name) => StepPayload::Tool { tool_name },
                None => {
                    return Err(ValidationError::MissingPayload {
                        step_id: self.id,
                        kind: StepKind::Tool,
                        field: "tool_name",
                    })
                }
            },
            StepKind::Compute => match self.formula {
                Some(formula) => StepPayload::Compute { formula },
                None => {
                    return Err(ValidationError::MissingPayload {
                        step_id: self.id,
                        kind: StepKind::Compute,
                        field: "formula",
                    })
                }
            },
        };

        Ok(PlanStep {
            id: self.id,
            description: self.description,
            payload,
            inputs: self
                .inputs
                .into_iter()
                .map(|(k, v)| (k, InputValue::from_wire(v)))
                .collect(),
            outputs: self.outputs,
            condition: self.condition,
        })
    }
}

/// A plan document as produced by the external preplan parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    pub plan_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    pub steps: Vec<StepDocument>,
    #[serde(default)]
    pub plan_inputs: IndexMap<String, String>,
    #[serde(default)]
    pub plan_outputs: Vec<String>,
}

impl TryFrom<PlanDocument> for Plan {
    type Error = Vec<ValidationError>;

    fn try_from(doc: PlanDocument) -> Result<Self, Self::Error> {
        let mut errors = Vec::new();
        let mut steps = Vec::with_capacity(doc.steps.len());

        for step_doc in doc.steps {
            match step_doc.into_step() {
                Ok(step) => steps.push(step),
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Plan {
            plan_id: doc.plan_id,
            title: doc.title,
            description: doc.description,
            version: doc.version,
            variables: doc.variables,
            steps,
            plan_inputs: doc.plan_inputs,
            plan_outputs: doc.plan_outputs,
        })
    }
}
