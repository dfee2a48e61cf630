//! Plan validation
//!
//! [`ValidatedPlan`] is a proof-carrying type: it has no public constructor,
//! so every plan that reaches an execution strategy has passed the full
//! check sequence and carries its dependency graph. Checks run in order but
//! never stop early; authors get every violation in one pass.

use super::Plan;
use crate::error::ValidationError;
use crate::graph::DependencyGraph;
use std::collections::{HashMap, HashSet};

/// A plan that has passed structural validation, plus its derived
/// dependency graph.
///
/// Sealed: only [`validate`] constructs this, so validation cannot be
/// bypassed.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    plan: Plan,
    graph: DependencyGraph,
}

impl ValidatedPlan {
    /// The underlying plan, read-only.
    #[must_use]
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// The derived dependency graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

/// Validate a candidate plan.
///
/// Checks, in order: unique step ids, non-empty outputs, single producer
/// per variable (scenario inputs count as produced), resolvable input
/// references, and acyclicity of the induced dependency graph.
///
/// # Errors
/// A non-empty list with one entry per violation.
pub fn validate(plan: Plan) -> Result<ValidatedPlan, Vec<ValidationError>> {
    let mut errors = Vec::new();

    // (a) step identifiers are unique
    let mut seen_ids = HashSet::new();
    for step in &plan.steps {
        if !seen_ids.insert(step.id.as_str()) {
            errors.push(ValidationError::DuplicateStepId {
                step_id: step.id.clone(),
            });
        }
    }

    // (b) every output variable has exactly one producer, and no step
    // shadows a scenario input (bindings are write-once per run)
    let mut producers: HashMap<&str, &str> = HashMap::new();
    for step in &plan.steps {
        if step.outputs.is_empty() {
            errors.push(ValidationError::EmptyOutputs {
                step_id: step.id.clone(),
            });
        }
        for output in &step.outputs {
            if plan.plan_inputs.contains_key(output) {
                errors.push(ValidationError::ShadowsScenarioInput {
                    step_id: step.id.clone(),
                    variable: output.clone(),
                });
                continue;
            }
            match producers.insert(output.as_str(), step.id.as_str()) {
                None => {}
                Some(first) => errors.push(ValidationError::DuplicateProducer {
                    variable: output.clone(),
                    first: first.to_string(),
                    second: step.id.clone(),
                }),
            }
        }
    }

    // (c) every input reference resolves to a scenario input or some
    // step's output
    for step in &plan.steps {
        for (parameter, variable) in step.referenced_variables() {
            let known =
                plan.plan_inputs.contains_key(variable) || producers.contains_key(variable);
            if !known {
                errors.push(ValidationError::UnresolvedInput {
                    step_id: step.id.clone(),
                    parameter: parameter.to_string(),
                    variable: variable.to_string(),
                });
            }
        }
    }

    // (d) the induced dependency graph is acyclic
    match DependencyGraph::build(&plan) {
        Ok(graph) if errors.is_empty() => Ok(ValidatedPlan { plan, graph }),
        Ok(_) => Err(errors),
        Err(cycle) => {
            errors.push(ValidationError::CycleDetected { cycle: cycle.cycle });
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{InputValue, PlanStep, StepPayload};
    use indexmap::IndexMap;

    fn compute_step(id: &str, formula: &str, refs: &[&str], outputs: &[&str]) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            description: String::new(),
            payload: StepPayload::Compute {
                formula: formula.to_string(),
            },
            inputs: refs
                .iter()
                .map(|v| (v.to_string(), InputValue::Variable(v.to_string())))
                .collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            condition: None,
        }
    }

    fn plan(steps: Vec<PlanStep>, scenario: &[&str]) -> Plan {
        Plan {
            plan_id: "p".to_string(),
            title: String::new(),
            description: String::new(),
            version: "1.0".to_string(),
            variables: Vec::new(),
            steps,
            plan_inputs: scenario
                .iter()
                .map(|s| (s.to_string(), String::new()))
                .collect::<IndexMap<_, _>>(),
            plan_outputs: Vec::new(),
        }
    }

    #[test]
    fn valid_plan_passes() {
        let p = plan(
            vec![
                compute_step("s1", "a*2", &["a"], &["b"]),
                compute_step("s2", "b+1", &["b"], &["c"]),
            ],
            &["a"],
        );
        let validated = validate(p).expect("valid");
        assert_eq!(validated.plan().steps.len(), 2);
    }

    #[test]
    fn duplicate_step_id_reported() {
        let p = plan(
            vec![
                compute_step("s1", "1+1", &[], &["a"]),
                compute_step("s1", "2+2", &[], &["b"]),
            ],
            &[],
        );
        let errors = validate(p).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateStepId { step_id } if step_id == "s1")));
    }

    #[test]
    fn duplicate_producer_reported_and_run_never_starts() {
        let p = plan(
            vec![
                compute_step("s1", "1+1", &[], &["x"]),
                compute_step("s2", "2+2", &[], &["x"]),
            ],
            &[],
        );
        let errors = validate(p).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateProducer {
                variable: "x".to_string(),
                first: "s1".to_string(),
                second: "s2".to_string(),
            }]
        );
    }

    #[test]
    fn scenario_shadowing_reported() {
        let p = plan(vec![compute_step("s1", "a+1", &["a"], &["a2", "a"])], &["a"]);
        let errors = validate(p).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::ShadowsScenarioInput { variable, .. } if variable == "a"
        )));
    }

    #[test]
    fn unresolved_input_reported() {
        let p = plan(vec![compute_step("s1", "ghost+1", &["ghost"], &["x"])], &[]);
        let errors = validate(p).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnresolvedInput {
                step_id: "s1".to_string(),
                parameter: "ghost".to_string(),
                variable: "ghost".to_string(),
            }]
        );
    }

    #[test]
    fn cycle_reported_alongside_other_errors() {
        let p = plan(
            vec![
                compute_step("s1", "b+1", &["b"], &["a"]),
                compute_step("s2", "a+1", &["a"], &["b"]),
                compute_step("s3", "1", &[], &[]),
            ],
            &[],
        );
        let errors = validate(p).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::EmptyOutputs { step_id } if step_id == "s3")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::CycleDetected { .. })));
    }

    #[test]
    fn empty_plan_is_valid() {
        let validated = validate(plan(Vec::new(), &["a"])).expect("no steps, nothing to violate");
        assert!(validated.graph().is_empty());
    }
}
