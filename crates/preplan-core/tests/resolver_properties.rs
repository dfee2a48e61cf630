//! Property tests for the dependency resolver and the formula evaluator

use indexmap::IndexMap;
use preplan_core::plan::{validate, InputValue, Plan, PlanStep, StepPayload};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

/// Random DAG plan: each step depends on a subset of earlier steps, which
/// keeps the graph acyclic by construction.
fn arbitrary_dag_plan() -> impl Strategy<Value = Plan> {
    (2usize..12).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<bool>(), 0..n), n).prop_map(
            move |dep_masks| {
                let steps = (0..n)
                    .map(|idx| {
                        let inputs: IndexMap<String, InputValue> = dep_masks[idx]
                            .iter()
                            .enumerate()
                            .take(idx)
                            .filter(|(_, keep)| **keep)
                            .map(|(dep, _)| {
                                (format!("p{dep}"), InputValue::Variable(format!("v{dep}")))
                            })
                            .collect();
                        PlanStep {
                            id: format!("s{idx}"),
                            description: String::new(),
                            payload: StepPayload::Tool {
                                tool_name: "probe".to_string(),
                            },
                            inputs,
                            outputs: vec![format!("v{idx}")],
                            condition: None,
                        }
                    })
                    .collect();
                Plan {
                    plan_id: "generated".to_string(),
                    title: String::new(),
                    description: String::new(),
                    version: "1.0".to_string(),
                    variables: Vec::new(),
                    steps,
                    plan_inputs: IndexMap::new(),
                    plan_outputs: Vec::new(),
                }
            },
        )
    })
}

proptest! {
    /// Every step appears after all steps that produce variables it
    /// consumes.
    #[test]
    fn topological_order_respects_dependencies(plan in arbitrary_dag_plan()) {
        let validated = validate(plan).expect("generated plans are acyclic");
        let graph = validated.graph();
        let order = graph.topological_order();

        prop_assert_eq!(order.len(), validated.plan().steps.len());

        let mut position = vec![0usize; order.len()];
        for (pos, &idx) in order.iter().enumerate() {
            position[idx] = pos;
        }
        for idx in 0..order.len() {
            for dep in graph.dependencies(idx) {
                prop_assert!(position[dep] < position[idx],
                    "step {} scheduled before its dependency {}", idx, dep);
            }
        }
    }

    /// Ready sets only ever contain steps whose dependencies are executed.
    #[test]
    fn ready_steps_never_jump_dependencies(plan in arbitrary_dag_plan()) {
        let validated = validate(plan).expect("generated plans are acyclic");
        let graph = validated.graph();

        let mut executed = HashSet::new();
        while executed.len() < graph.len() {
            let ready = graph.ready_steps(&executed);
            prop_assert!(!ready.is_empty(), "acyclic graph stalled");
            for &idx in &ready {
                for dep in graph.dependencies(idx) {
                    prop_assert!(executed.contains(&dep));
                }
            }
            executed.extend(ready);
        }
    }

    /// Purity: the evaluator returns the same value for the same formula
    /// and bindings, every time.
    #[test]
    fn evaluator_is_deterministic(
        a in -1e6f64..1e6,
        b in 1e-3f64..1e6,
        c in -1e6f64..1e6,
    ) {
        let bindings: HashMap<String, f64> =
            [("a".to_string(), a), ("b".to_string(), b), ("c".to_string(), c)].into();
        let formula = "min(a, b) * 2 + max(b, c) - a / b";
        let first = preplan_core::evaluate(formula, &bindings).unwrap();
        let second = preplan_core::evaluate(formula, &bindings).unwrap();
        prop_assert_eq!(first, second);
    }
}
