//! Dependency graph and resolver
//!
//! The graph is derived from a plan, never stored on it: an edge runs from
//! the step producing a variable to every step that references it as input.
//! Nodes are step indices into the plan's declaration order, which keeps the
//! topological tie-break deterministic and close to the author's reading
//! order.

use crate::error::CycleError;
use crate::plan::Plan;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Directed acyclic dependency graph over a plan's steps.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraphMap<usize, ()>,
    /// Variable name to the index of its producing step
    producers: HashMap<String, usize>,
    /// Step ids by index, for error reporting
    step_ids: Vec<String>,
    /// Cached topological order, declaration-order tie-broken
    order: Vec<usize>,
}

impl DependencyGraph {
    /// Build the graph induced by a plan's input references.
    ///
    /// Inputs that refer to scenario variables (or to nothing at all) add no
    /// edge; a step consuming its own output is a self-loop and therefore a
    /// cycle.
    ///
    /// # Errors
    /// `CycleError` carrying the offending cycle if the graph is not acyclic.
    pub(crate) fn build(plan: &Plan) -> Result<Self, CycleError> {
        let mut graph = DiGraphMap::new();
        let mut producers: HashMap<String, usize> = HashMap::new();
        let step_ids: Vec<String> = plan.steps.iter().map(|s| s.id.clone()).collect();

        for idx in 0..plan.steps.len() {
            graph.add_node(idx);
        }
        for (idx, step) in plan.steps.iter().enumerate() {
            for output in &step.outputs {
                // Duplicate producers are a validation error; the first
                // producer wins here so resolution can still proceed.
                producers.entry(output.clone()).or_insert(idx);
            }
        }
        for (idx, step) in plan.steps.iter().enumerate() {
            for (_, variable) in step.referenced_variables() {
                if let Some(&producer) = producers.get(variable) {
                    if producer == idx {
                        return Err(CycleError {
                            cycle: vec![step.id.clone(), step.id.clone()],
                        });
                    }
                    graph.add_edge(producer, idx, ());
                }
            }
        }

        let order = kahn_order(&graph).ok_or_else(|| CycleError {
            cycle: find_cycle(&graph, &step_ids),
        })?;

        Ok(Self {
            graph,
            producers,
            step_ids,
            order,
        })
    }

    /// Number of steps in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.step_ids.len()
    }

    /// True when the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.step_ids.is_empty()
    }

    /// Topological order of step indices.
    ///
    /// Ties between steps with no remaining unmet dependency break by
    /// ascending declaration order, so the order is fully deterministic.
    #[must_use]
    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    /// Index of the step producing `variable`, if any step does.
    #[must_use]
    pub fn producer_of(&self, variable: &str) -> Option<usize> {
        self.producers.get(variable).copied()
    }

    /// Direct dependencies of a step (producers of its inputs).
    #[must_use]
    pub fn dependencies(&self, step: usize) -> Vec<usize> {
        let mut deps: Vec<usize> = self
            .graph
            .neighbors_directed(step, Direction::Incoming)
            .collect();
        deps.sort_unstable();
        deps
    }

    /// Steps whose dependencies are all in `executed` and that are not
    /// themselves executed: the next dispatch wave.
    #[must_use]
    pub fn ready_steps(&self, executed: &HashSet<usize>) -> Vec<usize> {
        (0..self.len())
            .filter(|idx| !executed.contains(idx))
            .filter(|idx| {
                self.graph
                    .neighbors_directed(*idx, Direction::Incoming)
                    .all(|dep| executed.contains(&dep))
            })
            .collect()
    }

    /// Sibling steps with no ordering relation to `step` in either
    /// direction: the candidate set for concurrent dispatch.
    #[must_use]
    pub fn independent_peers(&self, step: usize) -> Vec<usize> {
        (0..self.len())
            .filter(|&other| other != step)
            .filter(|&other| {
                !petgraph::algo::has_path_connecting(&self.graph, step, other, None)
                    && !petgraph::algo::has_path_connecting(&self.graph, other, step, None)
            })
            .collect()
    }
}

/// Kahn's algorithm with ascending-index tie-breaking.
///
/// Returns `None` when the graph has a cycle. The linear scan per wave is
/// O(n^2) but plans are small by construction.
fn kahn_order(graph: &DiGraphMap<usize, ()>) -> Option<Vec<usize>> {
    let n = graph.node_count();
    let mut indegree: Vec<usize> = (0..n)
        .map(|idx| graph.neighbors_directed(idx, Direction::Incoming).count())
        .collect();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while order.len() < n {
        let next = (0..n).find(|&idx| !placed[idx] && indegree[idx] == 0)?;
        placed[next] = true;
        order.push(next);
        for succ in graph.neighbors_directed(next, Direction::Outgoing) {
            indegree[succ] -= 1;
        }
    }
    Some(order)
}

/// Extract one cycle as step ids for the error payload.
///
/// Peels zero-indegree nodes the way Kahn does; whatever remains lies on a
/// cycle, so walking successors inside the remainder must revisit a node.
fn find_cycle(graph: &DiGraphMap<usize, ()>, step_ids: &[String]) -> Vec<String> {
    let n = graph.node_count();
    let mut indegree: Vec<usize> = (0..n)
        .map(|idx| graph.neighbors_directed(idx, Direction::Incoming).count())
        .collect();
    let mut removed = vec![false; n];
    loop {
        let Some(next) = (0..n).find(|&idx| !removed[idx] && indegree[idx] == 0) else {
            break;
        };
        removed[next] = true;
        for succ in graph.neighbors_directed(next, Direction::Outgoing) {
            indegree[succ] -= 1;
        }
    }

    let Some(start) = (0..n).find(|&idx| !removed[idx]) else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut seen = HashSet::from([start]);
    let mut current = start;
    loop {
        let Some(succ) = graph
            .neighbors_directed(current, Direction::Outgoing)
            .filter(|s| !removed[*s])
            .min()
        else {
            break;
        };
        if seen.contains(&succ) {
            let from = path.iter().position(|&p| p == succ).unwrap_or(0);
            let mut cycle: Vec<String> =
                path[from..].iter().map(|&idx| step_ids[idx].clone()).collect();
            cycle.push(step_ids[succ].clone());
            return cycle;
        }
        seen.insert(succ);
        path.push(succ);
        current = succ;
    }
    path.into_iter().map(|idx| step_ids[idx].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{validate, InputValue, Plan, PlanStep, StepPayload};
    use indexmap::IndexMap;

    fn tool_step(id: &str, inputs: &[(&str, &str)], outputs: &[&str]) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            description: String::new(),
            payload: StepPayload::Tool {
                tool_name: format!("{id}_tool"),
            },
            inputs: inputs
                .iter()
                .map(|(k, v)| (k.to_string(), InputValue::Variable(v.to_string())))
                .collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            condition: None,
        }
    }

    fn plan_with(steps: Vec<PlanStep>, scenario: &[&str]) -> Plan {
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
    fn diamond_orders_and_peers() {
        // a -> b, a -> c, {b,c} -> d
        let plan = plan_with(
            vec![
                tool_step("a", &[], &["va"]),
                tool_step("b", &[("x", "va")], &["vb"]),
                tool_step("c", &[("x", "va")], &["vc"]),
                tool_step("d", &[("l", "vb"), ("r", "vc")], &["vd"]),
            ],
            &[],
        );
        let graph = DependencyGraph::build(&plan).unwrap();

        assert_eq!(graph.topological_order(), &[0, 1, 2, 3]);
        assert_eq!(graph.dependencies(3), vec![1, 2]);
        assert_eq!(graph.independent_peers(1), vec![2]);
        assert_eq!(graph.independent_peers(0), Vec::<usize>::new());
    }

    #[test]
    fn ready_steps_advance_in_waves() {
        let plan = plan_with(
            vec![
                tool_step("a", &[], &["va"]),
                tool_step("b", &[], &["vb"]),
                tool_step("c", &[("l", "va"), ("r", "vb")], &["vc"]),
            ],
            &[],
        );
        let graph = DependencyGraph::build(&plan).unwrap();

        let mut executed = HashSet::new();
        assert_eq!(graph.ready_steps(&executed), vec![0, 1]);

        executed.insert(0);
        assert_eq!(graph.ready_steps(&executed), vec![1]);

        executed.insert(1);
        assert_eq!(graph.ready_steps(&executed), vec![2]);
    }

    #[test]
    fn cycle_is_detected_with_members() {
        let plan = plan_with(
            vec![
                tool_step("a", &[("x", "vb")], &["va"]),
                tool_step("b", &[("x", "va")], &["vb"]),
            ],
            &[],
        );
        let err = DependencyGraph::build(&plan).unwrap_err();
        assert!(err.cycle.contains(&"a".to_string()));
        assert!(err.cycle.contains(&"b".to_string()));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let plan = plan_with(vec![tool_step("a", &[("x", "va")], &["va"])], &[]);
        assert!(DependencyGraph::build(&plan).is_err());
    }

    #[test]
    fn tie_break_follows_declaration_order() {
        // b declared before a but both are roots; order must follow
        // declaration, not id
        let plan = plan_with(
            vec![
                tool_step("later", &[], &["v1"]),
                tool_step("earlier", &[], &["v2"]),
            ],
            &[],
        );
        let graph = DependencyGraph::build(&plan).unwrap();
        assert_eq!(graph.topological_order(), &[0, 1]);
    }

    #[test]
    fn validated_plan_exposes_graph() {
        let plan = plan_with(
            vec![
                tool_step("a", &[("line", "line")], &["va"]),
                tool_step("b", &[("x", "va")], &["vb"]),
            ],
            &["line"],
        );
        let validated = validate(plan).unwrap();
        assert_eq!(validated.graph().topological_order(), &[0, 1]);
    }
}
