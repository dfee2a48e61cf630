//! Complexity router
//!
//! Classifies a validated plan and picks the execution strategy that should
//! run it. The function is pure: same plan and thresholds, same answer, so
//! routing decisions are reproducible and testable on their own.

use crate::plan::{StepKind, StepPayload, ValidatedPlan};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Formula keywords that signal conditional logic beyond the restricted
/// grammar.
const CONDITIONAL_KEYWORDS: [&str; 3] = ["if", "case", "when"];

/// Which execution strategy should run a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Wave-scheduled linear engine
    Linear,
    /// Branching / sub-agent engine (external contract)
    Branching,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Linear => write!(f, "linear"),
            StrategyKind::Branching => write!(f, "branching"),
        }
    }
}

/// Routing thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Largest step count still routed to the linear engine
    pub max_linear_steps: usize,
    /// Retrieval-step count above which fan-out counts as heavy
    pub heavy_retrieval_steps: usize,
    /// Tool-step count above which fan-out counts as heavy
    pub heavy_tool_steps: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_linear_steps: 15,
            heavy_retrieval_steps: 5,
            heavy_tool_steps: 5,
        }
    }
}

/// Deterministic classification of one plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingReport {
    pub strategy: StrategyKind,
    pub step_count: usize,
    pub retrieval_steps: usize,
    pub tool_steps: usize,
    pub compute_steps: usize,
    /// Distinct tool names invoked
    pub distinct_tools: usize,
    pub has_conditional_markers: bool,
    /// Human-readable reason for the decision
    pub reason: String,
}

/// Classify a validated plan against the configured thresholds.
#[must_use]
pub fn route(plan: &ValidatedPlan, config: &RouterConfig) -> RoutingReport {
    let steps = &plan.plan().steps;

    let mut retrieval_steps = 0;
    let mut tool_steps = 0;
    let mut compute_steps = 0;
    let mut tools = HashSet::new();
    let mut has_conditional_markers = false;

    for step in steps {
        match step.kind() {
            StepKind::Retrieval => retrieval_steps += 1,
            StepKind::Tool => tool_steps += 1,
            StepKind::Compute => compute_steps += 1,
        }
        if let StepPayload::Tool { tool_name } = &step.payload {
            tools.insert(tool_name.as_str());
        }
        if step.condition.is_some() {
            has_conditional_markers = true;
        }
        if let StepPayload::Compute { formula } = &step.payload {
            if CONDITIONAL_KEYWORDS.iter().any(|kw| formula.contains(kw)) {
                has_conditional_markers = true;
            }
        }
    }

    let step_count = steps.len();
    let heavy_fanout =
        retrieval_steps > config.heavy_retrieval_steps && tool_steps > config.heavy_tool_steps;

    let (strategy, reason) = if has_conditional_markers {
        (
            StrategyKind::Branching,
            "plan carries conditional markers".to_string(),
        )
    } else if step_count > config.max_linear_steps {
        (
            StrategyKind::Branching,
            format!(
                "step count {step_count} exceeds linear limit {}",
                config.max_linear_steps
            ),
        )
    } else if heavy_fanout {
        (
            StrategyKind::Branching,
            format!("heavy fan-out: {retrieval_steps} retrieval and {tool_steps} tool steps"),
        )
    } else {
        (
            StrategyKind::Linear,
            "sequential dependency structure without conditional logic".to_string(),
        )
    };

    RoutingReport {
        strategy,
        step_count,
        retrieval_steps,
        tool_steps,
        compute_steps,
        distinct_tools: tools.len(),
        has_conditional_markers,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{validate, Plan, PlanStep, StepPayload};
    use indexmap::IndexMap;

    fn step(id: &str, payload: StepPayload, condition: Option<&str>) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            description: String::new(),
            payload,
            inputs: IndexMap::new(),
            outputs: vec![format!("out_{id}")],
            condition: condition.map(|s| s.to_string()),
        }
    }

    fn validated(steps: Vec<PlanStep>) -> ValidatedPlan {
        validate(Plan {
            plan_id: "p".to_string(),
            title: String::new(),
            description: String::new(),
            version: "1.0".to_string(),
            variables: Vec::new(),
            steps,
            plan_inputs: IndexMap::new(),
            plan_outputs: Vec::new(),
        })
        .expect("valid plan")
    }

    #[test]
    fn small_unconditional_plan_routes_linear() {
        let plan = validated(vec![
            step("t1", StepPayload::Tool { tool_name: "query_send_limit".into() }, None),
            step("c1", StepPayload::Compute { formula: "1+1".into() }, None),
        ]);
        let report = route(&plan, &RouterConfig::default());
        assert_eq!(report.strategy, StrategyKind::Linear);
        assert_eq!(report.tool_steps, 1);
        assert_eq!(report.compute_steps, 1);
        assert_eq!(report.distinct_tools, 1);
    }

    #[test]
    fn condition_field_routes_branching() {
        let plan = validated(vec![step(
            "t1",
            StepPayload::Tool { tool_name: "x".into() },
            Some("side_info == send"),
        )]);
        let report = route(&plan, &RouterConfig::default());
        assert_eq!(report.strategy, StrategyKind::Branching);
        assert!(report.has_conditional_markers);
    }

    #[test]
    fn conditional_formula_keyword_routes_branching() {
        let plan = validated(vec![step(
            "c1",
            StepPayload::Compute { formula: "if(a, b, c)".into() },
            None,
        )]);
        assert_eq!(
            route(&plan, &RouterConfig::default()).strategy,
            StrategyKind::Branching
        );
    }

    #[test]
    fn step_count_over_limit_routes_branching() {
        let steps = (0..16)
            .map(|i| step(&format!("c{i}"), StepPayload::Compute { formula: "1+1".into() }, None))
            .collect();
        let report = route(&validated(steps), &RouterConfig::default());
        assert_eq!(report.strategy, StrategyKind::Branching);
        assert_eq!(report.step_count, 16);
    }

    #[test]
    fn routing_is_pure() {
        let plan = validated(vec![step(
            "t1",
            StepPayload::Tool { tool_name: "x".into() },
            None,
        )]);
        let config = RouterConfig::default();
        assert_eq!(route(&plan, &config), route(&plan, &config));
    }
}
