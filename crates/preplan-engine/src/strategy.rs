//! Execution strategies and the engine front door
//!
//! Strategies own the actual run semantics; the engine routes a validated
//! plan to whichever registered strategy the complexity router selects.
//! Only the linear strategy ships here. Branching engines register their
//! own implementation; routing a plan to an unregistered kind is a
//! structured error, never a silent downgrade to linear.

use crate::audit::AuditTrail;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::controller::{CancelToken, ExecutionController};
use crate::dispatch::StepDispatcher;
use crate::error::EngineError;
use crate::invoke::{RetrievalClient, ToolInvoker};
use indexmap::IndexMap;
use preplan_core::plan::{validate, Plan, ValidatedPlan};
use preplan_core::route::{route, StrategyKind};
use std::collections::HashMap;
use std::sync::Arc;

/// One way of running a validated plan to a terminal context.
#[async_trait::async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// The routing kind this strategy serves.
    fn kind(&self) -> StrategyKind;

    /// Drive the context to a terminal status.
    ///
    /// # Errors
    /// `EngineError` on run-invariant violations; step failures terminate
    /// the context instead.
    async fn execute(
        &self,
        validated: &ValidatedPlan,
        ctx: &mut ExecutionContext,
        cancel: &CancelToken,
    ) -> Result<(), EngineError>;
}

/// Wave-based strategy for plans without conditional branching.
pub struct LinearStrategy {
    controller: ExecutionController,
}

impl LinearStrategy {
    #[must_use]
    pub fn new(
        tools: Arc<dyn ToolInvoker>,
        retrieval: Arc<dyn RetrievalClient>,
        config: &EngineConfig,
    ) -> Self {
        let dispatcher = StepDispatcher::new(
            tools,
            retrieval,
            config.retry.clone(),
            config.step_timeout,
        );
        Self {
            controller: ExecutionController::new(dispatcher, config.max_concurrency),
        }
    }
}

#[async_trait::async_trait]
impl ExecutionStrategy for LinearStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Linear
    }

    async fn execute(
        &self,
        validated: &ValidatedPlan,
        ctx: &mut ExecutionContext,
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        self.controller.run(validated, ctx, cancel).await
    }
}

/// Front door: route a validated plan and run it under the selected
/// strategy, producing an audit trail either way the run ends.
pub struct Engine {
    config: EngineConfig,
    strategies: HashMap<StrategyKind, Box<dyn ExecutionStrategy>>,
}

impl Engine {
    /// Engine with the linear strategy pre-registered.
    #[must_use]
    pub fn new(
        tools: Arc<dyn ToolInvoker>,
        retrieval: Arc<dyn RetrievalClient>,
        config: EngineConfig,
    ) -> Self {
        let linear = LinearStrategy::new(tools, retrieval, &config);
        let mut strategies: HashMap<StrategyKind, Box<dyn ExecutionStrategy>> = HashMap::new();
        strategies.insert(linear.kind(), Box::new(linear));
        Self { config, strategies }
    }

    /// Register (or replace) the strategy for its kind.
    pub fn register(&mut self, strategy: Box<dyn ExecutionStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate a raw plan and execute it.
    ///
    /// # Errors
    /// `EngineError::Validation` with every violation if the plan is
    /// rejected, otherwise whatever [`Engine::execute`] returns.
    pub async fn execute_plan(
        &self,
        plan: Plan,
        scenario: IndexMap<String, serde_json::Value>,
    ) -> Result<AuditTrail, EngineError> {
        let validated = validate(plan).map_err(EngineError::Validation)?;
        self.execute(&validated, scenario).await
    }

    /// Execute a validated plan without cancellation.
    ///
    /// # Errors
    /// See [`Engine::execute_with_cancel`].
    pub async fn execute(
        &self,
        validated: &ValidatedPlan,
        scenario: IndexMap<String, serde_json::Value>,
    ) -> Result<AuditTrail, EngineError> {
        self.execute_with_cancel(validated, scenario, &CancelToken::never())
            .await
    }

    /// Route, run, and assemble the audit trail.
    ///
    /// A failed run is a successful call: the failure is carried on the
    /// returned trail.
    ///
    /// # Errors
    /// `EngineError::StrategyUnavailable` when routing selects a kind with
    /// no registered strategy; run-invariant violations from the strategy.
    pub async fn execute_with_cancel(
        &self,
        validated: &ValidatedPlan,
        scenario: IndexMap<String, serde_json::Value>,
        cancel: &CancelToken,
    ) -> Result<AuditTrail, EngineError> {
        let report = route(validated, &self.config.router);
        tracing::info!(
            plan_id = %validated.plan().plan_id,
            strategy = %report.strategy,
            reason = %report.reason,
            "routed plan"
        );
        let strategy = self
            .strategies
            .get(&report.strategy)
            .ok_or(EngineError::StrategyUnavailable {
                kind: report.strategy,
            })?;

        let mut ctx = ExecutionContext::new(&validated.plan().plan_id, scenario);
        strategy.execute(validated, &mut ctx, cancel).await?;
        Ok(AuditTrail::assemble(&ctx, validated.plan()))
    }
}
