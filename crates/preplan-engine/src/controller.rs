//! Wave-based execution controller
//!
//! Drives a validated plan to a terminal state: each wave dispatches every
//! step whose dependencies are satisfied, bounded by the configured
//! concurrency limit, and waits for the whole wave before advancing. A
//! failed step finishes its wave, then fails the run with all prior results
//! preserved. Cancellation is checked between waves, never mid-step.

use crate::context::{ExecutionContext, StepResult};
use crate::dispatch::StepDispatcher;
use crate::error::EngineError;
use futures::StreamExt;
use preplan_core::plan::ValidatedPlan;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Requests cooperative cancellation of a running plan.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Ask the controller to stop before its next wave. Steps already in
    /// flight run to completion.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observer side of a cancellation request.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A handle/token pair for one run.
    #[must_use]
    pub fn new() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
    }

    /// A token that can never fire, for callers without cancellation needs.
    #[must_use]
    pub fn never() -> CancelToken {
        let (_, rx) = watch::channel(false);
        CancelToken { rx }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Runs one plan to a terminal status, mutating the context as it goes.
pub struct ExecutionController {
    dispatcher: StepDispatcher,
    max_concurrency: usize,
}

impl ExecutionController {
    #[must_use]
    pub fn new(dispatcher: StepDispatcher, max_concurrency: usize) -> Self {
        Self {
            dispatcher,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Execute the plan wave by wave until every step ran, a step failed,
    /// or cancellation was requested.
    ///
    /// Step failures are not errors here: they land in the context as a
    /// failed run. The error path is reserved for broken run invariants
    /// (binding conflicts, illegal state transitions).
    ///
    /// # Errors
    /// `EngineError` if the context rejects a transition or a binding.
    pub async fn run(
        &self,
        validated: &ValidatedPlan,
        ctx: &mut ExecutionContext,
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        let plan = validated.plan();
        let graph = validated.graph();
        ctx.begin()?;
        tracing::info!(
            execution_id = %ctx.execution_id(),
            plan_id = %plan.plan_id,
            steps = plan.steps.len(),
            "run started"
        );

        let mut executed: HashSet<usize> = HashSet::new();
        let mut wave = 0usize;
        while executed.len() < graph.len() {
            if cancel.is_cancelled() {
                let reason = format!("run cancelled before wave {wave}");
                tracing::warn!(execution_id = %ctx.execution_id(), %reason, "run cancelled");
                ctx.fail(reason)?;
                return Ok(());
            }

            let ready = graph.ready_steps(&executed);
            if ready.is_empty() {
                // Unreachable for a validated plan; cycles never get here.
                ctx.fail("no runnable steps remain but the plan is unfinished")?;
                return Ok(());
            }
            tracing::debug!(wave, steps = ready.len(), "dispatching wave");

            let snapshot = Arc::new(ctx.snapshot());
            let mut results: Vec<(usize, StepResult)> = futures::stream::iter(ready)
                .map(|idx| {
                    let snapshot = Arc::clone(&snapshot);
                    let step = &plan.steps[idx];
                    async move { (idx, self.dispatcher.dispatch(step, &snapshot).await) }
                })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;
            // Record in declaration order so the audit trail is stable
            // regardless of which future finished first.
            results.sort_unstable_by_key(|(idx, _)| *idx);

            let mut wave_failure: Option<String> = None;
            for (idx, result) in results {
                executed.insert(idx);
                if result.is_success() {
                    for binding in result.outputs.clone() {
                        ctx.bind(binding)?;
                    }
                } else if wave_failure.is_none() {
                    wave_failure = Some(format!(
                        "step '{}' failed: {}",
                        result.step_id,
                        result.error.as_deref().unwrap_or("unknown error")
                    ));
                }
                ctx.record(result);
            }

            if let Some(reason) = wave_failure {
                tracing::warn!(execution_id = %ctx.execution_id(), %reason, "run failed");
                ctx.fail(reason)?;
                return Ok(());
            }
            wave += 1;
        }

        tracing::info!(
            execution_id = %ctx.execution_id(),
            waves = wave,
            "run completed"
        );
        ctx.complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_token_stays_uncancelled() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn handle_flips_the_token() {
        let (handle, token) = CancelToken::new();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cloned_tokens_observe_the_same_request() {
        let (handle, token) = CancelToken::new();
        let cloned = token.clone();
        handle.cancel();
        assert!(cloned.is_cancelled());
    }
}
