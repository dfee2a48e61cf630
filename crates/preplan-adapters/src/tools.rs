//! Static tool adapters
//!
//! [`StaticToolInvoker`] answers tool invocations from registered closures,
//! which is enough for demos and deterministic tests. The grid defaults
//! carry canned dc-line limit tables so the dc-limit preplan runs end to
//! end without any live grid API. [`FlakyToolInvoker`] wraps any invoker
//! and injects transient failures for retry testing.

use indexmap::IndexMap;
use preplan_engine::{OutcomeValues, ToolError, ToolInvoker, ToolOutcome};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

type ToolFn = Arc<
    dyn Fn(&IndexMap<String, serde_json::Value>) -> Result<ToolOutcome, ToolError> + Send + Sync,
>;

/// Tool invoker backed by a registry of named closures.
#[derive(Clone, Default)]
pub struct StaticToolInvoker {
    tools: HashMap<String, ToolFn>,
}

impl StaticToolInvoker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: impl Into<String>, tool: F)
    where
        F: Fn(&IndexMap<String, serde_json::Value>) -> Result<ToolOutcome, ToolError>
            + Send
            + Sync
            + 'static,
    {
        self.tools.insert(name.into(), Arc::new(tool));
    }

    /// Registry pre-loaded with the dc-line lookup tools:
    /// `query_send_limit`, `query_recv_limit`, `query_converter_capacity`.
    /// Values are per-line canned answers in MW; unknown lines fall back to
    /// a conservative default where the original data had one.
    #[must_use]
    pub fn with_grid_defaults() -> Self {
        let mut invoker = Self::new();

        invoker.register("query_send_limit", |inputs| {
            let line = require_line("query_send_limit", inputs)?;
            let value = match line.as_str() {
                "tianzhong_dc" => 3200.0,
                "tianha_dc" => 2800.0,
                _ => 2500.0,
            };
            Ok(ToolOutcome {
                values: OutcomeValues::Single(serde_json::json!(value)),
                source: format!("send limit database/{line}"),
                unit: Some("MW".to_string()),
            })
        });

        invoker.register("query_recv_limit", |inputs| {
            let line = require_line("query_recv_limit", inputs)?;
            let value = match line.as_str() {
                "tianzhong_dc" => 3000.0,
                "tianha_dc" => 2600.0,
                _ => 2400.0,
            };
            Ok(ToolOutcome {
                values: OutcomeValues::Single(serde_json::json!(value)),
                source: format!("receive limit database/{line}"),
                unit: Some("MW".to_string()),
            })
        });

        invoker.register("query_converter_capacity", |inputs| {
            let line = require_line("query_converter_capacity", inputs)?;
            // (P_max_convert MW, F_current kA, converter count)
            let (p_max, current, count) = match line.as_str() {
                "tianzhong_dc" => (1600.0, 2.5, 2.0),
                "tianha_dc" => (1400.0, 2.0, 2.0),
                _ => {
                    return Err(ToolError::permanent(
                        "query_converter_capacity",
                        format!("no converter data for line '{line}'"),
                    ))
                }
            };
            let p_dcsystem = p_max * current * count;
            Ok(ToolOutcome {
                values: OutcomeValues::Single(serde_json::json!(p_dcsystem)),
                source: format!("converter parameter database/{line}"),
                unit: Some("MW".to_string()),
            })
        });

        invoker
    }
}

fn require_line(
    tool: &str,
    inputs: &IndexMap<String, serde_json::Value>,
) -> Result<String, ToolError> {
    match inputs.get("line") {
        Some(serde_json::Value::String(line)) => Ok(line.clone()),
        Some(other) => Err(ToolError::permanent(
            tool,
            format!("'line' input must be a string, got {other}"),
        )),
        None => Err(ToolError::permanent(tool, "missing 'line' input")),
    }
}

#[async_trait::async_trait]
impl ToolInvoker for StaticToolInvoker {
    async fn invoke(
        &self,
        tool_name: &str,
        inputs: &IndexMap<String, serde_json::Value>,
    ) -> Result<ToolOutcome, ToolError> {
        match self.tools.get(tool_name) {
            Some(tool) => tool(inputs),
            None => Err(ToolError::permanent(
                tool_name,
                "tool is not registered",
            )),
        }
    }
}

/// Decorator that fails the first `failures` invocations with a transient
/// error, then delegates. The counter is shared across tool names.
pub struct FlakyToolInvoker {
    inner: Arc<dyn ToolInvoker>,
    failures_remaining: AtomicU32,
}

impl FlakyToolInvoker {
    #[must_use]
    pub fn new(inner: Arc<dyn ToolInvoker>, failures: u32) -> Self {
        Self {
            inner,
            failures_remaining: AtomicU32::new(failures),
        }
    }
}

#[async_trait::async_trait]
impl ToolInvoker for FlakyToolInvoker {
    async fn invoke(
        &self,
        tool_name: &str,
        inputs: &IndexMap<String, serde_json::Value>,
    ) -> Result<ToolOutcome, ToolError> {
        let remaining = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if remaining {
            tracing::debug!(tool_name, "injecting transient failure");
            return Err(ToolError::transient(tool_name, "injected transient failure"));
        }
        self.inner.invoke(tool_name, inputs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn line_inputs(line: &str) -> IndexMap<String, serde_json::Value> {
        IndexMap::from([("line".to_string(), json!(line))])
    }

    #[tokio::test]
    async fn send_limit_table_answers_known_lines() {
        let invoker = StaticToolInvoker::with_grid_defaults();
        let outcome = invoker
            .invoke("query_send_limit", &line_inputs("tianzhong_dc"))
            .await
            .unwrap();
        assert_eq!(outcome.values, OutcomeValues::Single(json!(3200.0)));
        assert_eq!(outcome.unit.as_deref(), Some("MW"));
    }

    #[tokio::test]
    async fn unknown_line_falls_back_to_default_limit() {
        let invoker = StaticToolInvoker::with_grid_defaults();
        let outcome = invoker
            .invoke("query_recv_limit", &line_inputs("some_other_dc"))
            .await
            .unwrap();
        assert_eq!(outcome.values, OutcomeValues::Single(json!(2400.0)));
    }

    #[tokio::test]
    async fn converter_capacity_multiplies_line_parameters() {
        let invoker = StaticToolInvoker::with_grid_defaults();
        let outcome = invoker
            .invoke("query_converter_capacity", &line_inputs("tianha_dc"))
            .await
            .unwrap();
        // 1400 MW * 2.0 kA factor * 2 converters
        assert_eq!(outcome.values, OutcomeValues::Single(json!(5600.0)));
    }

    #[tokio::test]
    async fn unregistered_tool_is_a_permanent_failure() {
        let invoker = StaticToolInvoker::with_grid_defaults();
        let err = invoker
            .invoke("query_weather", &IndexMap::new())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn missing_line_input_is_rejected() {
        let invoker = StaticToolInvoker::with_grid_defaults();
        let err = invoker
            .invoke("query_send_limit", &IndexMap::new())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(err.message.contains("line"));
    }

    #[tokio::test]
    async fn flaky_invoker_recovers_after_injected_failures() {
        let flaky = FlakyToolInvoker::new(
            Arc::new(StaticToolInvoker::with_grid_defaults()),
            2,
        );
        let inputs = line_inputs("tianzhong_dc");

        for _ in 0..2 {
            let err = flaky.invoke("query_send_limit", &inputs).await.unwrap_err();
            assert!(err.is_transient());
        }
        let outcome = flaky.invoke("query_send_limit", &inputs).await.unwrap();
        assert_eq!(outcome.values, OutcomeValues::Single(json!(3200.0)));
    }
}
