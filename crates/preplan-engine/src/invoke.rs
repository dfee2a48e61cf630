//! External collaborator capabilities
//!
//! Tool invocation and knowledge retrieval are the two I/O seams of the
//! engine. Both are async traits so implementations can wrap network
//! clients, and both classify failures as transient or permanent — the
//! dispatcher retries only transient failures.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Whether an external failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Transient,
    Permanent,
}

/// Failure reported by a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tool '{tool_name}' failed: {message}")]
pub struct ToolError {
    pub tool_name: String,
    pub message: String,
    pub kind: FailureKind,
}

impl ToolError {
    #[must_use]
    pub fn transient(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            message: message.into(),
            kind: FailureKind::Transient,
        }
    }

    #[must_use]
    pub fn permanent(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            message: message.into(),
            kind: FailureKind::Permanent,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

/// Failure reported by a retrieval query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("retrieval failed: {message}")]
pub struct RetrievalError {
    pub message: String,
    pub kind: FailureKind,
}

impl RetrievalError {
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: FailureKind::Transient,
        }
    }

    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: FailureKind::Permanent,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

/// Values an external collaborator hands back.
///
/// A single value binds to the step's first declared output (the common
/// case for limit lookups); a named map must cover every declared output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutcomeValues {
    Single(serde_json::Value),
    Named(IndexMap<String, serde_json::Value>),
}

/// Successful tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub values: OutcomeValues,
    /// Provenance tag, e.g. which upstream system answered
    pub source: String,
    /// Descriptive unit for the returned value(s)
    pub unit: Option<String>,
}

/// Successful retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutcome {
    pub values: OutcomeValues,
    /// Source citation for the audit trail
    pub citation: String,
}

/// External tool capability.
#[async_trait::async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Invoke `tool_name` with fully resolved inputs.
    async fn invoke(
        &self,
        tool_name: &str,
        inputs: &IndexMap<String, serde_json::Value>,
    ) -> Result<ToolOutcome, ToolError>;
}

/// External knowledge retrieval capability.
#[async_trait::async_trait]
pub trait RetrievalClient: Send + Sync {
    /// Run a retrieval query (placeholders already filled) with resolved
    /// inputs available as structured context.
    async fn retrieve(
        &self,
        query: &str,
        inputs: &IndexMap<String, serde_json::Value>,
    ) -> Result<RetrievalOutcome, RetrievalError>;
}
