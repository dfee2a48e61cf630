//! Preplan Adapters - static tool and retrieval backends
//!
//! Concrete [`ToolInvoker`] and [`RetrievalClient`] implementations for
//! demos and tests: a closure-registry tool invoker pre-loadable with the
//! dc-line limit tables, a transient-failure-injecting decorator, and a
//! keyword-matched retrieval corpus. Production deployments implement the
//! same traits against live services.
//!
//! [`ToolInvoker`]: preplan_engine::ToolInvoker
//! [`RetrievalClient`]: preplan_engine::RetrievalClient

pub mod retrieval;
pub mod tools;

pub use retrieval::StaticRetrievalClient;
pub use tools::{FlakyToolInvoker, StaticToolInvoker};
