//! Maestro Core: declarative multi-agent workflow engine.
//!
//! This crate turns `Agent` and `Workflow` documents (`apiVersion:
//! maestro/v1alpha1`) into executed pipelines. It has no CLI dependency and
//! can be embedded in any tokio application.
//!
//! - `spec`: typed documents, multi-document parsing, validation, registry
//! - `template`: `{NAME}` placeholder resolution
//! - `adapter`: framework-keyed backend adapters
//! - `workflow`: planner, executor, execution context, spec synthesis
//!
//! Agents may answer with new specs. Those are staged for the run and can be
//! executed by later `workflow:` steps, up to `EngineConfig::max_depth`
//! levels of nesting.

pub mod adapter;
pub mod config;
pub mod error;
pub mod spec;
pub mod template;
pub mod workflow;

// Convenience re-exports
pub use adapter::{AdapterRegistry, AgentAdapter, InvocationResult};
pub use config::EngineConfig;
pub use error::{AdapterError, EngineError, SpecError, StepError, ValidationError};
pub use spec::{Agent, SpecDocument, SpecRegistry, Workflow};
pub use workflow::{Artifact, ExecutionContext, Executor, RunReport, RunStatus};
