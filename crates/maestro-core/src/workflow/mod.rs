//! Workflow engine: plans, executes and extends workflows at runtime.
//!
//! # Architecture
//!
//! ```text
//! Workflow ──► Plan (groups) ──► Executor ──► AdapterRegistry ──► backend
//!                                   │  ▲
//!                 ExecutionContext ◄┘  │
//!                        │             │
//!                   Synthesizer ───────┘ (spec output staged, maybe run nested)
//! ```

pub mod context;
pub mod executor;
pub mod mermaid;
pub mod plan;
pub mod synthesizer;

pub use context::{ExecutionContext, RunStatus, StepRecord, StepStatus};
pub use executor::{Artifact, Executor, Failure, RunReport};
pub use mermaid::{to_mermaid, FlowDirection, MermaidKind};
pub use plan::Plan;
