//! Error taxonomy for the Maestro engine.
//!
//! Load-time problems (`SpecError`, `ValidationError`) are reported per
//! document and never stop sibling documents from loading. Invocation-time
//! problems (`StepError`) are scoped to one step; only `EngineError` ends a
//! whole run regardless of where it happened.

use std::time::Duration;

/// A semantic problem in a structurally valid document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("workflow has no steps")]
    EmptySteps,

    #[error("step '{step}' has a malformed {field} reference '{reference}'")]
    MalformedReference {
        step: String,
        field: &'static str,
        reference: String,
    },

    #[error("step name '{0}' is declared more than once")]
    DuplicateStepName(String),

    #[error("step '{0}' declares both an agent and a workflow")]
    AmbiguousStepTarget(String),

    #[error("step '{0}' declares neither an agent nor a workflow")]
    MissingStepTarget(String),

    #[error("agent runs in remote mode but has no url")]
    RemoteWithoutUrl,
}

/// Errors raised while turning text into spec documents.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpecError {
    #[error("document {document}: parse error: {message}")]
    Parse { document: usize, message: String },

    #[error("unsupported apiVersion/kind '{api_version}/{kind}'")]
    UnsupportedKind { api_version: String, kind: String },

    #[error("{kind} '{name}' is invalid: {}", join_errors(.errors))]
    Validation {
        kind: String,
        name: String,
        errors: Vec<ValidationError>,
    },

    #[error("failed to read '{path}': {message}")]
    Io { path: String, message: String },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A backend call failed. Adapters decide whether retrying could help.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AdapterError {
    pub message: String,
    pub recoverable: bool,
}

impl AdapterError {
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recoverable: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recoverable: false,
        }
    }
}

/// Why a single step failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("unknown framework '{0}'")]
    UnknownFramework(String),

    #[error("unknown agent reference '{0}'")]
    UnknownAgentReference(String),

    #[error("unknown workflow reference '{0}'")]
    UnknownWorkflowReference(String),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unresolved placeholder '{{{0}}}'")]
    UnresolvedPlaceholder(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("nested workflow '{workflow}' failed: {message}")]
    Nested { workflow: String, message: String },

    #[error("input step '{0}' failed")]
    UpstreamFailed(String),
}

impl StepError {
    /// Stable name of the error kind, used in reports and error markers.
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::UnknownFramework(_) => "UnknownFrameworkError",
            StepError::UnknownAgentReference(_) => "UnknownAgentReference",
            StepError::UnknownWorkflowReference(_) => "UnknownWorkflowReference",
            StepError::Adapter(_) => "AdapterError",
            StepError::Timeout(_) => "Timeout",
            StepError::UnresolvedPlaceholder(_) => "UnresolvedPlaceholder",
            StepError::Cancelled => "Cancelled",
            StepError::Nested { .. } => "NestedWorkflowFailed",
            StepError::UpstreamFailed(_) => "UpstreamFailed",
        }
    }

    /// Recoverable failures are retried with backoff before escalating.
    pub fn is_recoverable(&self) -> bool {
        match self {
            StepError::Adapter(e) => e.recoverable,
            StepError::Timeout(_) => true,
            _ => false,
        }
    }
}

/// Errors that end the whole run, not just one step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("recursion limit exceeded: depth {depth} reached the limit of {limit}")]
    RecursionLimitExceeded { depth: usize, limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(StepError::Adapter(AdapterError::recoverable("503")).is_recoverable());
        assert!(!StepError::Adapter(AdapterError::fatal("400")).is_recoverable());
        assert!(StepError::Timeout(Duration::from_secs(1)).is_recoverable());
        assert!(!StepError::UnresolvedPlaceholder("X".into()).is_recoverable());
        assert!(!StepError::UnknownFramework("x".into()).is_recoverable());
        assert!(!StepError::UpstreamFailed("b".into()).is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            StepError::UnresolvedPlaceholder("CITY".into()).to_string(),
            "unresolved placeholder '{CITY}'"
        );
        let err = SpecError::Validation {
            kind: "Workflow".into(),
            name: "wf".into(),
            errors: vec![ValidationError::EmptySteps, ValidationError::MissingField("metadata.name".into())],
        };
        assert_eq!(
            err.to_string(),
            "Workflow 'wf' is invalid: workflow has no steps; missing required field 'metadata.name'"
        );
    }
}
