//! Spec model: typed `Agent`/`Workflow` documents, multi-document parsing
//! and validation.
//!
//! Parsing is per document: a file with one broken record still yields every
//! other record. Agent and workflow references are only checked for shape
//! here; resolution happens at invocation time because specs can be loaded in
//! any order or synthesized mid-run.

pub mod registry;
pub mod schema;

pub use registry::{LoadReport, SpecRegistry};
pub use schema::{
    Agent, AgentMode, AgentSpec, Kind, Metadata, SpecDocument, SpecKey, Step, StepInput,
    StepTarget, Workflow, WorkflowSpec, WorkflowTemplate, API_VERSION,
};

use std::collections::HashSet;

use serde_yaml::Value;

use crate::error::{SpecError, ValidationError};

/// Split text on YAML document boundaries, dropping empty documents.
///
/// Returns `(document number, text)` pairs; numbering starts at 1 and only
/// counts non-empty documents.
pub fn split_documents(text: &str) -> Vec<(usize, String)> {
    let mut docs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed.starts_with("--- ") {
            flush_document(&mut current, &mut docs);
            // `--- key: value` keeps content on the marker line
            let rest = trimmed.trim_start_matches("---").trim_start();
            if !rest.is_empty() && !rest.starts_with('#') {
                current.push(rest);
            }
        } else if trimmed == "..." {
            flush_document(&mut current, &mut docs);
        } else {
            current.push(line);
        }
    }
    flush_document(&mut current, &mut docs);
    docs
}

fn flush_document(lines: &mut Vec<&str>, docs: &mut Vec<(usize, String)>) {
    let has_content = lines
        .iter()
        .any(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));
    if has_content {
        docs.push((docs.len() + 1, lines.join("\n")));
    }
    lines.clear();
}

/// Parse every document in `text` independently.
pub fn parse_documents(text: &str) -> Vec<Result<SpecDocument, SpecError>> {
    split_documents(text)
        .into_iter()
        .map(|(n, body)| parse_document(n, &body))
        .collect()
}

/// Parse and validate a single YAML document.
pub fn parse_document(document: usize, text: &str) -> Result<SpecDocument, SpecError> {
    let value: Value = serde_yaml::from_str(text).map_err(|e| SpecError::Parse {
        document,
        message: e.to_string(),
    })?;

    let map = value.as_mapping().ok_or_else(|| SpecError::Parse {
        document,
        message: "document is not a mapping".to_string(),
    })?;

    let field = |name: &str| {
        map.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let api_version = field("apiVersion");
    let kind_name = field("kind");

    let kind = match Kind::parse(&kind_name) {
        Some(kind) if api_version == API_VERSION => kind,
        _ => {
            return Err(SpecError::UnsupportedKind {
                api_version,
                kind: kind_name,
            })
        }
    };

    let to_parse_error = |e: serde_yaml::Error| SpecError::Parse {
        document,
        message: e.to_string(),
    };
    let doc = match kind {
        Kind::Agent => SpecDocument::Agent(serde_yaml::from_value(value).map_err(to_parse_error)?),
        Kind::Workflow => {
            SpecDocument::Workflow(serde_yaml::from_value(value).map_err(to_parse_error)?)
        }
    };

    let errors = validate(&doc);
    if errors.is_empty() {
        Ok(doc)
    } else {
        Err(SpecError::Validation {
            kind: kind.to_string(),
            name: doc.name().to_string(),
            errors,
        })
    }
}

/// Parse a single `Agent` document.
pub fn parse_agent(text: &str) -> Result<Agent, SpecError> {
    match parse_document(1, text)? {
        SpecDocument::Agent(agent) => Ok(agent),
        SpecDocument::Workflow(_) => Err(SpecError::UnsupportedKind {
            api_version: API_VERSION.to_string(),
            kind: "Workflow (expected Agent)".to_string(),
        }),
    }
}

/// Parse a single `Workflow` document.
pub fn parse_workflow(text: &str) -> Result<Workflow, SpecError> {
    match parse_document(1, text)? {
        SpecDocument::Workflow(workflow) => Ok(workflow),
        SpecDocument::Agent(_) => Err(SpecError::UnsupportedKind {
            api_version: API_VERSION.to_string(),
            kind: "Agent (expected Workflow)".to_string(),
        }),
    }
}

pub fn validate(doc: &SpecDocument) -> Vec<ValidationError> {
    match doc {
        SpecDocument::Agent(agent) => validate_agent(agent),
        SpecDocument::Workflow(workflow) => validate_workflow(workflow),
    }
}

pub fn validate_agent(agent: &Agent) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let required = [
        ("metadata.name", agent.metadata.name.as_str()),
        ("spec.model", agent.spec.model.as_str()),
        ("spec.framework", agent.spec.framework.as_str()),
        ("spec.instructions", agent.spec.instructions.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(ValidationError::MissingField(field.to_string()));
        }
    }
    if agent.spec.mode == AgentMode::Remote
        && agent.spec.url.as_deref().map_or(true, |u| u.trim().is_empty())
    {
        errors.push(ValidationError::RemoteWithoutUrl);
    }
    errors
}

pub fn validate_workflow(workflow: &Workflow) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if workflow.metadata.name.trim().is_empty() {
        errors.push(ValidationError::MissingField("metadata.name".to_string()));
    }

    let steps = workflow.steps();
    if steps.is_empty() {
        errors.push(ValidationError::EmptySteps);
    }

    let mut seen = HashSet::new();
    for (i, step) in steps.iter().enumerate() {
        if step.name.trim().is_empty() {
            errors.push(ValidationError::MissingField(format!(
                "spec.template.steps[{}].name",
                i
            )));
            continue;
        }
        if !seen.insert(step.name.as_str()) {
            errors.push(ValidationError::DuplicateStepName(step.name.clone()));
        }

        match (&step.agent, &step.workflow) {
            (Some(_), Some(_)) => {
                errors.push(ValidationError::AmbiguousStepTarget(step.name.clone()))
            }
            (None, None) => errors.push(ValidationError::MissingStepTarget(step.name.clone())),
            (Some(reference), None) | (None, Some(reference)) => {
                if !is_well_formed_reference(reference) {
                    errors.push(ValidationError::MalformedReference {
                        step: step.name.clone(),
                        field: if step.agent.is_some() { "agent" } else { "workflow" },
                        reference: reference.clone(),
                    });
                }
            }
        }
    }
    errors
}

/// Names are words of `[A-Za-z0-9_.-]` separated by single spaces.
pub fn is_well_formed_reference(reference: &str) -> bool {
    !reference.is_empty()
        && reference.trim() == reference
        && !reference.contains("  ")
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
}
