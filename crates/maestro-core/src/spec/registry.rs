//! Spec registry: the static arena of loaded `Agent` and `Workflow` specs.
//!
//! Specs are loaded from YAML strings, files or directories. Every document is
//! loaded independently; failures are collected in a `LoadReport` instead of
//! aborting the load.

use std::collections::HashMap;
use std::path::Path;

use crate::error::SpecError;
use crate::spec::schema::{Agent, Kind, SpecDocument, SpecKey, Workflow};

/// Outcome of loading one source.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<SpecKey>,
    pub errors: Vec<SpecError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn merge(&mut self, other: LoadReport) {
        self.loaded.extend(other.loaded);
        self.errors.extend(other.errors);
    }
}

/// Loaded specs indexed by name. Names are unique per kind.
#[derive(Debug, Default, Clone)]
pub struct SpecRegistry {
    agents: HashMap<String, Agent>,
    workflows: HashMap<String, Workflow>,
    /// Workflow names in load order
    workflow_order: Vec<String>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every document in a YAML string.
    pub fn load_str(&mut self, yaml: &str) -> LoadReport {
        let mut report = LoadReport::default();
        for result in crate::spec::parse_documents(yaml) {
            match result {
                Ok(doc) => report.loaded.push(self.insert(doc)),
                Err(e) => {
                    tracing::warn!("[SpecRegistry] Skipping document: {}", e);
                    report.errors.push(e);
                }
            }
        }
        report
    }

    /// Load a YAML file. An unreadable file is reported, not raised.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> LoadReport {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let report = self.load_str(&content);
                tracing::info!(
                    "[SpecRegistry] Loaded {} spec(s) from '{}'",
                    report.loaded.len(),
                    path.display()
                );
                report
            }
            Err(e) => LoadReport {
                loaded: Vec::new(),
                errors: vec![SpecError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                }],
            },
        }
    }

    /// Load all `.yaml`/`.yml` files in a directory, in file-name order.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<LoadReport, SpecError> {
        let dir = dir.as_ref();
        let io_error = |e: std::io::Error| SpecError::Io {
            path: dir.display().to_string(),
            message: e.to_string(),
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if matches!(ext, "yaml" | "yml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut report = LoadReport::default();
        for path in paths {
            report.merge(self.load_file(&path));
        }
        Ok(report)
    }

    /// Insert a document, replacing any spec with the same kind and name.
    pub fn insert(&mut self, doc: SpecDocument) -> SpecKey {
        let key = doc.key();
        match doc {
            SpecDocument::Agent(agent) => {
                if self.agents.contains_key(agent.name()) {
                    tracing::warn!("[SpecRegistry] Replacing agent '{}'", agent.name());
                }
                self.agents.insert(agent.name().to_string(), agent);
            }
            SpecDocument::Workflow(workflow) => {
                let name = workflow.name().to_string();
                if self.workflows.insert(name.clone(), workflow).is_some() {
                    tracing::warn!("[SpecRegistry] Replacing workflow '{}'", name);
                } else {
                    self.workflow_order.push(name);
                }
            }
        }
        key
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    pub fn workflow(&self, name: &str) -> Option<&Workflow> {
        self.workflows.get(name)
    }

    pub fn agents(&self) -> &HashMap<String, Agent> {
        &self.agents
    }

    /// Workflows in load order.
    pub fn workflows(&self) -> impl Iterator<Item = &Workflow> {
        self.workflow_order
            .iter()
            .filter_map(|name| self.workflows.get(name))
    }

    /// The first workflow loaded, which is what the runner executes by default.
    pub fn first_workflow(&self) -> Option<&Workflow> {
        self.workflows().next()
    }

    pub fn contains(&self, key: &SpecKey) -> bool {
        match key.kind {
            Kind::Agent => self.agents.contains_key(&key.name),
            Kind::Workflow => self.workflows.contains_key(&key.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &str = r#"
apiVersion: maestro/v1alpha1
kind: Agent
metadata:
  name: a1
spec:
  model: m
  framework: beeai
  instructions: do a1
---
apiVersion: maestro/v1alpha1
kind: Workflow
metadata:
  name: second
spec:
  template:
    steps:
      - name: s
        agent: a1
---
apiVersion: maestro/v1alpha1
kind: Workflow
metadata:
  name: first
spec:
  template:
    steps:
      - name: s
        agent: a1
"#;

    #[test]
    fn test_load_str_keeps_order() {
        let mut registry = SpecRegistry::new();
        let report = registry.load_str(SPECS);
        assert!(report.is_clean());
        assert_eq!(report.loaded.len(), 3);
        assert!(registry.agent("a1").is_some());
        assert_eq!(registry.first_workflow().map(|w| w.name()), Some("second"));
        assert!(registry.contains(&SpecKey::new(Kind::Workflow, "first")));
    }

    #[test]
    fn test_reload_replaces() {
        let mut registry = SpecRegistry::new();
        registry.load_str(SPECS);
        let report = registry.load_str(&SPECS.replace("do a1", "do a1 better"));
        assert!(report.is_clean());
        assert_eq!(registry.agents().len(), 1);
        assert_eq!(registry.agent("a1").unwrap().spec.instructions, "do a1 better");
        assert_eq!(registry.workflows().count(), 2);
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("specs.yaml"), SPECS).unwrap();
        std::fs::write(dir.path().join("broken.yml"), "kind: [").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = SpecRegistry::new();
        let report = registry.load_dir(dir.path()).unwrap();
        assert_eq!(report.loaded.len(), 3);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let mut registry = SpecRegistry::new();
        let report = registry.load_file("/definitely/not/here.yaml");
        assert!(matches!(report.errors.as_slice(), [SpecError::Io { .. }]));
    }
}
