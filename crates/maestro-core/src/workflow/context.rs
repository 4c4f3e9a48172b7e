//! Execution context: the state of exactly one workflow run.
//!
//! The step log is append-only and the synthesized-spec set is insert-only
//! (re-inserting a key overwrites it). A context is never shared between
//! runs; nested workflow runs get a fresh child context.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::StepError;
use crate::spec::{Agent, Kind, SpecDocument, SpecKey, Workflow};
use crate::template::placeholder_name;

/// Per-step state machine: `Pending -> Running -> {Succeeded, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Run state machine: `Pending -> Running -> {Completed, Failed, PartiallyCompleted}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    PartiallyCompleted,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "Pending",
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::PartiallyCompleted => "PartiallyCompleted",
            RunStatus::Failed => "Failed",
        }
    }
}

/// One finished step in the log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub name: String,
    /// `agent:<name>` or `workflow:<name>`
    pub target: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_error")]
    pub error: Option<StepError>,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

fn serialize_error<S: Serializer>(error: &Option<StepError>, s: S) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Failure<'a> {
        kind: &'a str,
        message: String,
    }
    error
        .as_ref()
        .map(|e| Failure {
            kind: e.kind(),
            message: e.to_string(),
        })
        .serialize(s)
}

impl StepRecord {
    pub fn succeeded(name: impl Into<String>, target: impl Into<String>, output: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            target: target.into(),
            status: StepStatus::Succeeded,
            output: Some(output.into()),
            error: None,
            attempts: 1,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn failed(name: impl Into<String>, target: impl Into<String>, error: StepError) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            target: target.into(),
            status: StepStatus::Failed,
            output: None,
            error: Some(error),
            attempts: 1,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn with_timing(mut self, started_at: DateTime<Utc>, attempts: u32) -> Self {
        self.started_at = started_at;
        self.finished_at = Utc::now();
        self.attempts = attempts;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    /// The text a later placeholder sees for this step. Failed steps yield an
    /// error marker so a join step can still run.
    pub fn visible_value(&self) -> String {
        match (&self.output, &self.error) {
            (Some(output), _) => output.clone(),
            (None, Some(error)) => format!(
                "[step '{}' failed: {}: {}]",
                self.name,
                error.kind(),
                error
            ),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    run_id: String,
    workflow: String,
    depth: usize,
    status: RunStatus,
    steps: Vec<StepRecord>,
    in_flight: HashSet<String>,
    variables: HashMap<String, String>,
    synthesized: BTreeMap<SpecKey, SpecDocument>,
    /// Synthesis order, latest last, without duplicates
    synthesis_order: Vec<SpecKey>,
    /// Workflows executed by a `workflow:` step of this run
    consumed: HashSet<String>,
    running_output: Option<String>,
}

impl ExecutionContext {
    pub fn new(workflow: impl Into<String>, depth: usize) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            workflow: workflow.into(),
            depth,
            status: RunStatus::Pending,
            steps: Vec::new(),
            in_flight: HashSet::new(),
            variables: HashMap::new(),
            synthesized: BTreeMap::new(),
            synthesis_order: Vec::new(),
            consumed: HashSet::new(),
            running_output: None,
        }
    }

    /// A fresh context for a nested run, one level deeper. Caller variables
    /// and a snapshot of synthesized specs carry over; the step log does not.
    pub fn child(&self, workflow: impl Into<String>) -> Self {
        let mut child = Self::new(workflow, self.depth + 1);
        child.variables = self.variables.clone();
        child.synthesized = self.synthesized.clone();
        child
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn extend_variables(&mut self, vars: &HashMap<String, String>) {
        self.variables
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Placeholder lookup: caller variables, then the step log by exact name,
    /// then by placeholder-safe name.
    pub fn lookup(&self, name: &str) -> Option<String> {
        if let Some(value) = self.variables.get(name) {
            return Some(value.clone());
        }
        self.steps
            .iter()
            .rev()
            .find(|r| r.name == name)
            .or_else(|| {
                self.steps
                    .iter()
                    .rev()
                    .find(|r| placeholder_name(&r.name) == name)
            })
            .map(StepRecord::visible_value)
    }

    pub fn mark_running(&mut self, step: &str) {
        self.in_flight.insert(step.to_string());
    }

    /// Append a finished step. Successful output becomes the running output.
    pub fn record(&mut self, record: StepRecord) {
        self.in_flight.remove(&record.name);
        if let Some(output) = &record.output {
            self.running_output = Some(output.clone());
        }
        self.steps.push(record);
    }

    pub fn step_status(&self, step: &str) -> StepStatus {
        if let Some(record) = self.steps.iter().rev().find(|r| r.name == step) {
            record.status
        } else if self.in_flight.contains(step) {
            StepStatus::Running
        } else {
            StepStatus::Pending
        }
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<StepRecord> {
        self.steps
    }

    pub fn running_output(&self) -> Option<&str> {
        self.running_output.as_deref()
    }

    pub fn set_running_output(&mut self, text: impl Into<String>) {
        self.running_output = Some(text.into());
    }

    /// Stage a synthesized spec. Returns the replaced spec, if any.
    pub fn insert_synthesized(&mut self, doc: SpecDocument) -> Option<SpecDocument> {
        let key = doc.key();
        self.synthesis_order.retain(|k| k != &key);
        self.synthesis_order.push(key.clone());
        self.synthesized.insert(key, doc)
    }

    pub fn synthesized_agent(&self, name: &str) -> Option<&Agent> {
        self.synthesized
            .get(&SpecKey::new(Kind::Agent, name))
            .and_then(SpecDocument::as_agent)
    }

    pub fn synthesized_workflow(&self, name: &str) -> Option<&Workflow> {
        self.synthesized
            .get(&SpecKey::new(Kind::Workflow, name))
            .and_then(SpecDocument::as_workflow)
    }

    pub fn synthesized(&self) -> impl Iterator<Item = &SpecDocument> {
        self.synthesis_order
            .iter()
            .filter_map(|key| self.synthesized.get(key))
    }

    pub fn mark_consumed(&mut self, workflow: &str) {
        self.consumed.insert(workflow.to_string());
    }

    /// Workflows run by a `workflow:` step of this run.
    pub fn consumed(&self) -> impl Iterator<Item = &str> {
        self.consumed.iter().map(String::as_str)
    }

    /// The latest synthesized workflow no step of this run executed, falling
    /// back to the latest synthesized agent.
    pub fn terminal_spec(&self) -> Option<&SpecDocument> {
        let latest_unconsumed = self.synthesis_order.iter().rev().find(|key| {
            key.kind == Kind::Workflow && !self.consumed.contains(&key.name)
        });
        let any_agent = self
            .synthesis_order
            .iter()
            .rev()
            .find(|key| key.kind == Kind::Agent);
        latest_unconsumed
            .or(any_agent)
            .and_then(|key| self.synthesized.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;

    fn workflow_doc(name: &str) -> SpecDocument {
        let yaml = format!(
            "apiVersion: maestro/v1alpha1\nkind: Workflow\nmetadata:\n  name: {}\nspec:\n  template:\n    steps:\n      - name: s\n        agent: a\n",
            name
        );
        crate::spec::parse_document(1, &yaml).unwrap()
    }

    #[test]
    fn test_step_lifecycle() {
        let mut ctx = ExecutionContext::new("wf", 0);
        assert_eq!(ctx.step_status("a"), StepStatus::Pending);
        ctx.mark_running("a");
        assert_eq!(ctx.step_status("a"), StepStatus::Running);
        ctx.record(StepRecord::succeeded("a", "agent:x", "out"));
        assert_eq!(ctx.step_status("a"), StepStatus::Succeeded);
        assert_eq!(ctx.running_output(), Some("out"));
    }

    #[test]
    fn test_failed_step_marker() {
        let mut ctx = ExecutionContext::new("wf", 0);
        ctx.record(StepRecord::succeeded("a", "agent:x", "first"));
        ctx.record(StepRecord::failed(
            "cold activities",
            "agent:cold",
            StepError::Adapter(AdapterError::fatal("backend down")),
        ));
        assert_eq!(ctx.running_output(), Some("first"));
        let marker = ctx.lookup("cold_activities").unwrap();
        assert_eq!(
            marker,
            "[step 'cold activities' failed: AdapterError: adapter error: backend down]"
        );
    }

    #[test]
    fn test_variables_shadow_steps() {
        let mut ctx = ExecutionContext::new("wf", 0);
        ctx.record(StepRecord::succeeded("city", "agent:x", "from step"));
        ctx.set_variable("city", "from config");
        assert_eq!(ctx.lookup("city").as_deref(), Some("from config"));
    }

    #[test]
    fn test_synthesized_overwrite_and_terminal_spec() {
        let mut ctx = ExecutionContext::new("wf", 0);
        assert!(ctx.insert_synthesized(workflow_doc("draft")).is_none());
        assert!(ctx.insert_synthesized(workflow_doc("other")).is_none());
        assert!(ctx.insert_synthesized(workflow_doc("draft")).is_some());
        assert_eq!(ctx.synthesized().count(), 2);
        assert_eq!(ctx.terminal_spec().map(|d| d.name()), Some("draft"));

        ctx.mark_consumed("draft");
        assert_eq!(ctx.terminal_spec().map(|d| d.name()), Some("other"));
    }

    #[test]
    fn test_child_context() {
        let mut ctx = ExecutionContext::new("parent", 2);
        ctx.set_variable("K", "v");
        ctx.insert_synthesized(workflow_doc("draft"));
        ctx.record(StepRecord::succeeded("a", "agent:x", "out"));

        let child = ctx.child("draft");
        assert_eq!(child.depth(), 3);
        assert_ne!(child.run_id(), ctx.run_id());
        assert_eq!(child.lookup("K").as_deref(), Some("v"));
        assert!(child.synthesized_workflow("draft").is_some());
        assert!(child.steps().is_empty());
        // inherited specs resolve but do not count as this run's synthesis
        assert_eq!(child.synthesized().count(), 0);
    }
}
