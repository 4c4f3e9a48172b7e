//! YAML schema types for `Agent` and `Workflow` resources.
//!
//! Both kinds share the same envelope:
//!
//! ```yaml
//! apiVersion: maestro/v1alpha1
//! kind: Agent
//! metadata:
//!   name: temperature
//!   labels:
//!     app: weather
//! spec:
//!   model: llama3.1
//!   framework: beeai
//!   mode: local
//!   description: Reports the current temperature for a city
//!   tools:
//!     - code_interpreter
//!   instructions: |
//!     You are a weather reporter...
//! ---
//! apiVersion: maestro/v1alpha1
//! kind: Workflow
//! metadata:
//!   name: activity planner
//! spec:
//!   template:
//!     agents:
//!       - temperature
//!       - hot-activities
//!     prompt: What should I do in New York today?
//!     steps:
//!       - name: fetch
//!         agent: temperature
//!       - name: hot_activities
//!         agent: hot-activities
//!         input:
//!           prompt: Suggest something fun.
//!           template: "{CONNECTOR} Weather: {fetch}"
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "maestro/v1alpha1";

/// Resource kinds understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Kind {
    Agent,
    Workflow,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Agent => "Agent",
            Kind::Workflow => "Workflow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Agent" => Some(Kind::Agent),
            "Workflow" => Some(Kind::Workflow),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a spec inside a registry or execution context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpecKey {
    pub kind: Kind,
    pub name: String,
}

impl SpecKey {
    pub fn new(kind: Kind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for SpecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,

    /// Routing and bookkeeping only; the engine never branches on labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// How an agent's backend is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    #[default]
    #[serde(alias = "default")]
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub api_version: String,
    pub kind: Kind,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: AgentSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AgentSpec {
    /// Backend model identifier
    #[serde(default)]
    pub model: String,

    /// Adapter selector; resolved lazily at invocation time
    #[serde(default)]
    pub framework: String,

    #[serde(default)]
    pub mode: AgentMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Capability names the backend may invoke, in declared order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// System prompt
    #[serde(default)]
    pub instructions: String,

    /// Backend endpoint for remote mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Agent {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub api_version: String,
    pub kind: Kind,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: WorkflowSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkflowSpec {
    #[serde(default)]
    pub template: WorkflowTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkflowTemplate {
    /// Documentary list of participating agents; does not drive execution
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,

    /// Natural-language intent, the initial running output of a run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Execution order
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.spec.template.steps
    }

    pub fn prompt(&self) -> Option<&str> {
        self.spec.template.prompt.as_deref()
    }
}

/// A single pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Step {
    #[serde(default)]
    pub name: String,

    /// Agent to invoke
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Workflow to execute as a nested run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,

    /// Without an input the step consumes the running output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<StepInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StepInput {
    /// Literal prompt, also bound to `{CONNECTOR}` in the template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Text with `{NAME}` placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// What a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTarget<'a> {
    Agent(&'a str),
    Workflow(&'a str),
}

impl Step {
    /// `None` when the step is malformed (validation reports why).
    pub fn target(&self) -> Option<StepTarget<'_>> {
        match (&self.agent, &self.workflow) {
            (Some(agent), None) => Some(StepTarget::Agent(agent)),
            (None, Some(workflow)) => Some(StepTarget::Workflow(workflow)),
            _ => None,
        }
    }

    pub fn literal_prompt(&self) -> Option<&str> {
        self.input.as_ref().and_then(|i| i.prompt.as_deref())
    }

    pub fn template(&self) -> Option<&str> {
        self.input.as_ref().and_then(|i| i.template.as_deref())
    }
}

impl fmt::Display for StepTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepTarget::Agent(name) => write!(f, "agent:{}", name),
            StepTarget::Workflow(name) => write!(f, "workflow:{}", name),
        }
    }
}

/// Either resource kind, as produced by the multi-document parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SpecDocument {
    Agent(Agent),
    Workflow(Workflow),
}

impl SpecDocument {
    pub fn kind(&self) -> Kind {
        match self {
            SpecDocument::Agent(_) => Kind::Agent,
            SpecDocument::Workflow(_) => Kind::Workflow,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SpecDocument::Agent(a) => a.name(),
            SpecDocument::Workflow(w) => w.name(),
        }
    }

    pub fn key(&self) -> SpecKey {
        SpecKey::new(self.kind(), self.name())
    }

    pub fn as_agent(&self) -> Option<&Agent> {
        match self {
            SpecDocument::Agent(a) => Some(a),
            SpecDocument::Workflow(_) => None,
        }
    }

    pub fn as_workflow(&self) -> Option<&Workflow> {
        match self {
            SpecDocument::Workflow(w) => Some(w),
            SpecDocument::Agent(_) => None,
        }
    }

    /// Serialize back to a single YAML document.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
