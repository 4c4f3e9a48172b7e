//! Mermaid rendering of a workflow, as a sequence diagram or a flowchart.

use std::fmt::Write as _;

use crate::spec::{Step, StepTarget, Workflow};
use crate::workflow::plan::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirection {
    TopDown,
    LeftRight,
}

impl FlowDirection {
    fn as_str(&self) -> &'static str {
        match self {
            FlowDirection::TopDown => "TD",
            FlowDirection::LeftRight => "LR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MermaidKind {
    SequenceDiagram,
    Flowchart(FlowDirection),
}

pub fn to_mermaid(workflow: &Workflow, kind: MermaidKind) -> String {
    match kind {
        MermaidKind::SequenceDiagram => sequence_diagram(workflow),
        MermaidKind::Flowchart(direction) => flowchart(workflow, direction),
    }
}

fn participant(step: &Step) -> String {
    match step.target() {
        Some(StepTarget::Agent(name)) => name.to_string(),
        Some(StepTarget::Workflow(name)) => format!("workflow {}", name),
        None => step.name.clone(),
    }
}

/// Mermaid ids cannot contain spaces or punctuation.
fn node_id(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn escape(label: &str) -> String {
    label.replace('"', "#quot;")
}

fn sequence_diagram(workflow: &Workflow) -> String {
    let mut participants: Vec<String> = workflow.spec.template.agents.clone();
    for step in workflow.steps() {
        let p = participant(step);
        if !participants.contains(&p) {
            participants.push(p);
        }
    }

    let mut out = String::from("sequenceDiagram\n");
    for p in &participants {
        let _ = writeln!(out, "participant {} as {}", node_id(p), p);
    }

    let mut previous: Option<String> = None;
    for step in workflow.steps() {
        let to = participant(step);
        let from = previous.as_deref().unwrap_or(to.as_str());
        let _ = writeln!(out, "{}->>{}: {}", node_id(from), node_id(&to), step.name);
        previous = Some(to);
    }
    out
}

/// Edges follow the planner's dependencies, so fan-out is visible.
fn flowchart(workflow: &Workflow, direction: FlowDirection) -> String {
    let steps = workflow.steps();
    let plan = Plan::build(workflow, |_| true);

    let mut out = format!("flowchart {}\n", direction.as_str());
    for step in steps {
        let _ = writeln!(
            out,
            "{}[\"{}<br/>{}\"]",
            node_id(&step.name),
            escape(&step.name),
            escape(&participant(step))
        );
    }
    for (i, step) in steps.iter().enumerate() {
        let deps = plan.dependencies(i).into_iter().flatten();
        for &dep in deps {
            let _ = writeln!(out, "{} --> {}", node_id(&steps[dep].name), node_id(&step.name));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::parse_workflow;

    const WORKFLOW: &str = r#"apiVersion: maestro/v1alpha1
kind: Workflow
metadata:
  name: activities
spec:
  template:
    agents:
      - temperature agent
    steps:
      - name: compare
        agent: temperature agent
      - name: hot
        agent: hot agent
        input:
          prompt: warm ideas
          template: "{CONNECTOR} {compare}"
      - name: cold
        agent: cold agent
        input:
          prompt: cold ideas
          template: "{CONNECTOR} {compare}"
      - name: join
        agent: summary agent
        input:
          template: "{hot} {cold}"
"#;

    #[test]
    fn test_sequence_diagram() {
        let workflow = parse_workflow(WORKFLOW).unwrap();
        let out = to_mermaid(&workflow, MermaidKind::SequenceDiagram);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "sequenceDiagram");
        assert_eq!(lines[1], "participant temperature_agent as temperature agent");
        assert_eq!(lines.len(), 1 + 4 + 4);
        assert!(out.contains("temperature_agent->>temperature_agent: compare\n"));
        assert!(out.contains("hot_agent->>cold_agent: cold\n"));
    }

    #[test]
    fn test_flowchart_shows_fan_out() {
        let workflow = parse_workflow(WORKFLOW).unwrap();
        let out = to_mermaid(&workflow, MermaidKind::Flowchart(FlowDirection::LeftRight));
        assert!(out.starts_with("flowchart LR\n"));
        assert!(out.contains("compare[\"compare<br/>temperature agent\"]"));
        assert!(out.contains("compare --> hot\n"));
        assert!(out.contains("compare --> cold\n"));
        assert!(out.contains("hot --> join\n"));
        assert!(out.contains("cold --> join\n"));
        assert!(!out.contains("hot --> cold"));
    }
}
