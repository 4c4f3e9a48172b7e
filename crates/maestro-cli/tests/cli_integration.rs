//! Integration tests for the maestro-cli commands.
//!
//! These tests exercise the same code paths as the binary against workflow
//! files written to a temporary directory, using the dry-run backend so no
//! agent service is needed.

use std::path::PathBuf;

use maestro_cli::commands::create::bindings;
use maestro_cli::commands::run::{execute, RunOptions};
use maestro_cli::commands::{self, build_adapters, load_specs, BackendOptions};
use maestro_core::spec::parse_documents;
use maestro_core::workflow::{FlowDirection, MermaidKind};
use maestro_core::{Artifact, RunStatus};
use tempfile::TempDir;

const AGENTS: &str = "apiVersion: maestro/v1alpha1
kind: Agent
metadata:
  name: weather agent
  labels:
    app: activity-planner
spec:
  model: llama3.1
  framework: beeai
  mode: local
  description: Reports the weather
  tools:
    - code_interpreter
  instructions: Report the current temperature for the city.
---
apiVersion: maestro/v1alpha1
kind: Agent
metadata:
  name: activity agent
spec:
  model: llama3.1
  framework: crewai
  instructions: Suggest activities.
";

const WORKFLOW: &str = r#"apiVersion: maestro/v1alpha1
kind: Workflow
metadata:
  name: activity planner
spec:
  template:
    agents:
      - weather agent
      - activity agent
    prompt: What should I do in {CITY}?
    steps:
      - name: weather
        agent: weather agent
        input:
          prompt: Weather report
          template: "{CONNECTOR} for {CITY}"
      - name: activities
        agent: activity agent
"#;

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path: PathBuf = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

fn dry_run_options(dir: &TempDir) -> RunOptions {
    RunOptions {
        workflow_file: write(dir, "workflow.yaml", WORKFLOW),
        agents_files: vec![write(dir, "agents.yaml", AGENTS)],
        vars: vec!["CITY=Lisbon".to_string()],
        backend: BackendOptions {
            dry_run: true,
            ..BackendOptions::default()
        },
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn test_run_dry_run_completes() {
    let dir = TempDir::new().unwrap();
    let report = execute(&dry_run_options(&dir)).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.steps.len(), 2);
    assert_eq!(
        report.output_of("weather"),
        Some("[dry-run] weather agent (llama3.1): Weather report for Lisbon")
    );
    match &report.artifact {
        Artifact::Text(text) => assert!(text.starts_with("[dry-run] activity agent")),
        other => panic!("expected text artifact, got {:?}", other),
    }
}

#[tokio::test]
async fn test_run_prompt_override() {
    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        prompt: Some("Plan a rainy day".to_string()),
        ..dry_run_options(&dir)
    };
    let report = execute(&options).await.unwrap();
    // the implicit-input step still sees the weather step's output, not the prompt
    assert!(report.output_of("activities").unwrap().contains("Weather report"));
    assert!(commands::run::run(options).await.is_ok());
}

#[tokio::test]
async fn test_run_unknown_workflow_name() {
    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        workflow: Some("missing".to_string()),
        ..dry_run_options(&dir)
    };
    let err = execute(&options).await.unwrap_err();
    assert_eq!(err, "Workflow 'missing' not found");
}

#[tokio::test]
async fn test_run_fails_on_unknown_framework() {
    let dir = TempDir::new().unwrap();
    let agents = AGENTS.replace("framework: crewai", "framework: nonexistent_fw");
    let base = dry_run_options(&dir);
    let options = RunOptions {
        agents_files: vec![write(&dir, "broken_agents.yaml", &agents)],
        ..base
    };

    let report = execute(&options).await.unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failures()[0].kind, "UnknownFrameworkError");

    let err = commands::run::run(options).await.unwrap_err();
    assert_eq!(err, "Workflow 'activity planner' failed");
}

#[tokio::test]
async fn test_run_missing_file() {
    let options = RunOptions {
        workflow_file: "/nonexistent/workflow.yaml".to_string(),
        ..RunOptions::default()
    };
    let err = execute(&options).await.unwrap_err();
    assert!(err.contains("No valid documents"));
}

#[tokio::test]
async fn test_validate() {
    let dir = TempDir::new().unwrap();
    let good = write(&dir, "good.yaml", AGENTS);
    assert!(commands::validate::validate(&[good.clone()]).await.is_ok());

    let broken = format!(
        "{}---\napiVersion: maestro/v1alpha1\nkind: Workflow\nmetadata:\n  name: empty\nspec:\n  template:\n    steps: []\n",
        AGENTS
    );
    let bad = write(&dir, "bad.yaml", &broken);
    let results = commands::validate::check_file(&bad);
    assert_eq!(results.len(), 3);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);

    let err = commands::validate::validate(&[good, bad]).await.unwrap_err();
    assert_eq!(err, "1 invalid document(s), 4 valid");
}

#[tokio::test]
async fn test_create_reports_bindings() {
    let dir = TempDir::new().unwrap();
    let agents = AGENTS.replace("framework: crewai", "framework: nonexistent_fw");
    let file = write(&dir, "agents.yaml", &agents);

    let specs = load_specs(&[file.clone()]).unwrap();
    let adapters = build_adapters(&BackendOptions {
        dry_run: true,
        ..BackendOptions::default()
    });
    let bindings = bindings(&specs, &adapters);
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].agent, "activity agent");
    assert!(!bindings[0].bound);
    assert!(bindings[1].bound);

    // unknown frameworks are not a load-time error
    assert!(commands::create::create(&file, &BackendOptions::default()).await.is_ok());
}

#[test]
fn test_mermaid_render() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "workflow.yaml", WORKFLOW);

    let sequence = commands::mermaid::render(&file, MermaidKind::SequenceDiagram).unwrap();
    assert!(sequence.starts_with("sequenceDiagram\n"));
    assert!(sequence.contains("weather_agent->>activity_agent: activities"));

    let flow = commands::mermaid::render(&file, MermaidKind::Flowchart(FlowDirection::TopDown))
        .unwrap();
    assert!(flow.starts_with("flowchart TD\n"));
    assert!(flow.contains("weather --> activities"));
}

#[tokio::test]
async fn test_meta_agents_requires_a_synthesized_spec() {
    let dir = TempDir::new().unwrap();
    let text = write(&dir, "request.txt", "I want a workflow that plans a beach day");
    let options = dry_run_options(&dir);

    // the dry-run backend only echoes, so no spec comes back
    let err = commands::meta_agents::synthesize(&text, &options)
        .await
        .unwrap_err();
    assert!(err.contains("did not synthesize"), "{}", err);
}

const PLANNER: &str = "apiVersion: maestro/v1alpha1
kind: Workflow
metadata:
  name: planner
spec:
  template:
    steps:
      - name: draft
        agent: weather agent
";

const BEACH_REQUEST: &str = "Draft the beach day workflow below.
```yaml
apiVersion: maestro/v1alpha1
kind: Agent
metadata:
  name: packing agent
spec:
  model: llama3.1
  framework: beeai
  instructions: List what to pack.
---
apiVersion: maestro/v1alpha1
kind: Workflow
metadata:
  name: beach day
spec:
  template:
    prompt: Plan a beach day
    steps:
      - name: pack
        agent: packing agent
```
";

#[tokio::test]
async fn test_meta_agents_prints_synthesized_documents() {
    let dir = TempDir::new().unwrap();
    let text = write(&dir, "request.txt", BEACH_REQUEST);
    let options = RunOptions {
        workflow_file: write(&dir, "planner.yaml", PLANNER),
        agents_files: vec![write(&dir, "agents.yaml", AGENTS)],
        backend: BackendOptions {
            dry_run: true,
            ..BackendOptions::default()
        },
        ..RunOptions::default()
    };

    // the dry-run echo carries the fenced YAML back as the step output
    let yaml = commands::meta_agents::synthesize(&text, &options).await.unwrap();
    assert_eq!(yaml.matches("\n---\n").count(), 1);

    let docs = parse_documents(&yaml)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let names: Vec<&str> = docs.iter().map(|doc| doc.name()).collect();
    assert_eq!(names, ["packing agent", "beach day"]);
}
