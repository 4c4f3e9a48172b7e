//! `maestro meta-agents`: turn a free-text description into agent and
//! workflow specs by running a planner workflow over it.

use super::report_failures;
use super::run::{execute, RunOptions};

/// Run the planner workflow with the contents of `text_file` as its prompt.
/// Returns the synthesized documents rendered as one multi-document YAML.
pub async fn synthesize(text_file: &str, options: &RunOptions) -> Result<String, String> {
    let text = std::fs::read_to_string(text_file)
        .map_err(|e| format!("Failed to read '{}': {}", text_file, e))?;

    let options = RunOptions {
        prompt: Some(text),
        ask: false,
        ..options.clone()
    };
    let report = execute(&options).await?;
    report_failures(&report);

    if report.is_failed() {
        return Err(format!("Workflow '{}' failed", report.workflow));
    }
    if !report.artifact.is_spec() {
        return Err(format!(
            "Workflow '{}' did not synthesize any agent or workflow spec",
            report.workflow
        ));
    }

    let mut docs = Vec::with_capacity(report.synthesized.len());
    for doc in &report.synthesized {
        docs.push(doc.to_yaml().map_err(|e| e.to_string())?);
    }
    Ok(docs.join("---\n"))
}

pub async fn meta_agents(text_file: &str, options: RunOptions) -> Result<(), String> {
    let yaml = synthesize(text_file, &options).await?;
    println!("{}", yaml.trim_end());
    Ok(())
}
