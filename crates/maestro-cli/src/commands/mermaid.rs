//! `maestro mermaid`: render a workflow as a Mermaid diagram.

use maestro_core::workflow::{to_mermaid, MermaidKind};

use super::load_specs;

/// Diagram for the first workflow in `workflow_file`.
pub fn render(workflow_file: &str, kind: MermaidKind) -> Result<String, String> {
    let specs = load_specs(&[workflow_file.to_string()])?;
    let workflow = specs
        .first_workflow()
        .ok_or_else(|| format!("No workflow found in '{}'", workflow_file))?;
    Ok(to_mermaid(workflow, kind))
}

pub async fn mermaid(workflow_file: &str, kind: MermaidKind) -> Result<(), String> {
    let diagram = render(workflow_file, kind)?;
    println!("{}", diagram.trim_end());
    Ok(())
}
