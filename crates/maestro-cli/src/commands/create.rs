//! `maestro create`: load agents and show which adapter each one binds to.
//!
//! Nothing is invoked. An unknown framework is reported but is not an error
//! here; it only fails when a step calls the agent.

use console::style;
use maestro_core::spec::AgentMode;
use maestro_core::{AdapterRegistry, SpecRegistry};

use super::{build_adapters, load_specs, BackendOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub agent: String,
    pub framework: String,
    pub mode: AgentMode,
    pub bound: bool,
}

/// Bindings for every loaded agent, sorted by name.
pub fn bindings(specs: &SpecRegistry, adapters: &AdapterRegistry) -> Vec<Binding> {
    let mut out: Vec<Binding> = specs
        .agents()
        .values()
        .map(|agent| Binding {
            agent: agent.name().to_string(),
            framework: agent.spec.framework.clone(),
            mode: agent.spec.mode,
            bound: adapters.is_bound(agent),
        })
        .collect();
    out.sort_by(|a, b| a.agent.cmp(&b.agent));
    out
}

pub async fn create(agents_file: &str, backend: &BackendOptions) -> Result<(), String> {
    let specs = load_specs(&[agents_file.to_string()])?;
    let adapters = build_adapters(backend);
    let bindings = bindings(&specs, &adapters);
    if bindings.is_empty() {
        return Err(format!("No agents found in '{}'", agents_file));
    }

    for b in &bindings {
        let mode = match b.mode {
            AgentMode::Local => "local",
            AgentMode::Remote => "remote",
        };
        if b.bound {
            println!(
                "{} {} ({}, {})",
                style("✓").green().bold(),
                b.agent,
                b.framework,
                mode
            );
        } else {
            println!(
                "{} {} ({}, {}): unknown framework",
                style("!").yellow().bold(),
                b.agent,
                b.framework,
                mode
            );
        }
    }
    Ok(())
}
