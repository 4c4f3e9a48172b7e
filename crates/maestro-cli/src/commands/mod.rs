//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level `maestro` command and reuses
//! the maestro-core engine directly.

pub mod create;
pub mod mermaid;
pub mod meta_agents;
pub mod run;
pub mod validate;

use std::collections::HashMap;
use std::sync::Arc;

use console::style;
use maestro_core::adapter::{ChatDialect, DryRunAdapter, HttpChatAdapter};
use maestro_core::{AdapterRegistry, RunReport, SpecRegistry};

/// Frameworks with a built-in adapter, and the wire dialect each one speaks.
pub const BUILTIN_FRAMEWORKS: &[(&str, ChatDialect)] = &[
    ("beeai", ChatDialect::OpenAi),
    ("crewai", ChatDialect::OpenAi),
    ("openai", ChatDialect::OpenAi),
    ("remote", ChatDialect::OpenAi),
    ("anthropic", ChatDialect::Anthropic),
];

/// How agent backends are reached.
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// Answer every call with `DryRunAdapter` instead of calling a backend
    pub dry_run: bool,
    /// Endpoint for agents without a `url`
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Register an adapter for every built-in framework.
pub fn build_adapters(options: &BackendOptions) -> AdapterRegistry {
    let registry = AdapterRegistry::new();
    for &(framework, dialect) in BUILTIN_FRAMEWORKS {
        if options.dry_run {
            registry.register_shared(framework, Arc::new(DryRunAdapter::new()));
            continue;
        }

        let mut adapter = HttpChatAdapter::new(dialect);
        if let Some(url) = &options.base_url {
            adapter = adapter.with_base_url(url.clone());
        }
        if let Some(key) = &options.api_key {
            adapter = adapter.with_api_key(key.clone());
        }
        registry.register_shared(framework, Arc::new(adapter));
    }
    registry
}

/// Load every file into one registry.
///
/// Broken documents are reported on stderr and skipped; a file that yields
/// no valid document at all is an error.
pub fn load_specs(files: &[String]) -> Result<SpecRegistry, String> {
    let mut specs = SpecRegistry::new();
    for file in files {
        let report = specs.load_file(file);
        for error in &report.errors {
            eprintln!("{} {}: {}", style("warning:").yellow().bold(), file, error);
        }
        if report.loaded.is_empty() {
            return Err(format!("No valid documents in '{}'", file));
        }
        tracing::debug!("[maestro] Loaded {} document(s) from {}", report.loaded.len(), file);
    }
    Ok(specs)
}

/// Parse repeated `KEY=VALUE` arguments.
pub fn parse_vars(vars: &[String]) -> Result<HashMap<String, String>, String> {
    vars.iter()
        .map(|var| {
            let (key, value) = var
                .split_once('=')
                .ok_or_else(|| format!("Invalid variable '{}', expected KEY=VALUE", var))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("Invalid variable '{}', empty key", var));
            }
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Print each failed step to stderr.
pub fn report_failures(report: &RunReport) {
    for failure in report.failures() {
        eprintln!(
            "{} step '{}' failed: {}: {}",
            style("✗").red().bold(),
            failure.step,
            failure.kind,
            failure.message
        );
    }
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars() {
        let vars = parse_vars(&["CITY=New York".into(), "EXPR=a=b".into()]).unwrap();
        assert_eq!(vars.get("CITY").map(String::as_str), Some("New York"));
        assert_eq!(vars.get("EXPR").map(String::as_str), Some("a=b"));

        assert!(parse_vars(&["novalue".into()]).is_err());
        assert!(parse_vars(&["=x".into()]).is_err());
    }

    #[test]
    fn test_build_adapters_registers_builtins() {
        let registry = build_adapters(&BackendOptions {
            dry_run: true,
            ..BackendOptions::default()
        });
        assert_eq!(
            registry.frameworks(),
            vec!["anthropic", "beeai", "crewai", "openai", "remote"]
        );
    }
}
