//! `maestro run`: execute a workflow and print its artifact.

use std::sync::Arc;

use console::style;
use maestro_core::{EngineConfig, Executor, RunReport, RunStatus};
use tokio_util::sync::CancellationToken;

use super::{build_adapters, load_specs, parse_vars, print_json, report_failures, BackendOptions};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub workflow_file: String,
    /// Extra files holding agent (or workflow) documents
    pub agents_files: Vec<String>,
    /// Workflow to run; defaults to the first one in `workflow_file`
    pub workflow: Option<String>,
    /// Replaces the workflow's `template.prompt`
    pub prompt: Option<String>,
    /// Ask for the prompt interactively
    pub ask: bool,
    /// `KEY=VALUE` placeholder bindings
    pub vars: Vec<String>,
    /// Print the whole run report as JSON
    pub json: bool,
    pub backend: BackendOptions,
    pub config: EngineConfig,
}

/// Load, execute and return the report without printing anything.
pub async fn execute(options: &RunOptions) -> Result<RunReport, String> {
    let mut files = options.agents_files.clone();
    files.push(options.workflow_file.clone());
    let specs = load_specs(&files)?;

    let workflow = match &options.workflow {
        Some(name) => specs
            .workflow(name)
            .ok_or_else(|| format!("Workflow '{}' not found", name))?,
        None => specs
            .first_workflow()
            .ok_or_else(|| format!("No workflow found in '{}'", options.workflow_file))?,
    }
    .clone();

    let prompt = if options.ask {
        Some(ask_prompt(workflow.prompt().map(str::to_string)).await?)
    } else {
        options.prompt.clone()
    };

    let config = parse_vars(&options.vars)?
        .into_iter()
        .fold(options.config.clone(), |config, (name, value)| {
            config.with_variable(name, value)
        });

    let token = CancellationToken::new();
    let ctrl_c = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("[maestro] Interrupted, cancelling run");
                token.cancel();
            }
        })
    };

    let executor = Executor::new(
        Arc::new(build_adapters(&options.backend)),
        Arc::new(specs),
        config,
    )
    .with_cancellation(token);

    tracing::info!("[maestro] Running workflow '{}'", workflow.name());
    let result = executor.run_with_prompt(&workflow, prompt.as_deref()).await;
    ctrl_c.abort();
    result.map_err(|e| e.to_string())
}

/// Run a workflow, print the artifact to stdout and fail on a `Failed` run.
pub async fn run(options: RunOptions) -> Result<(), String> {
    let report = execute(&options).await?;
    report_failures(&report);

    if options.json {
        let value = serde_json::to_value(&report).map_err(|e| e.to_string())?;
        print_json(&value);
    } else if !report.is_failed() {
        let text = report.artifact.render().map_err(|e| e.to_string())?;
        println!("{}", text.trim_end());
    }

    match report.status {
        RunStatus::Failed => Err(format!("Workflow '{}' failed", report.workflow)),
        RunStatus::PartiallyCompleted => {
            eprintln!(
                "{} workflow '{}' completed partially",
                style("warning:").yellow().bold(),
                report.workflow
            );
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Terminal input blocks, so it runs off the async worker threads.
async fn ask_prompt(current: Option<String>) -> Result<String, String> {
    tokio::task::spawn_blocking(move || {
        let input = dialoguer::Input::<String>::new().with_prompt("Prompt");
        let input = match current {
            Some(text) => input.with_initial_text(text),
            None => input,
        };
        input.interact_text().map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())?
}
