//! Maestro CLI: run, validate and visualize declarative agent workflows.
//!
//! Thin clap front end over `maestro_cli::commands`, which in turn drives the
//! maestro-core engine.

use clap::{Args, Parser, Subcommand};
use maestro_cli::commands;
use maestro_cli::commands::run::RunOptions;
use maestro_cli::commands::BackendOptions;
use maestro_core::workflow::{FlowDirection, MermaidKind};
use maestro_core::EngineConfig;

/// Maestro: declarative multi-agent workflows
#[derive(Parser)]
#[command(name = "maestro", version, about = "Maestro: declarative multi-agent workflows")]
pub struct Cli {
    /// Debug-level logging for the engine
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow and print its artifact
    Run {
        /// File holding the workflow (and optionally its agents)
        workflow_file: String,

        /// Additional agent definition files
        #[arg(long = "agents", value_name = "FILE")]
        agents: Vec<String>,

        /// Workflow to run when the file defines several
        #[arg(long)]
        workflow: Option<String>,

        /// Override the workflow prompt
        #[arg(long, conflicts_with = "ask")]
        prompt: Option<String>,

        /// Ask for the workflow prompt interactively
        #[arg(long)]
        ask: bool,

        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        backend: BackendArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Validate agent and workflow files
    Validate {
        /// Files to validate
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Load agents and show the adapter each one binds to
    Create {
        /// File holding agent definitions
        agents_file: String,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Render a workflow as a Mermaid diagram
    Mermaid {
        /// File holding the workflow
        workflow_file: String,

        /// Sequence diagram (default)
        #[arg(long, group = "diagram")]
        sequence: bool,

        /// Top-down flowchart
        #[arg(long, group = "diagram")]
        flowchart_td: bool,

        /// Left-right flowchart
        #[arg(long, group = "diagram")]
        flowchart_lr: bool,
    },

    /// Generate agent and workflow specs from a text description
    #[command(name = "meta-agents")]
    MetaAgents {
        /// Text file describing the desired workflow
        text_file: String,

        /// Planner workflow to run over the text
        #[arg(long)]
        workflow_file: String,

        /// Additional agent definition files
        #[arg(long = "agents", value_name = "FILE")]
        agents: Vec<String>,

        #[command(flatten)]
        backend: BackendArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct BackendArgs {
    /// Echo prompts locally instead of calling agent backends
    #[arg(long)]
    dry_run: bool,

    /// Endpoint for agents without a url (OpenAI-compatible)
    #[arg(long, env = "MAESTRO_BASE_URL", default_value = "http://localhost:11434/v1")]
    base_url: String,

    /// API key sent to agent backends
    #[arg(long, env = "MAESTRO_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

impl From<BackendArgs> for BackendOptions {
    fn from(args: BackendArgs) -> Self {
        Self {
            dry_run: args.dry_run,
            base_url: Some(args.base_url),
            api_key: args.api_key,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct EngineArgs {
    /// Maximum nesting of generated workflows
    #[arg(long, env = "MAESTRO_MAX_DEPTH", default_value_t = 5)]
    max_depth: usize,

    /// Per-step timeout in seconds
    #[arg(long, env = "MAESTRO_STEP_TIMEOUT_SECS", default_value_t = 300)]
    step_timeout_secs: u64,

    /// Retries for recoverable step failures
    #[arg(long, env = "MAESTRO_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Concurrent agent calls within a fan-out group
    #[arg(long, env = "MAESTRO_MAX_PARALLEL", default_value_t = 4)]
    max_parallel: usize,

    /// Template variable, repeatable
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,
}

impl EngineArgs {
    fn config(&self) -> EngineConfig {
        EngineConfig {
            max_depth: self.max_depth,
            step_timeout_secs: self.step_timeout_secs,
            max_retries: self.max_retries,
            max_parallel: self.max_parallel,
            ..EngineConfig::default()
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the artifact
    let default_filter = if cli.verbose {
        "maestro_core=debug,maestro_cli=debug"
    } else {
        "maestro_core=warn,maestro_cli=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let result = match cli.command {
        Commands::Run {
            workflow_file,
            agents,
            workflow,
            prompt,
            ask,
            json,
            backend,
            engine,
        } => {
            commands::run::run(RunOptions {
                workflow_file,
                agents_files: agents,
                workflow,
                prompt,
                ask,
                vars: engine.vars.clone(),
                json,
                backend: backend.into(),
                config: engine.config(),
            })
            .await
        }

        Commands::Validate { files } => commands::validate::validate(&files).await,

        Commands::Create {
            agents_file,
            backend,
        } => commands::create::create(&agents_file, &backend.into()).await,

        Commands::Mermaid {
            workflow_file,
            sequence: _,
            flowchart_td,
            flowchart_lr,
        } => {
            let kind = if flowchart_td {
                MermaidKind::Flowchart(FlowDirection::TopDown)
            } else if flowchart_lr {
                MermaidKind::Flowchart(FlowDirection::LeftRight)
            } else {
                MermaidKind::SequenceDiagram
            };
            commands::mermaid::mermaid(&workflow_file, kind).await
        }

        Commands::MetaAgents {
            text_file,
            workflow_file,
            agents,
            backend,
            engine,
        } => {
            let options = RunOptions {
                workflow_file,
                agents_files: agents,
                vars: engine.vars.clone(),
                backend: backend.into(),
                config: engine.config(),
                ..RunOptions::default()
            };
            commands::meta_agents::meta_agents(&text_file, options).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
