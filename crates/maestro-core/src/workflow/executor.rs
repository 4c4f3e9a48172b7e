//! Step executor: runs a workflow's steps against the adapter registry.
//!
//! The executor:
//! 1. Plans the steps into groups (see `plan`)
//! 2. Resolves every input of a group against the context before dispatch
//! 3. Dispatches the group's agent calls concurrently, bounded by `max_parallel`
//! 4. Appends the outcomes to the context in declared order
//! 5. Stages any output that parses as a spec (see `synthesizer`)
//! 6. Runs `workflow:` steps as nested runs with a child context
//!
//! Nesting is bounded by `max_depth`. Hitting the bound ends the whole run
//! with `EngineError::RecursionLimitExceeded`, whatever depth raised it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::adapter::{AdapterRegistry, InvocationContext, InvocationResult};
use crate::config::EngineConfig;
use crate::error::{AdapterError, EngineError, StepError};
use crate::spec::{Agent, SpecDocument, SpecRegistry, Step, StepTarget, Workflow};
use crate::template;
use crate::workflow::context::{ExecutionContext, RunStatus, StepRecord};
use crate::workflow::plan::Plan;
use crate::workflow::synthesizer;

/// What a run leaves behind for the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Artifact {
    /// A synthesized spec nothing in the run executed
    Spec(SpecDocument),
    /// Output of the last successful step
    Text(String),
    None,
}

impl Artifact {
    /// Render for stdout: YAML for specs, raw text otherwise.
    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        match self {
            Artifact::Spec(doc) => doc.to_yaml(),
            Artifact::Text(text) => Ok(text.clone()),
            Artifact::None => Ok(String::new()),
        }
    }

    pub fn is_spec(&self) -> bool {
        matches!(self, Artifact::Spec(_))
    }
}

/// Result of executing one workflow run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub workflow: String,
    pub status: RunStatus,
    pub steps: Vec<StepRecord>,
    pub artifact: Artifact,
    pub synthesized: Vec<SpecDocument>,
}

/// One failed step as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure<'a> {
    pub step: &'a str,
    pub kind: &'static str,
    pub message: String,
}

impl RunReport {
    fn from_context(ctx: ExecutionContext) -> Self {
        let artifact = artifact_of(&ctx);
        let synthesized = ctx.synthesized().cloned().collect();
        Self {
            run_id: ctx.run_id().to_string(),
            workflow: ctx.workflow().to_string(),
            status: ctx.status(),
            artifact,
            synthesized,
            steps: ctx.into_steps(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    pub fn failures(&self) -> Vec<Failure<'_>> {
        self.steps
            .iter()
            .filter_map(|record| {
                record.error.as_ref().map(|error| Failure {
                    step: &record.name,
                    kind: error.kind(),
                    message: error.to_string(),
                })
            })
            .collect()
    }

    pub fn output_of(&self, step: &str) -> Option<&str> {
        self.steps
            .iter()
            .rev()
            .find(|r| r.name == step)
            .and_then(|r| r.output.as_deref())
    }
}

fn artifact_of(ctx: &ExecutionContext) -> Artifact {
    if let Some(spec) = ctx.terminal_spec() {
        return Artifact::Spec(spec.clone());
    }
    ctx.steps()
        .iter()
        .rev()
        .find(|r| r.is_success())
        .and_then(|r| r.output.clone())
        .map_or(Artifact::None, Artifact::Text)
}

/// A step ready to run: its input is resolved and its target looked up.
enum Prepared {
    Agent { agent: Agent, prompt: String },
    Workflow { workflow: Workflow, prompt: Option<String> },
}

/// Outcome of one step before it is appended to the log.
struct Outcome {
    result: Result<InvocationResult, StepError>,
    attempts: u32,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    fn from_config(config: &EngineConfig) -> Self {
        Self {
            timeout: config.step_timeout(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// The workflow executor engine.
pub struct Executor {
    adapters: Arc<AdapterRegistry>,
    specs: Arc<SpecRegistry>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(adapters: Arc<AdapterRegistry>, specs: Arc<SpecRegistry>, config: EngineConfig) -> Self {
        Self {
            adapters,
            specs,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight invocations when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn run(&self, workflow: &Workflow) -> Result<RunReport, EngineError> {
        self.run_with_prompt(workflow, None).await
    }

    /// Execute `workflow`, replacing its `template.prompt` when `prompt` is given.
    pub async fn run_with_prompt(
        &self,
        workflow: &Workflow,
        prompt: Option<&str>,
    ) -> Result<RunReport, EngineError> {
        let mut workflow = workflow.clone();
        if let Some(prompt) = prompt {
            workflow.spec.template.prompt = Some(prompt.to_string());
        }

        let mut ctx = ExecutionContext::new(workflow.name(), 0);
        ctx.extend_variables(&self.config.variables);
        let ctx = self.run_at_depth(workflow, ctx).await?;

        let report = RunReport::from_context(ctx);
        tracing::info!(
            "[Executor] Workflow '{}' finished: {} ({} steps)",
            report.workflow,
            report.status.as_str(),
            report.steps.len()
        );
        Ok(report)
    }

    fn run_at_depth(
        &self,
        workflow: Workflow,
        mut ctx: ExecutionContext,
    ) -> BoxFuture<'_, Result<ExecutionContext, EngineError>> {
        Box::pin(async move {
            if ctx.depth() >= self.config.max_depth {
                tracing::warn!(
                    "[Executor] Refusing to run '{}' at depth {} (limit {})",
                    workflow.name(),
                    ctx.depth(),
                    self.config.max_depth
                );
                return Err(EngineError::RecursionLimitExceeded {
                    depth: ctx.depth(),
                    limit: self.config.max_depth,
                });
            }

            let plan = Plan::build(&workflow, |agent| self.specs.agent(agent).is_some());
            tracing::info!(
                "[Executor] Running workflow '{}' (run {}, depth {}, {} steps in {} groups)",
                workflow.name(),
                ctx.run_id(),
                ctx.depth(),
                workflow.steps().len(),
                plan.groups().len()
            );

            ctx.set_status(RunStatus::Running);
            if let Some(prompt) = workflow.prompt() {
                ctx.set_running_output(prompt);
            }

            let mut failed_steps: HashSet<usize> = HashSet::new();
            for group in plan.groups() {
                if self.cancel.is_cancelled() {
                    tracing::warn!("[Executor] Run {} cancelled", ctx.run_id());
                    ctx.set_status(RunStatus::Failed);
                    return Ok(ctx);
                }

                // A chained step cannot run on a failed predecessor's output.
                let blocked: Vec<(usize, usize)> = group
                    .iter()
                    .filter_map(|&index| {
                        plan.implicit_input(index)
                            .filter(|upstream| failed_steps.contains(upstream))
                            .map(|upstream| (index, upstream))
                    })
                    .collect();
                if !blocked.is_empty() {
                    for (index, upstream) in blocked {
                        let step = &workflow.steps()[index];
                        let upstream = workflow.steps()[upstream].name.clone();
                        tracing::warn!(
                            "[Executor] Step '{}' not dispatched: input step '{}' failed",
                            step.name,
                            upstream
                        );
                        let target = step.target().map(|t| t.to_string()).unwrap_or_default();
                        let record = StepRecord::failed(&step.name, target, StepError::UpstreamFailed(upstream));
                        ctx.record(record.with_timing(Utc::now(), 0));
                    }
                    ctx.set_status(RunStatus::Failed);
                    return Ok(ctx);
                }

                let failed = self.run_group(&workflow, group, &mut ctx).await?;
                if failed.is_empty() {
                    continue;
                }

                let cancelled = failed.iter().any(|(_, e)| *e == StepError::Cancelled);
                if cancelled || group.len() == 1 || failed.len() == group.len() {
                    ctx.set_status(RunStatus::Failed);
                    return Ok(ctx);
                }
                failed_steps.extend(failed.iter().map(|(index, _)| *index));
                tracing::warn!(
                    "[Executor] {} of {} branches failed; continuing with partial results",
                    failed.len(),
                    group.len()
                );
                // Later steps, including the join, see the partial state.
                ctx.set_status(RunStatus::PartiallyCompleted);
            }

            if ctx.status() == RunStatus::Running {
                ctx.set_status(RunStatus::Completed);
            }
            Ok(ctx)
        })
    }

    /// Run one group and append its records. Returns the failed step
    /// indices with their errors.
    async fn run_group(
        &self,
        workflow: &Workflow,
        group: &[usize],
        ctx: &mut ExecutionContext,
    ) -> Result<Vec<(usize, StepError)>, EngineError> {
        let steps = workflow.steps();
        let mut outcomes: Vec<Option<Outcome>> = group.iter().map(|_| None).collect();
        // Agent and prompt each dispatched step ran with
        let mut dispatched: Vec<Option<(Agent, String)>> = group.iter().map(|_| None).collect();
        let mut prepared: Vec<(usize, Prepared)> = Vec::new();

        for (slot, &index) in group.iter().enumerate() {
            let step = &steps[index];
            match self.prepare(step, ctx) {
                Ok(p) => {
                    ctx.mark_running(&step.name);
                    prepared.push((slot, p));
                }
                Err(error) => {
                    tracing::warn!("[Executor] Step '{}' not dispatched: {}", step.name, error);
                    outcomes[slot] = Some(Outcome {
                        result: Err(error),
                        attempts: 0,
                        started_at: Utc::now(),
                    });
                }
            }
        }

        let policy = RetryPolicy::from_config(&self.config);
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        let mut tasks = JoinSet::new();
        let mut nested = Vec::new();

        for (slot, p) in prepared {
            match p {
                Prepared::Agent { agent, prompt } => {
                    let step_name = steps[group[slot]].name.clone();
                    tracing::info!("[Executor] Step '{}' -> agent '{}'", step_name, agent.name());
                    tracing::debug!("[Executor] Step '{}' prompt: {}", step_name, prompt);

                    dispatched[slot] = Some((agent.clone(), prompt.clone()));
                    let adapters = self.adapters.clone();
                    let semaphore = semaphore.clone();
                    let cancel = self.cancel.clone();
                    let run_id = ctx.run_id().to_string();
                    tasks.spawn(async move {
                        let _permit = semaphore.acquire_owned().await.ok();
                        let started_at = Utc::now();
                        let (result, attempts) = invoke_with_retry(
                            &adapters, &agent, &prompt, &run_id, &step_name, policy, &cancel,
                        )
                        .await;
                        (
                            slot,
                            Outcome {
                                result,
                                attempts,
                                started_at,
                            },
                        )
                    });
                }
                Prepared::Workflow { workflow, prompt } => nested.push((slot, workflow, prompt)),
            }
        }

        // Nested runs execute here while the spawned agent calls proceed.
        for (slot, child_workflow, prompt) in nested {
            let started_at = Utc::now();
            let result = match self.run_nested(child_workflow, prompt, ctx).await {
                Ok(result) => result,
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            };
            outcomes[slot] = Some(Outcome {
                result,
                attempts: 1,
                started_at,
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, outcome)) => outcomes[slot] = Some(outcome),
                Err(e) => tracing::error!("[Executor] Step task failed to complete: {}", e),
            }
        }

        let mut failed = Vec::new();
        for (slot, outcome) in outcomes.into_iter().enumerate() {
            let step = &steps[group[slot]];
            let target = step
                .target()
                .map(|t| t.to_string())
                .unwrap_or_default();
            let mut outcome = outcome.unwrap_or_else(|| Outcome {
                result: Err(StepError::Adapter(AdapterError::fatal("step task aborted"))),
                attempts: 0,
                started_at: Utc::now(),
            });

            // An earlier step of this group may have redefined the agent.
            if let Some((agent, prompt)) = dispatched[slot].take() {
                let redefined = ctx
                    .synthesized_agent(agent.name())
                    .filter(|current| **current != agent)
                    .cloned();
                if let Some(current) = redefined {
                    tracing::info!(
                        "[Executor] Step '{}' re-dispatched: agent '{}' was redefined in its group",
                        step.name,
                        current.name()
                    );
                    let (result, attempts) = invoke_with_retry(
                        &self.adapters,
                        &current,
                        &prompt,
                        ctx.run_id(),
                        &step.name,
                        policy,
                        &self.cancel,
                    )
                    .await;
                    outcome.result = result;
                    outcome.attempts += attempts;
                }
            }

            let record = match outcome.result {
                Ok(invocation) => {
                    if let Some(docs) = invocation.candidate {
                        synthesizer::stage(ctx, docs, &self.specs);
                    }
                    StepRecord::succeeded(&step.name, target, invocation.text)
                }
                Err(error) => {
                    tracing::warn!(
                        "[Executor] Step '{}' failed: {}: {}",
                        step.name,
                        error.kind(),
                        error
                    );
                    failed.push((group[slot], error.clone()));
                    StepRecord::failed(&step.name, target, error)
                }
            };
            ctx.record(record.with_timing(outcome.started_at, outcome.attempts));
        }

        Ok(failed)
    }

    /// Resolve a step's input and target against the current context.
    /// Synthesized specs take precedence over statically loaded ones.
    fn prepare(&self, step: &Step, ctx: &ExecutionContext) -> Result<Prepared, StepError> {
        match step.target() {
            Some(StepTarget::Agent(name)) => {
                let agent = ctx
                    .synthesized_agent(name)
                    .or_else(|| self.specs.agent(name))
                    .cloned()
                    .ok_or_else(|| StepError::UnknownAgentReference(name.to_string()))?;
                let prompt = step_input(step, ctx)?;
                Ok(Prepared::Agent { agent, prompt })
            }
            Some(StepTarget::Workflow(name)) => {
                let workflow = ctx
                    .synthesized_workflow(name)
                    .or_else(|| self.specs.workflow(name))
                    .cloned()
                    .ok_or_else(|| StepError::UnknownWorkflowReference(name.to_string()))?;
                // Without its own input a nested run keeps the workflow's prompt.
                let prompt = if step.input.is_some() {
                    Some(step_input(step, ctx)?)
                } else if workflow.prompt().is_none() {
                    ctx.running_output().map(str::to_string)
                } else {
                    None
                };
                Ok(Prepared::Workflow { workflow, prompt })
            }
            None => Err(StepError::UnknownAgentReference(step.name.clone())),
        }
    }

    /// Execute a workflow as a step, in a child context one level deeper.
    async fn run_nested(
        &self,
        mut workflow: Workflow,
        prompt: Option<String>,
        ctx: &mut ExecutionContext,
    ) -> Result<Result<InvocationResult, StepError>, EngineError> {
        let name = workflow.name().to_string();
        if let Some(prompt) = prompt {
            workflow.spec.template.prompt = Some(prompt);
        }
        ctx.mark_consumed(&name);

        let child = ctx.child(name.as_str());
        let child = self.run_at_depth(workflow, child).await?;

        // Specs staged by the child stay visible to this run.
        let staged: Vec<SpecDocument> = child.synthesized().cloned().collect();
        for consumed in child.consumed() {
            ctx.mark_consumed(consumed);
        }
        if !staged.is_empty() {
            synthesizer::stage(ctx, staged, &self.specs);
        }
        let report = RunReport::from_context(child);

        if report.is_failed() {
            let message = report
                .failures()
                .first()
                .map(|f| format!("step '{}': {}: {}", f.step, f.kind, f.message))
                .unwrap_or_else(|| "run failed".to_string());
            return Ok(Err(StepError::Nested {
                workflow: name,
                message,
            }));
        }

        match report.artifact.render() {
            Ok(text) => Ok(Ok(InvocationResult {
                text,
                candidate: None,
            })),
            Err(e) => Ok(Err(StepError::Nested {
                workflow: name,
                message: e.to_string(),
            })),
        }
    }
}

/// The text a step sends to its agent.
///
/// A template is resolved with the literal prompt bound to `{CONNECTOR}`; a
/// literal prompt alone is used as is; otherwise the step consumes the
/// running output.
pub fn step_input(step: &Step, ctx: &ExecutionContext) -> Result<String, StepError> {
    match (step.template(), step.literal_prompt()) {
        (Some(tpl), connector) => template::resolve(tpl, connector, ctx),
        (None, Some(prompt)) => Ok(prompt.to_string()),
        (None, None) => Ok(ctx.running_output().unwrap_or_default().to_string()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn invoke_with_retry(
    adapters: &AdapterRegistry,
    agent: &Agent,
    prompt: &str,
    run_id: &str,
    step: &str,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> (Result<InvocationResult, StepError>, u32) {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let call = adapters.invoke(
            agent,
            prompt,
            InvocationContext {
                run_id,
                step,
                attempt,
            },
        );
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StepError::Cancelled),
            r = tokio::time::timeout(policy.timeout, call) => {
                r.unwrap_or_else(|_| Err(StepError::Timeout(policy.timeout)))
            }
        };

        match result {
            Err(e) if e.is_recoverable() && attempt <= policy.max_retries => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    "[Executor] Step '{}' attempt {} failed ({}); retrying in {:?}",
                    step,
                    attempt,
                    e,
                    delay
                );
                tokio::select! {
                    _ = cancel.cancelled() => return (Err(StepError::Cancelled), attempt),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            other => return (other, attempt),
        }
    }
}
