//! Agent adapter registry: maps an agent's `framework` (and `mode`) to the
//! adapter that knows how to call its backend.
//!
//! ```text
//! Agent{framework, mode, url} ──► AdapterRegistry::resolve ──► dyn AgentAdapter
//!                                                                  │
//!                                               HttpChatAdapter / DryRunAdapter / ...
//! ```
//!
//! Binding is lazy: an agent naming an unregistered framework loads fine and
//! only fails with `UnknownFramework` when a step invokes it.

pub mod dry_run;
pub mod http;

pub use dry_run::DryRunAdapter;
pub use http::{ChatDialect, HttpChatAdapter};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{AdapterError, StepError};
use crate::spec::{Agent, AgentMode, SpecDocument};
use crate::workflow::synthesizer;

/// Everything an adapter needs for one call.
#[derive(Debug, Clone, Copy)]
pub struct AdapterRequest<'a> {
    pub agent: &'a str,
    pub instructions: &'a str,
    pub prompt: &'a str,
    pub tools: &'a [String],
    pub model: &'a str,
    pub endpoint: Option<&'a str>,
}

impl<'a> AdapterRequest<'a> {
    pub fn new(agent: &'a Agent, prompt: &'a str) -> Self {
        Self {
            agent: agent.name(),
            instructions: &agent.spec.instructions,
            prompt,
            tools: &agent.spec.tools,
            model: &agent.spec.model,
            endpoint: agent.spec.url.as_deref(),
        }
    }
}

/// A backend invocation strategy.
///
/// Adapters own no state the engine depends on between calls. Any retrying
/// against the backend happens inside `invoke`; the engine only sees the
/// final text or the final error.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    async fn invoke(&self, request: &AdapterRequest<'_>) -> Result<String, AdapterError>;
}

/// Builds an adapter at call time.
pub type AdapterFactory = Arc<dyn Fn() -> Arc<dyn AgentAdapter> + Send + Sync>;

/// Normalized output of one invocation.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub text: String,
    /// Present when the text is itself one or more valid spec documents
    pub candidate: Option<Vec<SpecDocument>>,
}

impl InvocationResult {
    pub fn from_text(text: String) -> Self {
        let candidate = synthesizer::detect(&text);
        Self { text, candidate }
    }
}

/// Identifies the call site for logging.
#[derive(Debug, Clone, Copy)]
pub struct InvocationContext<'a> {
    pub run_id: &'a str,
    pub step: &'a str,
    pub attempt: u32,
}

/// Process-wide, read-mostly table of adapter factories.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: RwLock<HashMap<String, AdapterFactory>>,
    remote_factories: RwLock<HashMap<String, AdapterFactory>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the adapter used for `framework` in every mode.
    pub fn register<F>(&self, framework: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn AgentAdapter> + Send + Sync + 'static,
    {
        let framework = framework.into();
        tracing::info!("[AdapterRegistry] Registered framework '{}'", framework);
        self.factories
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(framework, Arc::new(factory));
    }

    /// Register the adapter used for `framework` when an agent runs in
    /// `remote` mode. Falls back to the framework-wide adapter when absent.
    pub fn register_remote<F>(&self, framework: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn AgentAdapter> + Send + Sync + 'static,
    {
        let framework = framework.into();
        tracing::info!("[AdapterRegistry] Registered remote framework '{}'", framework);
        self.remote_factories
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(framework, Arc::new(factory));
    }

    /// Share one adapter instance for every call.
    pub fn register_shared(&self, framework: impl Into<String>, adapter: Arc<dyn AgentAdapter>) {
        self.register(framework, move || adapter.clone());
    }

    /// Registered framework names, sorted.
    pub fn frameworks(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn is_bound(&self, agent: &Agent) -> bool {
        self.resolve(agent).is_ok()
    }

    /// Pick the adapter for an agent.
    pub fn resolve(&self, agent: &Agent) -> Result<Arc<dyn AgentAdapter>, StepError> {
        let framework = agent.spec.framework.as_str();
        if agent.spec.mode == AgentMode::Remote {
            let remote = self
                .remote_factories
                .read()
                .unwrap_or_else(|e| e.into_inner());
            if let Some(factory) = remote.get(framework) {
                return Ok(factory());
            }
        }
        self.factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(framework)
            .map(|factory| factory())
            .ok_or_else(|| StepError::UnknownFramework(framework.to_string()))
    }

    /// Invoke an agent once and normalize the result.
    pub async fn invoke(
        &self,
        agent: &Agent,
        prompt: &str,
        ctx: InvocationContext<'_>,
    ) -> Result<InvocationResult, StepError> {
        let adapter = self.resolve(agent)?;
        tracing::debug!(
            "[AdapterRegistry] run={} step={} attempt={} -> {} ({}, {} prompt chars)",
            ctx.run_id,
            ctx.step,
            ctx.attempt,
            agent.name(),
            agent.spec.framework,
            prompt.len()
        );
        let text = adapter.invoke(&AdapterRequest::new(agent, prompt)).await?;
        Ok(InvocationResult::from_text(text))
    }
}
