//! Dry-run adapter: answers every call locally without touching a backend.

use async_trait::async_trait;

use super::{AdapterRequest, AgentAdapter};
use crate::error::AdapterError;

/// Echoes the agent name and prompt back as the response.
#[derive(Debug, Default, Clone)]
pub struct DryRunAdapter;

impl DryRunAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AgentAdapter for DryRunAdapter {
    async fn invoke(&self, request: &AdapterRequest<'_>) -> Result<String, AdapterError> {
        Ok(format!("[dry-run] {} ({}): {}", request.agent, request.model, request.prompt))
    }
}
