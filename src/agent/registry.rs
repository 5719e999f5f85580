//! Agent registry - lookup of agent definitions by id.
//!
//! The orchestrator only needs `lookup`; registration lives on the concrete
//! in-memory registry. Registration is expected to finish before runs start:
//! a run resolves each step's agent at the moment that step begins.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::definition::AgentDefinition;
use crate::types::{AgentId, Error, Result};

/// Lookup seam consumed by the pipeline orchestrator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    async fn lookup(&self, agent_id: &AgentId) -> Option<Arc<AgentDefinition>>;
}

/// Process-wide registry backed by a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct InMemoryAgentRegistry {
    agents: RwLock<HashMap<AgentId, Arc<AgentDefinition>>>,
}

impl InMemoryAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, overriding any existing one with the same id.
    /// Returns the replaced definition.
    pub async fn register(
        &self,
        definition: AgentDefinition,
    ) -> Result<Option<Arc<AgentDefinition>>> {
        if definition.id.is_empty() {
            return Err(Error::validation("agent id cannot be empty"));
        }

        let id = definition.id.clone();
        let previous = self
            .agents
            .write()
            .await
            .insert(id.clone(), Arc::new(definition));

        if previous.is_some() {
            tracing::info!(agent_id = %id, "agent definition overridden");
        } else {
            tracing::debug!(agent_id = %id, "agent registered");
        }
        Ok(previous)
    }

    pub async fn unregister(&self, agent_id: &AgentId) -> Option<Arc<AgentDefinition>> {
        self.agents.write().await.remove(agent_id)
    }

    pub async fn contains(&self, agent_id: &AgentId) -> bool {
        self.agents.read().await.contains_key(agent_id)
    }

    /// Registered ids, sorted.
    pub async fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }
}

#[async_trait]
impl AgentRegistry for InMemoryAgentRegistry {
    async fn lookup(&self, agent_id: &AgentId) -> Option<Arc<AgentDefinition>> {
        self.agents.read().await.get(agent_id).cloned()
    }
}
