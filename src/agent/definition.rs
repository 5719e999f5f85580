//! Agent definitions as stored in the registry.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::context::AgentContext;
use super::handler::{AgentFailure, AgentHandler, FnHandler};
use crate::types::AgentId;

/// A registered agent: identity, limits and the handler that does the work.
#[derive(Clone)]
pub struct AgentDefinition {
    pub id: AgentId,
    pub name: String,
    pub description: String,
    /// Deadline for one attempt; falls back to the executor default.
    pub timeout: Option<Duration>,
    /// JSON Schema the output must satisfy.
    pub output_schema: Option<Value>,
    pub handler: Arc<dyn AgentHandler>,
}

impl AgentDefinition {
    pub fn new(id: impl Into<AgentId>, handler: impl AgentHandler + 'static) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            description: String::new(),
            timeout: None,
            output_schema: None,
            handler: Arc::new(handler),
        }
    }

    /// Definition backed by a synchronous closure.
    pub fn from_fn<F>(id: impl Into<AgentId>, f: F) -> Self
    where
        F: Fn(Value, &AgentContext) -> Result<Value, AgentFailure> + Send + Sync + 'static,
    {
        Self::new(id, FnHandler::new(f))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

impl fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("has_output_schema", &self.output_schema.is_some())
            .finish_non_exhaustive()
    }
}
