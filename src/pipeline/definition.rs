//! Pipeline definitions - ordered steps, each naming an agent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::agent::AgentContext;
use crate::recovery::catch_panic;
use crate::types::{AgentId, Error, PipelineId, Result};

/// Failure to build a step's input from the previous output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MappingError(String);

impl MappingError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<serde_json::Error> for MappingError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// Signature of a code-defined input mapper.
pub type MapperFn =
    dyn Fn(&Value, &AgentContext) -> std::result::Result<Value, MappingError> + Send + Sync;

/// Builds a step's input from the previous step's output and the context.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputMapper {
    /// Value at a JSON pointer inside the previous output.
    Select { pointer: String },

    /// Previous output (an object) extended with the named context entries.
    MergeContext { keys: Vec<String> },

    /// Arbitrary closure. Definitions holding one cannot be serialized.
    #[serde(skip)]
    Custom(Arc<MapperFn>),
}

impl InputMapper {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value, &AgentContext) -> std::result::Result<Value, MappingError>
            + Send
            + Sync
            + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Apply the mapper. Panics inside custom mappers become `MappingError`s.
    pub fn apply(
        &self,
        previous: &Value,
        context: &AgentContext,
    ) -> std::result::Result<Value, MappingError> {
        match self {
            InputMapper::Select { pointer } => previous
                .pointer(pointer)
                .cloned()
                .ok_or_else(|| MappingError::new(format!("no value at '{}'", pointer))),
            InputMapper::MergeContext { keys } => {
                let mut merged = previous
                    .as_object()
                    .cloned()
                    .ok_or_else(|| MappingError::new("previous output is not an object"))?;
                for key in keys {
                    let value = context
                        .get(key)
                        .ok_or_else(|| MappingError::new(format!("context has no '{}'", key)))?;
                    merged.insert(key.clone(), value.clone());
                }
                Ok(Value::Object(merged))
            }
            InputMapper::Custom(f) => {
                catch_panic(|| f(previous, context), "input_mapper").map_err(MappingError::new)?
            }
        }
    }
}

impl fmt::Debug for InputMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputMapper::Select { pointer } => {
                f.debug_struct("Select").field("pointer", pointer).finish()
            }
            InputMapper::MergeContext { keys } => {
                f.debug_struct("MergeContext").field("keys", keys).finish()
            }
            InputMapper::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    pub agent_id: AgentId,
    /// A failing optional step is recorded but does not stop the pipeline.
    #[serde(default)]
    pub optional: bool,
    /// Ignored for the first step, which always receives the initial input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputMapper>,
}

impl PipelineStep {
    pub fn new(agent_id: impl Into<AgentId>) -> Self {
        Self {
            agent_id: agent_id.into(),
            optional: false,
            input: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_input(mut self, mapper: InputMapper) -> Self {
        self.input = Some(mapper);
        self
    }

    pub fn select(self, pointer: impl Into<String>) -> Self {
        self.with_input(InputMapper::Select {
            pointer: pointer.into(),
        })
    }

    pub fn map_input<F>(self, f: F) -> Self
    where
        F: Fn(&Value, &AgentContext) -> std::result::Result<Value, MappingError>
            + Send
            + Sync
            + 'static,
    {
        self.with_input(InputMapper::custom(f))
    }
}

/// Immutable pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub id: PipelineId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<PipelineStep>,
}

impl PipelineDefinition {
    pub fn new(id: impl Into<PipelineId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Parse and validate a JSON definition.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let definition: Self = serde_json::from_str(raw)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Agent ids in step order.
    pub fn agent_ids(&self) -> impl Iterator<Item = &AgentId> {
        self.steps.iter().map(|s| &s.agent_id)
    }

    /// Validate pipeline configuration. Pipelines without steps are valid.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::validation("pipeline id is required"));
        }
        if self.name.is_empty() {
            return Err(Error::validation(format!(
                "pipeline {} has no name",
                self.id
            )));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.agent_id.is_empty() {
                return Err(Error::validation(format!(
                    "pipeline {} step {} has no agent id",
                    self.id, index
                )));
            }
            if let Some(InputMapper::Select { pointer }) = &step.input {
                if !pointer.is_empty() && !pointer.starts_with('/') {
                    return Err(Error::validation(format!(
                        "pipeline {} step {}: pointer '{}' must start with '/'",
                        self.id, index, pointer
                    )));
                }
            }
        }
        Ok(())
    }
}
