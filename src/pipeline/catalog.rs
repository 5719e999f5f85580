//! Pipeline catalog - named, validated pipeline definitions.
//!
//! Holds the dashboard's built-in pipelines plus anything loaded from JSON.
//! The catalog is plain data; callers share it behind an `Arc` once filled.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::definition::{PipelineDefinition, PipelineStep};
use crate::types::{Error, PipelineId, Result};

/// Collection of pipeline definitions keyed by id.
#[derive(Debug, Clone, Default)]
pub struct PipelineCatalog {
    pipelines: HashMap<PipelineId, Arc<PipelineDefinition>>,
}

impl PipelineCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-filled with [`builtin::all`].
    pub fn with_builtins() -> Result<Self> {
        let mut catalog = Self::new();
        for definition in builtin::all() {
            catalog.register(definition)?;
        }
        Ok(catalog)
    }

    /// Add a definition. Fails if it is invalid or the id is taken.
    pub fn register(&mut self, definition: PipelineDefinition) -> Result<Arc<PipelineDefinition>> {
        definition.validate()?;
        if self.pipelines.contains_key(&definition.id) {
            return Err(Error::validation(format!(
                "pipeline '{}' is already registered",
                definition.id
            )));
        }
        let id = definition.id.clone();
        let definition = Arc::new(definition);
        self.pipelines.insert(id.clone(), definition.clone());
        tracing::debug!(pipeline_id = %id, steps = definition.steps.len(), "pipeline registered");
        Ok(definition)
    }

    /// Add or overwrite a definition. Returns the replaced one.
    pub fn replace(&mut self, definition: PipelineDefinition) -> Result<Option<Arc<PipelineDefinition>>> {
        definition.validate()?;
        let id = definition.id.clone();
        let previous = self.pipelines.insert(id.clone(), Arc::new(definition));
        if previous.is_some() {
            tracing::info!(pipeline_id = %id, "pipeline definition replaced");
        }
        Ok(previous)
    }

    pub fn get(&self, id: &PipelineId) -> Result<Arc<PipelineDefinition>> {
        self.pipelines
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("pipeline '{}' not found", id)))
    }

    pub fn contains(&self, id: &PipelineId) -> bool {
        self.pipelines.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<PipelineId> {
        let mut ids: Vec<PipelineId> = self.pipelines.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Register every definition in a JSON file holding an array of
    /// definitions. Nothing is registered if any entry is rejected.
    pub fn load_json_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let definitions: Vec<PipelineDefinition> = serde_json::from_str(&raw)?;

        let mut staged = self.clone();
        for definition in &definitions {
            staged.register(definition.clone()).map_err(|err| {
                Error::config(format!("{}: {}", path.display(), err))
            })?;
        }
        *self = staged;

        tracing::info!(path = %path.display(), count = definitions.len(), "pipelines loaded");
        Ok(definitions.len())
    }
}

/// The dashboard's standard pipelines.
pub mod builtin {
    use super::*;

    pub const CONTENT_WRITER: &str = "content-writer";
    pub const ANALYTICS_TAGGER: &str = "analytics-tagger";
    pub const POSTING_SCHEDULER: &str = "posting-scheduler";
    pub const CONTENT_REPURPOSER: &str = "content-repurposer";

    pub const CONTENT_CREATION: &str = "content-creation";
    pub const REPURPOSE: &str = "repurpose";

    /// Writer drafts, the tagger enriches (best effort), the scheduler slots
    /// the drafts.
    pub fn content_creation() -> PipelineDefinition {
        PipelineDefinition::new(CONTENT_CREATION, "Content creation")
            .with_description("Draft posts, tag them, and schedule them")
            .step(PipelineStep::new(CONTENT_WRITER))
            .step(PipelineStep::new(ANALYTICS_TAGGER).optional())
            .step(PipelineStep::new(POSTING_SCHEDULER).select("/drafts"))
    }

    pub fn repurpose() -> PipelineDefinition {
        PipelineDefinition::new(REPURPOSE, "Repurpose")
            .with_description("Turn an existing post into variants and schedule them")
            .step(PipelineStep::new(CONTENT_REPURPOSER))
            .step(PipelineStep::new(POSTING_SCHEDULER).select("/variants"))
    }

    pub fn all() -> Vec<PipelineDefinition> {
        vec![content_creation(), repurpose()]
    }
}
