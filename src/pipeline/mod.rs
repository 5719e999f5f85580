//! Pipelines - sequential chains of agents.
//!
//! - **Definition**: ordered steps, optional input mappers
//! - **Run**: the record of one execution, snapshotted on every change
//! - **Observer**: receives those snapshots
//! - **Orchestrator**: drives a definition to a terminal run
//! - **Catalog**: named definitions, including the built-in ones

mod catalog;
mod definition;
mod observer;
mod orchestrator;
mod run;

pub use catalog::{builtin, PipelineCatalog};
pub use definition::{InputMapper, MapperFn, MappingError, PipelineDefinition, PipelineStep};
pub use observer::{NoopObserver, PipelineObserver};
pub use orchestrator::{PipelineOrchestrator, RunOptions};
pub use run::{PipelineRun, PipelineStatus, RecoveryAction};
