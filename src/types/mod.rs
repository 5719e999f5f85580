//! Core types for contentflow.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (PipelineId, AgentId, AgentRunId, ...)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for logging, executor and orchestrator

mod config;
mod errors;
mod ids;

pub use config::{Config, ExecutorConfig, ObservabilityConfig, OrchestratorConfig};
pub use errors::{Error, Result};
pub use ids::{AgentId, AgentRunId, PipelineId, PipelineRunId};
