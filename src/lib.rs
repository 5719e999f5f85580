//! # ContentFlow Core - Agent Pipeline Orchestration
//!
//! Engine behind the content-marketing dashboard's agent pipelines:
//! - Sequential pipelines of agents (writer, tagger, scheduler, ...)
//! - Optional steps that may fail without stopping the pipeline
//! - Input mapping between steps
//! - Cooperative cancellation through a shared token
//! - A snapshot of the pipeline run after every state change
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────────────┐
//!   run(def) →    │         PipelineOrchestrator         │ → PipelineObserver
//!                 │   for each step:                     │   (snapshots)
//!                 │     AgentRegistry::lookup            │
//!                 │     InputMapper::apply               │
//!                 │     AgentExecutor::execute ──────────┼─→ RunUpdateSink
//!                 └──────────────────────────────────────┘   (agent records)
//! ```
//!
//! ```no_run
//! use contentflow_core::agent::{AgentContext, AgentDefinition, HandlerExecutor, InMemoryAgentRegistry};
//! use contentflow_core::pipeline::{PipelineDefinition, PipelineOrchestrator, PipelineStep, RunOptions};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn demo() -> contentflow_core::Result<()> {
//! let registry = Arc::new(InMemoryAgentRegistry::new());
//! registry
//!     .register(AgentDefinition::from_fn("content-writer", |input, _ctx| {
//!         Ok(json!({ "drafts": [input] }))
//!     }))
//!     .await?;
//!
//! let orchestrator = PipelineOrchestrator::new(registry, Arc::new(HandlerExecutor::new()));
//! let pipeline = PipelineDefinition::new("drafts", "Drafts").step(PipelineStep::new("content-writer"));
//! let run = orchestrator
//!     .run(&pipeline, json!("topic"), &AgentContext::new(), RunOptions::new())
//!     .await;
//! println!("{:?}", run.status());
//! # Ok(())
//! # }
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod agent;
pub mod pipeline;
pub mod types;

// Internal utilities
pub mod observability;
pub mod recovery;

pub use types::{Config, Error, Result};
