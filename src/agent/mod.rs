//! Agents - the units of work a pipeline chains together.
//!
//! - **AgentContext**: read-only ambient data for a run
//! - **AgentRun**: the record of one agent attempt
//! - **AgentDefinition / AgentHandler**: what gets registered per agent
//! - **AgentRegistry**: id → definition lookup
//! - **AgentExecutor**: runs one agent, streaming its record as it goes

mod context;
mod definition;
mod executor;
mod handler;
mod registry;
mod run;

pub use context::AgentContext;
pub use definition::AgentDefinition;
pub use executor::{AgentExecutor, DiscardUpdates, HandlerExecutor, RunUpdateSink};
pub use handler::{AgentFailure, AgentHandler, AgentProgress, FnHandler};
pub use registry::{AgentRegistry, InMemoryAgentRegistry};
pub use run::{AgentRun, AgentRunStatus, AgentStep};

#[cfg(test)]
pub(crate) use registry::MockAgentRegistry;
