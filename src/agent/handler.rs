//! Agent business logic seam.
//!
//! An [`AgentHandler`] is what an embedding application registers for each
//! agent (content writer, posting scheduler, ...). The standard
//! [`HandlerExecutor`](super::HandlerExecutor) wraps handlers with run
//! records, deadlines, cancellation and panic capture.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::context::AgentContext;
use super::executor::RunUpdateSink;
use super::run::AgentRun;
use crate::types::AgentRunId;

/// Why a handler did not produce an output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentFailure {
    /// The agent gave up; the message ends up on the run record.
    #[error("{0}")]
    Failed(String),

    /// The agent observed the cancellation token and stopped.
    #[error("cancelled")]
    Cancelled,
}

impl AgentFailure {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

impl From<serde_json::Error> for AgentFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::Failed(format!("serialization error: {}", err))
    }
}

impl From<crate::types::Error> for AgentFailure {
    fn from(err: crate::types::Error) -> Self {
        match err {
            crate::types::Error::Cancelled(_) => Self::Cancelled,
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Business logic of one agent.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Refuse to run before any work happens. The executor turns an `Err`
    /// into [`Error::Rejected`](crate::Error::Rejected) without a run record.
    fn precheck(&self, _input: &Value, _context: &AgentContext) -> Result<(), String> {
        Ok(())
    }

    async fn handle(
        &self,
        input: Value,
        context: &AgentContext,
        progress: &mut AgentProgress<'_>,
    ) -> Result<Value, AgentFailure>;
}

/// Adapts a synchronous closure into an [`AgentHandler`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Value, &AgentContext) -> Result<Value, AgentFailure> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> AgentHandler for FnHandler<F>
where
    F: Fn(Value, &AgentContext) -> Result<Value, AgentFailure> + Send + Sync,
{
    async fn handle(
        &self,
        input: Value,
        context: &AgentContext,
        _progress: &mut AgentProgress<'_>,
    ) -> Result<Value, AgentFailure> {
        (self.f)(input, context)
    }
}

/// Progress handle given to a running handler.
///
/// Every recorded step is streamed to the executor's update sink, so the
/// pipeline observer sees sub-progress before the agent settles.
pub struct AgentProgress<'a> {
    run: &'a mut AgentRun,
    updates: &'a mut dyn RunUpdateSink,
    cancel: &'a CancellationToken,
    max_steps: usize,
    truncated: bool,
}

impl<'a> AgentProgress<'a> {
    pub(crate) fn new(
        run: &'a mut AgentRun,
        updates: &'a mut dyn RunUpdateSink,
        cancel: &'a CancellationToken,
        max_steps: usize,
    ) -> Self {
        Self {
            run,
            updates,
            cancel,
            max_steps,
            truncated: false,
        }
    }

    pub fn run_id(&self) -> &AgentRunId {
        &self.run.id
    }

    /// Record a sub-progress entry and stream the updated run.
    pub fn step(&mut self, label: impl Into<String>, detail: Option<Value>) {
        if self.run.steps.len() >= self.max_steps {
            if !self.truncated {
                self.truncated = true;
                tracing::warn!(
                    agent_id = %self.run.agent_id,
                    run_id = %self.run.id,
                    max_steps = self.max_steps,
                    "progress trace truncated"
                );
            }
            return;
        }
        self.run.record_step(label, detail);
        self.updates.on_run_update(self.run);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(AgentFailure::Cancelled)` once cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), AgentFailure> {
        if self.cancel.is_cancelled() {
            Err(AgentFailure::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        self.cancel
    }
}

impl fmt::Debug for AgentProgress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentProgress")
            .field("run_id", &self.run.id)
            .field("steps", &self.run.steps.len())
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}
