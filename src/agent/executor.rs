//! Agent execution.
//!
//! [`AgentExecutor`] is the seam the orchestrator delegates to. It reports
//! in-flight records through a [`RunUpdateSink`] and resolves to a settled
//! [`AgentRun`]. Returning `Err` means the executor refused to run the agent
//! at all; no settled record exists in that case.
//!
//! [`HandlerExecutor`] is the standard implementation over [`AgentHandler`]s.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::context::AgentContext;
use super::definition::AgentDefinition;
use super::handler::{AgentFailure, AgentProgress};
use super::run::AgentRun;
use crate::recovery::catch_panic_async;
use crate::types::{Error, ExecutorConfig, Result};

/// Receives every intermediate state of an agent run.
pub trait RunUpdateSink: Send {
    fn on_run_update(&mut self, run: &AgentRun);
}

impl<F> RunUpdateSink for F
where
    F: FnMut(&AgentRun) + Send,
{
    fn on_run_update(&mut self, run: &AgentRun) {
        self(run)
    }
}

/// Sink that drops all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardUpdates;

impl RunUpdateSink for DiscardUpdates {
    fn on_run_update(&mut self, _run: &AgentRun) {}
}

/// Runs a single agent to completion.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(
        &self,
        agent: &AgentDefinition,
        input: Value,
        context: &AgentContext,
        updates: &mut dyn RunUpdateSink,
        cancel: &CancellationToken,
    ) -> Result<AgentRun>;
}

/// How a handler invocation ended, before it is folded into the run record.
enum Outcome {
    Produced(Value),
    Failed(String),
    Cancelled,
    TimedOut(Duration),
}

/// Standard executor: precheck, deadline, cancellation, panic capture and
/// output schema enforcement around an [`AgentHandler`](super::AgentHandler).
#[derive(Debug, Clone, Default)]
pub struct HandlerExecutor {
    config: ExecutorConfig,
}

impl HandlerExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}

#[async_trait]
impl AgentExecutor for HandlerExecutor {
    async fn execute(
        &self,
        agent: &AgentDefinition,
        input: Value,
        context: &AgentContext,
        updates: &mut dyn RunUpdateSink,
        cancel: &CancellationToken,
    ) -> Result<AgentRun> {
        if let Err(reason) = agent.handler.precheck(&input, context) {
            tracing::debug!(agent_id = %agent.id, reason = %reason, "agent precheck refused");
            return Err(Error::rejected(reason));
        }

        let mut run = AgentRun::start(agent.id.clone(), input.clone());
        if cancel.is_cancelled() {
            run.cancel();
            updates.on_run_update(&run);
            return Ok(run);
        }
        updates.on_run_update(&run);
        tracing::debug!(agent_id = %agent.id, run_id = %run.id, "agent started");

        let timeout = agent.timeout.or(self.config.default_agent_timeout);
        let outcome = {
            let mut progress =
                AgentProgress::new(&mut run, updates, cancel, self.config.max_progress_steps);
            let guarded = catch_panic_async(
                agent.handler.handle(input, context, &mut progress),
                agent.id.as_str(),
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Outcome::Cancelled,
                result = with_deadline(guarded, timeout) => match result {
                    None => Outcome::TimedOut(timeout.unwrap_or_default()),
                    Some(Err(panic_msg)) => Outcome::Failed(panic_msg),
                    Some(Ok(Err(AgentFailure::Cancelled))) => Outcome::Cancelled,
                    Some(Ok(Err(AgentFailure::Failed(msg)))) => Outcome::Failed(msg),
                    Some(Ok(Ok(output))) => Outcome::Produced(output),
                },
            }
        };

        match outcome {
            Outcome::Produced(output) => match &agent.output_schema {
                Some(schema) => match check_output_schema(schema, &output) {
                    Ok(()) => run.complete(output),
                    Err(msg) => run.fail(msg),
                },
                None => run.complete(output),
            },
            Outcome::Failed(msg) => run.fail(msg),
            Outcome::Cancelled => run.cancel(),
            Outcome::TimedOut(after) => run.fail(format!(
                "agent timed out after {}",
                humantime_serde::re::humantime::format_duration(after)
            )),
        }

        tracing::debug!(
            agent_id = %agent.id,
            run_id = %run.id,
            status = ?run.status,
            duration_ms = run.duration_ms,
            "agent settled"
        );
        updates.on_run_update(&run);
        Ok(run)
    }
}

/// `None` when the deadline elapsed first.
async fn with_deadline<F: std::future::Future>(
    future: F,
    deadline: Option<Duration>,
) -> Option<F::Output> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, future).await.ok(),
        None => Some(future.await),
    }
}

fn check_output_schema(schema: &Value, output: &Value) -> std::result::Result<(), String> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| format!("invalid output schema: {}", e))?;
    let errors: Vec<String> = validator.iter_errors(output).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("output does not match schema: {}", errors.join("; ")))
    }
}
