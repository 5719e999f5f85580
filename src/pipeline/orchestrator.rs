//! Pipeline orchestration - sequential agent execution with failure policy.
//!
//! The Orchestrator:
//!   - Resolves each step's agent through the injected registry
//!   - Builds each step's input (initial input, previous output, or mapper)
//!   - Delegates execution to the injected executor
//!   - Tolerates failures of optional steps, aborts on mandatory ones
//!   - Honours cooperative cancellation before every step
//!   - Emits a snapshot of the run after every state change
//!
//! Executors and mappers never see the run record; they only feed it.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::definition::{PipelineDefinition, PipelineStep};
use super::observer::{NoopObserver, PipelineObserver};
use super::run::{PipelineRun, PipelineStatus};
use crate::agent::{AgentContext, AgentExecutor, AgentRegistry, AgentRun, AgentRunStatus, RunUpdateSink};
use crate::types::{Error, OrchestratorConfig};

static NOOP_OBSERVER: NoopObserver = NoopObserver;

// =============================================================================
// Run options
// =============================================================================

/// Per-run observer and cancellation token.
#[derive(Clone, Default)]
pub struct RunOptions {
    observer: Option<Arc<dyn PipelineObserver>>,
    cancel: CancellationToken,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: impl PipelineObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn with_shared_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Cancelling this token (or any parent of it) stops the run at the next
    /// step boundary, and inside agents that poll it.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("has_observer", &self.observer.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

// =============================================================================
// Step bookkeeping
// =============================================================================

/// What the loop does after a step failed.
enum StepFlow {
    Continue,
    Abort,
}

/// Bridges executor updates into the run: upsert by id, then emit.
struct StepUpdates<'a> {
    run: &'a mut PipelineRun,
    observer: &'a dyn PipelineObserver,
    /// Most recent record streamed for this step attempt.
    last_streamed: Option<AgentRun>,
}

impl RunUpdateSink for StepUpdates<'_> {
    fn on_run_update(&mut self, update: &AgentRun) {
        self.run.upsert_agent_run(update.clone());
        self.last_streamed = Some(update.clone());
        emit(self.observer, self.run);
    }
}

fn emit(observer: &dyn PipelineObserver, run: &PipelineRun) {
    tracing::trace!(
        status = ?run.status(),
        step_index = run.current_step_index(),
        agent_runs = run.agent_runs().len(),
        "pipeline update"
    );
    observer.on_pipeline_update(run.clone());
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs pipeline definitions against a registry and an executor.
///
/// Holds no per-run state, so one orchestrator can drive any number of
/// concurrent runs.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    registry: Arc<dyn AgentRegistry>,
    executor: Arc<dyn AgentExecutor>,
    config: OrchestratorConfig,
}

impl PipelineOrchestrator {
    pub fn new(registry: Arc<dyn AgentRegistry>, executor: Arc<dyn AgentExecutor>) -> Self {
        Self::with_config(registry, executor, OrchestratorConfig::default())
    }

    pub fn with_config(
        registry: Arc<dyn AgentRegistry>,
        executor: Arc<dyn AgentExecutor>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            executor,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Execute `pipeline` to completion, failure or cancellation.
    ///
    /// Never fails: every problem is recorded on the returned run, whose
    /// `status` tells the outcome. The returned value equals the last
    /// snapshot handed to the observer.
    pub async fn run(
        &self,
        pipeline: &PipelineDefinition,
        initial_input: Value,
        context: &AgentContext,
        options: RunOptions,
    ) -> PipelineRun {
        let run = PipelineRun::new(pipeline.id.clone());
        let span = tracing::info_span!(
            "pipeline_run",
            pipeline_id = %pipeline.id,
            run_id = %run.id()
        );
        self.drive(run, pipeline, initial_input, context, &options)
            .instrument(span)
            .await
    }

    async fn drive(
        &self,
        mut run: PipelineRun,
        pipeline: &PipelineDefinition,
        initial_input: Value,
        context: &AgentContext,
        options: &RunOptions,
    ) -> PipelineRun {
        let observer: &dyn PipelineObserver = match &options.observer {
            Some(observer) => observer.as_ref(),
            None => &NOOP_OBSERVER,
        };
        let cancel = &options.cancel;

        tracing::info!(steps = pipeline.steps.len(), "pipeline run started");
        emit(observer, &run);

        // Output flowing into the next step. Failed optional steps leave it untouched.
        let mut previous_output = initial_input.clone();

        for (index, step) in pipeline.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(step_index = index, "cancellation observed before step");
                return finish(run, PipelineStatus::Cancelled, observer);
            }

            run.advance_to(index);
            tracing::debug!(step_index = index, agent_id = %step.agent_id, "step started");
            emit(observer, &run);

            let Some(agent) = self.registry.lookup(&step.agent_id).await else {
                let failure = AgentRun::synthetic_failure(
                    step.agent_id.clone(),
                    Value::Null,
                    format!("Agent \"{}\" not found in registry", step.agent_id),
                );
                match record_failure(&mut run, step, index, failure, observer) {
                    StepFlow::Continue => continue,
                    StepFlow::Abort => return finish(run, PipelineStatus::Failed, observer),
                }
            };

            let step_input = match build_step_input(index, step, &initial_input, &previous_output, context) {
                Ok(input) => input,
                Err(failure) => match record_failure(&mut run, step, index, failure, observer) {
                    StepFlow::Continue => continue,
                    StepFlow::Abort => return finish(run, PipelineStatus::Failed, observer),
                },
            };

            let mut updates = StepUpdates {
                run: &mut run,
                observer,
                last_streamed: None,
            };
            let result = self
                .executor
                .execute(&agent, step_input.clone(), context, &mut updates, cancel)
                .await;
            let last_streamed = updates.last_streamed.take();

            let settled = match result {
                Ok(settled) => settled,
                Err(err) => {
                    // The executor refused before settling. Keep exactly one
                    // failed entry per attempt.
                    let message = refusal_message(err);
                    let flow = match last_streamed {
                        Some(streamed) if streamed.status == AgentRunStatus::Failed => {
                            tracing::debug!(step_index = index, "failure already reported for attempt");
                            failure_flow(step, index, &message)
                        }
                        Some(mut in_flight) if !in_flight.is_terminal() => {
                            in_flight.fail(message);
                            record_failure(&mut run, step, index, in_flight, observer)
                        }
                        _ => {
                            let failure = AgentRun::synthetic_failure(
                                step.agent_id.clone(),
                                step_input,
                                message,
                            );
                            record_failure(&mut run, step, index, failure, observer)
                        }
                    };
                    match flow {
                        StepFlow::Continue => continue,
                        StepFlow::Abort => return finish(run, PipelineStatus::Failed, observer),
                    }
                }
            };

            let settled = ensure_settled(settled);
            let status = settled.status;
            let output = settled.output.clone();
            let error = settled.error.clone().unwrap_or_default();
            let changed = run.upsert_agent_run(settled);
            if changed || self.config.emit_settled_updates {
                emit(observer, &run);
            }

            match status {
                AgentRunStatus::Completed => {
                    tracing::debug!(step_index = index, agent_id = %step.agent_id, "step completed");
                    previous_output = output.unwrap_or(Value::Null);
                }
                AgentRunStatus::Cancelled => {
                    tracing::info!(step_index = index, agent_id = %step.agent_id, "agent cancelled");
                    return finish(run, PipelineStatus::Cancelled, observer);
                }
                AgentRunStatus::Failed | AgentRunStatus::Running => {
                    match failure_flow(step, index, &error) {
                        StepFlow::Continue => continue,
                        StepFlow::Abort => return finish(run, PipelineStatus::Failed, observer),
                    }
                }
            }
        }

        finish(run, PipelineStatus::Completed, observer)
    }
}

impl fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Step 0 always receives the initial input; later steps get the previous
/// output, optionally remapped.
fn build_step_input(
    index: usize,
    step: &PipelineStep,
    initial_input: &Value,
    previous_output: &Value,
    context: &AgentContext,
) -> Result<Value, AgentRun> {
    if index == 0 {
        return Ok(initial_input.clone());
    }
    match &step.input {
        None => Ok(previous_output.clone()),
        Some(mapper) => mapper.apply(previous_output, context).map_err(|err| {
            AgentRun::synthetic_failure(
                step.agent_id.clone(),
                Value::Null,
                format!("Input mapping failed: {}", err),
            )
        }),
    }
}

/// Append a synthesized failure, emit, and decide whether to go on.
fn record_failure(
    run: &mut PipelineRun,
    step: &PipelineStep,
    index: usize,
    failure: AgentRun,
    observer: &dyn PipelineObserver,
) -> StepFlow {
    let error = failure.error.clone().unwrap_or_default();
    run.upsert_agent_run(failure);
    emit(observer, run);
    failure_flow(step, index, &error)
}

fn failure_flow(step: &PipelineStep, index: usize, error: &str) -> StepFlow {
    if step.optional {
        tracing::warn!(
            step_index = index,
            agent_id = %step.agent_id,
            error = %error,
            "optional step failed, continuing"
        );
        StepFlow::Continue
    } else {
        tracing::error!(
            step_index = index,
            agent_id = %step.agent_id,
            error = %error,
            "step failed, aborting pipeline"
        );
        StepFlow::Abort
    }
}

/// A rejection carries the executor's own reason; anything else keeps its
/// full description.
fn refusal_message(err: Error) -> String {
    match err {
        Error::Rejected(reason) => reason,
        other => other.to_string(),
    }
}

/// A settled record that is still running is treated as a failure.
fn ensure_settled(mut settled: AgentRun) -> AgentRun {
    if !settled.is_terminal() {
        settled.fail("agent settled without a terminal status");
    }
    settled
}

fn finish(
    mut run: PipelineRun,
    status: PipelineStatus,
    observer: &dyn PipelineObserver,
) -> PipelineRun {
    run.finish(status);
    tracing::info!(
        status = ?run.status(),
        agent_runs = run.agent_runs().len(),
        "pipeline run finished"
    );
    emit(observer, &run);
    run
}
