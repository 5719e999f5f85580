//! Pipeline integration tests - real handlers through the handler executor
//! and the in-memory registry.

use async_trait::async_trait;
use contentflow_core::agent::{
    AgentContext, AgentDefinition, AgentFailure, AgentHandler, AgentProgress, AgentRunStatus,
    HandlerExecutor, InMemoryAgentRegistry,
};
use contentflow_core::pipeline::{
    builtin, PipelineCatalog, PipelineDefinition, PipelineOrchestrator, PipelineRun,
    PipelineStatus, PipelineStep, RecoveryAction, RunOptions,
};
use contentflow_core::types::{ExecutorConfig, PipelineId};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Writes one draft per requested topic, recording progress per draft.
struct Writer;

#[async_trait]
impl AgentHandler for Writer {
    fn precheck(&self, input: &Value, _context: &AgentContext) -> Result<(), String> {
        if input.get("topics").is_some() {
            Ok(())
        } else {
            Err("precondition failed: no topics".to_string())
        }
    }

    async fn handle(
        &self,
        input: Value,
        context: &AgentContext,
        progress: &mut AgentProgress<'_>,
    ) -> Result<Value, AgentFailure> {
        let tone: Option<String> = context.get_as("tone")?;
        let topics: Vec<String> = serde_json::from_value(input["topics"].clone())?;
        let mut drafts = Vec::new();
        for topic in topics {
            progress.checkpoint()?;
            progress.step("draft", Some(json!(topic)));
            drafts.push(json!({
                "topic": topic,
                "tone": tone.clone().unwrap_or_else(|| "neutral".to_string()),
            }));
        }
        Ok(json!({ "drafts": drafts }))
    }
}

/// Blocks until cancelled.
struct Stuck;

#[async_trait]
impl AgentHandler for Stuck {
    async fn handle(
        &self,
        _input: Value,
        _context: &AgentContext,
        progress: &mut AgentProgress<'_>,
    ) -> Result<Value, AgentFailure> {
        progress.step("waiting", None);
        progress.cancellation().cancelled().await;
        Err(AgentFailure::Cancelled)
    }
}

async fn dashboard_registry() -> Arc<InMemoryAgentRegistry> {
    let registry = Arc::new(InMemoryAgentRegistry::new());
    registry
        .register(AgentDefinition::new(builtin::CONTENT_WRITER, Writer))
        .await
        .unwrap();
    registry
        .register(AgentDefinition::from_fn(builtin::POSTING_SCHEDULER, |drafts, _ctx| {
            let count = drafts.as_array().map(Vec::len).unwrap_or(0);
            Ok(json!({ "scheduled": count }))
        }))
        .await
        .unwrap();
    registry
}

fn orchestrator(registry: Arc<InMemoryAgentRegistry>) -> PipelineOrchestrator {
    PipelineOrchestrator::new(registry, Arc::new(HandlerExecutor::new()))
}

#[tokio::test]
async fn test_content_creation_without_tagger() {
    let registry = dashboard_registry().await;
    let orchestrator = orchestrator(registry);
    let pipeline = PipelineCatalog::with_builtins()
        .unwrap()
        .get(&PipelineId::from(builtin::CONTENT_CREATION))
        .unwrap();
    let context = AgentContext::new().with("tone", json!("playful"));

    let run = orchestrator
        .run(
            &pipeline,
            json!({ "topics": ["launch", "hiring"] }),
            &context,
            RunOptions::new(),
        )
        .await;

    assert_eq!(run.status(), PipelineStatus::Completed);
    let statuses: Vec<AgentRunStatus> = run.agent_runs().iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            AgentRunStatus::Completed,
            AgentRunStatus::Failed,
            AgentRunStatus::Completed
        ]
    );
    assert_eq!(
        run.agent_runs()[1].error.as_deref(),
        Some("Agent \"analytics-tagger\" not found in registry")
    );
    assert_eq!(run.agent_runs()[0].steps.len(), 2);
    assert_eq!(run.agent_runs()[2].input[0]["tone"], json!("playful"));
    assert_eq!(run.last_output(), Some(&json!({ "scheduled": 2 })));
    assert_eq!(run.recovery_action(), RecoveryAction::None);
}

#[tokio::test]
async fn test_precheck_refusal_fails_pipeline() {
    let orchestrator = orchestrator(dashboard_registry().await);
    let pipeline = PipelineDefinition::new("drafts", "Drafts")
        .step(PipelineStep::new(builtin::CONTENT_WRITER));

    let run = orchestrator
        .run(&pipeline, json!({}), &AgentContext::new(), RunOptions::new())
        .await;

    assert_eq!(run.status(), PipelineStatus::Failed);
    assert_eq!(run.agent_runs().len(), 1);
    assert!(run.agent_runs()[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("precondition failed")));
    assert!(run.completed_at().is_some());
    assert_eq!(run.recovery_action(), RecoveryAction::Retry);
}

#[tokio::test]
async fn test_schema_violation_fails_step() {
    let registry = dashboard_registry().await;
    registry
        .register(
            AgentDefinition::from_fn(builtin::CONTENT_REPURPOSER, |_input, _ctx| {
                Ok(json!({ "variants": "not a list" }))
            })
            .with_output_schema(json!({
                "type": "object",
                "properties": { "variants": { "type": "array" } },
                "required": ["variants"]
            })),
        )
        .await
        .unwrap();

    let run = orchestrator(registry)
        .run(
            &builtin::repurpose(),
            json!({ "post": "hello" }),
            &AgentContext::new(),
            RunOptions::new(),
        )
        .await;

    assert_eq!(run.status(), PipelineStatus::Failed);
    assert_eq!(run.agent_runs().len(), 1);
    assert!(run.agent_runs()[0]
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("output does not match schema")));
}

#[tokio::test]
async fn test_agent_timeout_fails_mandatory_step() {
    let registry = dashboard_registry().await;
    registry
        .register(AgentDefinition::new("stuck", Stuck).with_timeout(Duration::from_millis(20)))
        .await
        .unwrap();
    let executor = HandlerExecutor::with_config(ExecutorConfig::default());
    let orchestrator = PipelineOrchestrator::new(registry, Arc::new(executor));
    let pipeline = PipelineDefinition::new("p", "P").step(PipelineStep::new("stuck"));

    let run = orchestrator
        .run(&pipeline, json!(null), &AgentContext::new(), RunOptions::new())
        .await;

    assert_eq!(run.status(), PipelineStatus::Failed);
    assert_eq!(
        run.agent_runs()[0].error.as_deref(),
        Some("agent timed out after 20ms")
    );
}

#[tokio::test]
async fn test_cancel_while_second_step_runs() {
    let registry = dashboard_registry().await;
    registry.register(AgentDefinition::new("stuck", Stuck)).await.unwrap();
    let orchestrator = orchestrator(registry);
    let pipeline = PipelineDefinition::new("p", "P")
        .step(PipelineStep::new(builtin::CONTENT_WRITER))
        .step(PipelineStep::new("stuck"))
        .step(PipelineStep::new(builtin::POSTING_SCHEDULER));

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<PipelineRun>();
    let options = RunOptions::new()
        .with_observer(tx)
        .with_cancellation(cancel.clone());

    let task = tokio::spawn(async move {
        orchestrator
            .run(&pipeline, json!({ "topics": ["a"] }), &AgentContext::new(), options)
            .await
    });

    while let Some(snapshot) = rx.recv().await {
        let waiting = snapshot
            .agent_runs()
            .get(1)
            .is_some_and(|r| r.status == AgentRunStatus::Running && !r.steps.is_empty());
        if waiting {
            cancel.cancel();
            break;
        }
    }

    let run = task.await.unwrap();
    assert_eq!(run.status(), PipelineStatus::Cancelled);
    assert_eq!(run.agent_runs().len(), 2);
    assert_eq!(run.agent_runs()[1].status, AgentRunStatus::Cancelled);
    assert_eq!(run.current_step_index(), 1);
    assert_eq!(run.recovery_action(), RecoveryAction::Restart);
}

#[tokio::test]
async fn test_watch_observer_holds_final_state() {
    let orchestrator = orchestrator(dashboard_registry().await);
    let (tx, rx) = watch::channel::<Option<PipelineRun>>(None);

    let run = orchestrator
        .run(
            &builtin::content_creation(),
            json!({ "topics": [] }),
            &AgentContext::new(),
            RunOptions::new().with_observer(tx),
        )
        .await;

    let latest = rx.borrow().clone();
    assert_eq!(latest, Some(run));
}

#[tokio::test]
async fn test_concurrent_runs_share_registry() {
    let orchestrator = orchestrator(dashboard_registry().await);
    let pipeline = builtin::content_creation();

    let runs = futures::future::join_all((0..8).map(|i| {
        let orchestrator = orchestrator.clone();
        let pipeline = pipeline.clone();
        async move {
            orchestrator
                .run(
                    &pipeline,
                    json!({ "topics": vec!["t"; i] }),
                    &AgentContext::new(),
                    RunOptions::new(),
                )
                .await
        }
    }))
    .await;

    for (i, run) in runs.iter().enumerate() {
        assert_eq!(run.status(), PipelineStatus::Completed);
        assert_eq!(run.last_output(), Some(&json!({ "scheduled": i })));
    }
    let ids: HashSet<_> = runs.iter().map(|r| r.id().clone()).collect();
    assert_eq!(ids.len(), 8);
}
