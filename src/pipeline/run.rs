//! Pipeline run record - the orchestrator's aggregate state.
//!
//! State transitions:
//! ```text
//! RUNNING → {COMPLETED | FAILED | CANCELLED}
//! ```
//! Only the orchestrator mutates a run. Observers receive clones; agent runs
//! are held behind `Arc` and replaced, never edited, so every clone handed out
//! stays a valid point-in-time record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::agent::{AgentRun, AgentRunStatus};
use crate::types::{AgentRunId, PipelineId, PipelineRunId};

/// Pipeline run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl PipelineStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PipelineStatus::Running)
    }
}

/// What a UI should offer for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Nothing to recover (still running or completed).
    None,
    /// A step failed; running again with the same input may succeed.
    Retry,
    /// The run was cancelled; start it again or resume from partial results.
    Restart,
}

/// Aggregate record of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    id: PipelineRunId,
    pipeline_id: PipelineId,
    status: PipelineStatus,
    agent_runs: Vec<Arc<AgentRun>>,
    current_step_index: usize,
    started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub(crate) fn new(pipeline_id: PipelineId) -> Self {
        Self {
            id: PipelineRunId::generate(&pipeline_id),
            pipeline_id,
            status: PipelineStatus::Running,
            agent_runs: Vec::new(),
            current_step_index: 0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn id(&self) -> &PipelineRunId {
        &self.id
    }

    pub fn pipeline_id(&self) -> &PipelineId {
        &self.pipeline_id
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn agent_runs(&self) -> &[Arc<AgentRun>] {
        &self.agent_runs
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn agent_run(&self, id: &AgentRunId) -> Option<&AgentRun> {
        self.agent_runs
            .iter()
            .find(|run| &run.id == id)
            .map(Arc::as_ref)
    }

    pub fn failed_runs(&self) -> impl Iterator<Item = &AgentRun> {
        self.agent_runs
            .iter()
            .map(Arc::as_ref)
            .filter(|run| run.status == AgentRunStatus::Failed)
    }

    /// Output of the most recent completed agent run.
    pub fn last_output(&self) -> Option<&Value> {
        self.agent_runs
            .iter()
            .rev()
            .find(|run| run.status == AgentRunStatus::Completed)
            .and_then(|run| run.output.as_ref())
    }

    pub fn recovery_action(&self) -> RecoveryAction {
        match self.status {
            PipelineStatus::Failed => RecoveryAction::Retry,
            PipelineStatus::Cancelled => RecoveryAction::Restart,
            PipelineStatus::Running | PipelineStatus::Completed => RecoveryAction::None,
        }
    }

    // =========================================================================
    // Orchestrator-side mutation
    // =========================================================================

    /// Move the cursor forward. Never moves backwards.
    pub(crate) fn advance_to(&mut self, index: usize) {
        if self.is_terminal() {
            return;
        }
        debug_assert!(index >= self.current_step_index, "step cursor moved backwards");
        self.current_step_index = self.current_step_index.max(index);
    }

    /// Replace the entry with the same id, or append. Returns whether the
    /// run changed.
    pub(crate) fn upsert_agent_run(&mut self, run: AgentRun) -> bool {
        if self.is_terminal() {
            return false;
        }
        match self.agent_runs.iter_mut().find(|existing| existing.id == run.id) {
            Some(existing) if **existing == run => false,
            Some(existing) => {
                *existing = Arc::new(run);
                true
            }
            None => {
                self.agent_runs.push(Arc::new(run));
                true
            }
        }
    }

    /// Enter a terminal state and stamp `completed_at`. No-op once terminal.
    pub(crate) fn finish(&mut self, status: PipelineStatus) {
        debug_assert!(status.is_terminal(), "finish() needs a terminal status");
        if self.is_terminal() || !status.is_terminal() {
            return;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
    }
}
