//! Agent run records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{AgentId, AgentRunId};

/// Status of one agent attempt.
///
/// `Running` only appears on records streamed while the agent is in flight;
/// a settled record is always one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl AgentRunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AgentRunStatus::Running)
    }
}

/// Sub-progress entry reported by an agent while it works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    pub at: DateTime<Utc>,
}

/// Execution record of a single agent attempt.
///
/// `output` is present iff the run completed and `error` iff it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    pub id: AgentRunId,
    pub agent_id: AgentId,
    pub status: AgentRunStatus,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<AgentStep>,
}

impl AgentRun {
    /// Open a new in-flight record with a fresh id.
    pub fn start(agent_id: AgentId, input: Value) -> Self {
        Self {
            id: AgentRunId::generate(),
            agent_id,
            status: AgentRunStatus::Running,
            input,
            output: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: 0,
            steps: Vec::new(),
        }
    }

    /// Failure record for an agent that never got to run (lookup, mapping,
    /// executor refusal). Zero duration.
    pub fn synthetic_failure(agent_id: AgentId, input: Value, error: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AgentRunId::generate(),
            agent_id,
            status: AgentRunStatus::Failed,
            input,
            output: None,
            error: Some(error.into()),
            started_at: now,
            completed_at: Some(now),
            duration_ms: 0,
            steps: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append a sub-progress entry. Ignored once settled.
    pub fn record_step(&mut self, label: impl Into<String>, detail: Option<Value>) {
        if self.is_terminal() {
            return;
        }
        self.steps.push(AgentStep {
            label: label.into(),
            detail,
            at: Utc::now(),
        });
    }

    pub fn complete(&mut self, output: Value) {
        if self.settle(AgentRunStatus::Completed) {
            self.output = Some(output);
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        if self.settle(AgentRunStatus::Failed) {
            self.error = Some(error.into());
        }
    }

    pub fn cancel(&mut self) {
        self.settle(AgentRunStatus::Cancelled);
    }

    fn settle(&mut self, status: AgentRunStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.duration_ms = u64::try_from((now - self.started_at).num_milliseconds()).unwrap_or(0);
        true
    }
}
