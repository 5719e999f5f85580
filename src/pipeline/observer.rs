//! Pipeline update observers.
//!
//! The orchestrator hands every observer an owned snapshot per state change.
//! Closures, unbounded channels (every state, in order) and watch channels
//! (latest state only) can all act as observers.

use tokio::sync::{mpsc, watch};

use super::run::PipelineRun;

/// Receives a snapshot after every observable change of a pipeline run.
pub trait PipelineObserver: Send + Sync {
    fn on_pipeline_update(&self, snapshot: PipelineRun);
}

impl<F> PipelineObserver for F
where
    F: Fn(PipelineRun) + Send + Sync,
{
    fn on_pipeline_update(&self, snapshot: PipelineRun) {
        self(snapshot)
    }
}

impl PipelineObserver for mpsc::UnboundedSender<PipelineRun> {
    fn on_pipeline_update(&self, snapshot: PipelineRun) {
        // A dropped receiver only means nobody is watching any more.
        let _ = self.send(snapshot);
    }
}

impl PipelineObserver for watch::Sender<Option<PipelineRun>> {
    fn on_pipeline_update(&self, snapshot: PipelineRun) {
        self.send_replace(Some(snapshot));
    }
}

/// Observer that ignores all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_pipeline_update(&self, _snapshot: PipelineRun) {}
}
