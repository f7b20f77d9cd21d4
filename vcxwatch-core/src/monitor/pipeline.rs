//! Event pipeline: filter, deduplicate, coalesce

use super::classifier::{Classification, EventFilter, IgnoreReason, Relevance};
use super::debouncer::{CoalescerState, Debouncer, RunTrigger, Scheduling};
use super::WatchedEvent;
use crate::reconcile::{Orchestrator, RunOutcome};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// What happened to one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineDecision {
    Ignored(IgnoreReason),
    Duplicate,
    /// Duplicate descriptor change that pushed a pending deadline back
    Rearmed,
    /// Relevant, but a run was already in progress
    Swallowed,
    Scheduled(Relevance),
}

/// Processes watcher events in delivery order on a single task
pub struct EventPipeline<T: RunTrigger> {
    filter: EventFilter,
    debouncer: Debouncer<T>,
}

impl<T: RunTrigger> EventPipeline<T> {
    pub fn new(filter: EventFilter, debouncer: Debouncer<T>) -> Self {
        Self { filter, debouncer }
    }

    pub fn debouncer(&self) -> &Debouncer<T> {
        &self.debouncer
    }

    pub fn handle(&mut self, event: &WatchedEvent) -> PipelineDecision {
        let relevance = match self.filter.classify(event) {
            Classification::Relevant(relevance) => relevance,
            Classification::Ignored(reason) => {
                trace!("Ignored {:?} {:?}: {:?}", event.kind, event.path, reason);
                return PipelineDecision::Ignored(reason);
            }
        };

        if self.filter.is_duplicate(event) {
            // The run is scheduled from the last write to a descriptor
            let pending = matches!(self.debouncer.state(), CoalescerState::Pending { .. });
            if relevance == Relevance::Trigger && pending {
                if let Scheduling::Armed { .. } = self.debouncer.on_event(relevance) {
                    trace!("Duplicate descriptor change re-armed: {:?}", event.path);
                    return PipelineDecision::Rearmed;
                }
            }
            return PipelineDecision::Duplicate;
        }

        debug!("Relevant {:?} event: {:?}", event.kind, event.path);
        match self.debouncer.on_event(relevance) {
            Scheduling::Swallowed => PipelineDecision::Swallowed,
            Scheduling::Armed { .. } => PipelineDecision::Scheduled(relevance),
        }
    }

    /// Consume events until the sender side closes
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WatchedEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(&event);
        }
        self.debouncer.cancel();
        info!("Event stream closed, pipeline stopped");
    }
}

/// Runs the orchestrator on its own task when the debounce window elapses
pub struct OrchestratorTrigger {
    orchestrator: Arc<Orchestrator>,
}

impl OrchestratorTrigger {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

impl RunTrigger for OrchestratorTrigger {
    fn is_running(&self) -> bool {
        self.orchestrator.is_running()
    }

    fn fire(&self) {
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            if let RunOutcome::Busy = orchestrator.run().await {
                debug!("Triggered run dropped, another run is in progress");
            }
        });
    }
}
