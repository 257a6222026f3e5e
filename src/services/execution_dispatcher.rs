//! Execution Dispatcher (C8, `spec.md` §4.8). Turns Routing Decisions into
//! running work inside the Agent Registry (C4). Every dispatched pipeline
//! gets a cooperative cancellation token (`tokio::sync::watch<bool>`, per
//! `spec.md` §5) that the owning agent task is expected to poll at its
//! suspension points; this dispatcher only ever sets the flag; it never
//! forcibly kills anything.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::domain::models::{AgentRole, IssueRef, RoutingAction, RoutingDecision};

use super::agent_registry::{AcquireOutcome, AgentHandle, AgentRegistry};
use super::pipeline_orchestrator::PipelineOrchestrator;

#[derive(Debug, Clone)]
pub struct RunningDispatch {
    pub handle: AgentHandle,
    pub cancel_tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Running(RunningDispatch),
    Queued,
    Rejected(String),
}

fn role_for(action: RoutingAction) -> AgentRole {
    match action {
        RoutingAction::StartCodeAgent | RoutingAction::StartCodeAgentWithEscalation => AgentRole::Developer,
        RoutingAction::StartCoordinatorOrchestration => AgentRole::Coordinator,
    }
}

pub struct ExecutionDispatcher {
    agents: Arc<AgentRegistry>,
    orchestrator: Arc<PipelineOrchestrator>,
    queues: Mutex<HashMap<AgentRole, VecDeque<RoutingDecision>>>,
    cancel_tokens: Mutex<HashMap<IssueRef, watch::Sender<bool>>>,
    queue_capacity: usize,
}

impl ExecutionDispatcher {
    pub fn new(agents: Arc<AgentRegistry>, orchestrator: Arc<PipelineOrchestrator>, queue_capacity: usize) -> Self {
        Self {
            agents,
            orchestrator,
            queues: Mutex::new(HashMap::new()),
            cancel_tokens: Mutex::new(HashMap::new()),
            queue_capacity,
        }
    }

    pub async fn dispatch(&self, decision: &RoutingDecision) -> DispatchOutcome {
        let role = role_for(decision.action);
        match self.agents.acquire(role, &HashSet::new()).await {
            AcquireOutcome::Acquired(handle) => self.start(decision, handle).await,
            AcquireOutcome::Busy => self.enqueue(role, decision.clone()).await,
            AcquireOutcome::NoneAvailable => {
                DispatchOutcome::Rejected(format!("no agent profile available for role {role:?}"))
            }
        }
    }

    async fn start(&self, decision: &RoutingDecision, handle: AgentHandle) -> DispatchOutcome {
        self.orchestrator
            .transition(&decision.issue_ref, crate::domain::models::PipelinePhase::Dispatched)
            .await;
        self.orchestrator
            .record_agent(&decision.issue_ref, handle.agent_id.clone())
            .await;
        self.agents.assign_task(&handle.instance_key, decision.issue_ref.clone()).await;

        let (cancel_tx, _rx) = watch::channel(false);
        self.cancel_tokens
            .lock()
            .await
            .insert(decision.issue_ref.clone(), cancel_tx.clone());

        DispatchOutcome::Running(RunningDispatch { handle, cancel_tx })
    }

    async fn enqueue(&self, role: AgentRole, decision: RoutingDecision) -> DispatchOutcome {
        let mut queues = self.queues.lock().await;
        let queue = queues.entry(role).or_default();
        if queue.len() >= self.queue_capacity {
            return DispatchOutcome::Rejected("dispatch queue full".to_string());
        }
        queue.push_back(decision);
        DispatchOutcome::Queued
    }

    /// Attempts to place the oldest queued decision for `role` now that a
    /// slot may have freed up; returns `None` if the queue is empty or the
    /// registry is still busy (the decision stays queued).
    pub async fn drain_one(&self, role: AgentRole) -> Option<DispatchOutcome> {
        let mut queues = self.queues.lock().await;
        let queue = queues.get_mut(&role)?;
        let decision = queue.front()?.clone();

        match self.agents.acquire(role, &HashSet::new()).await {
            AcquireOutcome::Acquired(handle) => {
                queue.pop_front();
                drop(queues);
                Some(self.start(&decision, handle).await)
            }
            AcquireOutcome::Busy => None,
            AcquireOutcome::NoneAvailable => {
                queue.pop_front();
                Some(DispatchOutcome::Rejected(format!(
                    "no agent profile available for role {role:?}"
                )))
            }
        }
    }

    pub async fn queue_depth(&self, role: AgentRole) -> usize {
        self.queues.lock().await.get(&role).map_or(0, VecDeque::len)
    }

    /// Signals cooperative cancellation for a dispatched pipeline; a no-op
    /// if it was never dispatched or already finished.
    pub async fn cancel(&self, issue_ref: &IssueRef) -> bool {
        if let Some(tx) = self.cancel_tokens.lock().await.remove(issue_ref) {
            let _ = tx.send(true);
            true
        } else {
            false
        }
    }
}
