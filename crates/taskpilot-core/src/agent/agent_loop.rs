//! Agent loop implementation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::CredentialSource;
use crate::error::AgentError;
use crate::gateway::ModelGateway;
use crate::parser::is_real_task;

use super::events::{
    user_ceiling_message, AgentMessage, AgentSink, COMPLETED_MESSAGE, DEMO_CEILING_MESSAGE,
    MANUAL_SHUTDOWN_MESSAGE, NO_NEW_TASKS_INFO,
};
use super::state::{LoopLimits, Pacing, RunOutcome, RunReport, TaskState};

/// State shared between a running agent and its handles
struct Shared {
    sink: Arc<dyn AgentSink>,
    cancel: CancellationToken,
    shut_down: AtomicBool,
}

impl Shared {
    /// Messages are dropped once the run is cancelled
    fn emit(&self, message: AgentMessage) {
        if !self.cancel.is_cancelled() {
            self.sink.render(message);
        }
    }

    fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            self.sink.shutdown();
        }
    }
}

/// Clonable handle used to stop a run from outside
#[derive(Clone)]
pub struct AgentHandle {
    shared: Arc<Shared>,
}

impl AgentHandle {
    /// Announce the manual stop, cancel the run and shut down.
    /// No-op once the run has already shut down.
    pub fn stop(&self) {
        if self.shared.shut_down.load(Ordering::SeqCst) {
            return;
        }
        info!("Agent stopped manually");
        self.shared.emit(AgentMessage::system(MANUAL_SHUTDOWN_MESSAGE));
        self.shared.cancel.cancel();
        self.shared.shutdown();
    }

    /// False once the run has been stopped or has shut down on its own
    pub fn is_running(&self) -> bool {
        !self.shared.cancel.is_cancelled() && !self.shared.shut_down.load(Ordering::SeqCst)
    }
}

/// The goal-driven task loop
pub struct Agent {
    name: String,
    goal: String,
    gateway: Arc<dyn ModelGateway>,
    credential: CredentialSource,
    limits: LoopLimits,
    pacing: Pacing,
    filter_degenerate_tasks: bool,
    state: TaskState,
    shared: Arc<Shared>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        goal: impl Into<String>,
        gateway: Arc<dyn ModelGateway>,
        credential: CredentialSource,
        sink: Arc<dyn AgentSink>,
    ) -> Self {
        Self {
            name: name.into(),
            goal: goal.into(),
            gateway,
            credential,
            limits: LoopLimits::default(),
            pacing: Pacing::default(),
            filter_degenerate_tasks: false,
            state: TaskState::new(),
            shared: Arc::new(Shared {
                sink,
                cancel: CancellationToken::new(),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn with_limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Drop degenerate entries ("No tasks needed", "Do nothing", ...) from
    /// generated task lists instead of enqueueing them
    pub fn with_task_filter(mut self, enabled: bool) -> Self {
        self.filter_degenerate_tasks = enabled;
        self
    }

    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn ceiling(&self) -> u32 {
        self.limits.ceiling(self.credential)
    }

    /// Run the agent until the queue drains, the ceiling is hit, a fatal
    /// error occurs or the run is stopped. Shutdown is signalled exactly once.
    #[instrument(skip(self), fields(agent = %self.name, ceiling = self.ceiling()))]
    pub async fn run(mut self) -> RunReport {
        info!(goal_len = self.goal.len(), "Starting agent");

        let outcome = self.drive().await;
        match &outcome {
            RunOutcome::Cancelled => debug!("Run cancelled"),
            RunOutcome::Failed(e) => warn!(error = %e, "Run failed"),
            other => info!(outcome = ?other, loops = self.state.loops, "Run finished"),
        }
        self.shared.shutdown();

        RunReport {
            outcome,
            loops: self.state.loops,
            pending_tasks: self.state.pending(),
            completed_tasks: self.state.completed,
        }
    }

    fn cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    fn emit(&self, message: AgentMessage) {
        self.shared.emit(message);
    }

    /// Sleep unless cancelled first; false means the run was cancelled
    async fn pause(&self, delay: Duration) -> bool {
        if !delay.is_zero() {
            tokio::select! {
                _ = self.shared.cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }
        }
        !self.cancelled()
    }

    /// Report a fatal error unless the run was cancelled meanwhile
    fn fail(&self, err: AgentError) -> RunOutcome {
        if self.cancelled() {
            return RunOutcome::Cancelled;
        }
        self.emit(AgentMessage::system(err.user_message()));
        RunOutcome::Failed(err)
    }

    async fn drive(&mut self) -> RunOutcome {
        self.emit(AgentMessage::goal(self.goal.clone()));
        self.emit(AgentMessage::Thinking);

        if self.credential == CredentialSource::User {
            if let Err(e) = self.gateway.probe().await {
                return self.fail(AgentError::from_probe(e));
            }
            if self.cancelled() {
                return RunOutcome::Cancelled;
            }
        }

        let initial = match self.gateway.fetch_initial_tasks(&self.name, &self.goal).await {
            Ok(tasks) => tasks,
            Err(e) => return self.fail(AgentError::from_provider(e)),
        };
        if self.enqueue(initial).await.is_none() {
            return RunOutcome::Cancelled;
        }

        loop {
            if self.cancelled() {
                return RunOutcome::Cancelled;
            }

            if self.state.queue.is_empty() {
                self.emit(AgentMessage::system(COMPLETED_MESSAGE));
                return RunOutcome::Completed;
            }

            self.state.loops += 1;
            let ceiling = self.ceiling();
            debug!(iteration = self.state.loops, ceiling, "Starting loop step");
            if self.state.loops > ceiling {
                let message = match self.credential {
                    CredentialSource::User => user_ceiling_message(ceiling),
                    CredentialSource::Fallback => DEMO_CEILING_MESSAGE.to_string(),
                };
                self.emit(AgentMessage::system(message));
                return RunOutcome::CeilingReached;
            }

            if !self.pause(self.pacing.step).await {
                return RunOutcome::Cancelled;
            }

            let Some(task) = self.state.start_next() else {
                continue;
            };
            self.emit(AgentMessage::Thinking);

            let result = match self.gateway.execute_task(&self.name, &self.goal, &task).await {
                Ok(result) => result,
                Err(e) => return self.fail(AgentError::from_execution(e)),
            };
            if self.cancelled() {
                return RunOutcome::Cancelled;
            }
            self.emit(AgentMessage::execution(&task, result.clone()));

            if !self.pause(self.pacing.step).await {
                return RunOutcome::Cancelled;
            }
            self.emit(AgentMessage::Thinking);

            let pending = self.state.pending();
            let followups = self
                .gateway
                .fetch_followup_tasks(&self.goal, &pending, &task, &result, &self.state.completed)
                .await;

            match followups {
                Ok(tasks) => match self.enqueue(tasks).await {
                    Some(0) => self.emit(AgentMessage::action(NO_NEW_TASKS_INFO, "")),
                    Some(_) => {}
                    None => return RunOutcome::Cancelled,
                },
                Err(e) => {
                    let err = AgentError::FollowupGenerationFailure(e);
                    warn!(error = %err, "Continuing with the remaining queue");
                    self.emit(AgentMessage::system(err.user_message()));
                    self.emit(AgentMessage::action(NO_NEW_TASKS_INFO, ""));
                }
            }
        }
    }

    /// Append generated tasks and announce each one after the task pacing
    /// delay. Returns the number enqueued, or None if cancelled.
    async fn enqueue(&mut self, tasks: Vec<String>) -> Option<usize> {
        if self.cancelled() {
            return None;
        }

        let mut added = Vec::with_capacity(tasks.len());
        for task in tasks {
            if !is_real_task(&task) {
                if self.filter_degenerate_tasks {
                    debug!(task = %task, "Dropping degenerate task");
                    continue;
                }
                warn!(task = %task, "Enqueueing a task that looks like a non-answer");
            }
            added.push(task);
        }

        self.state.queue.extend(added.iter().cloned());
        for task in &added {
            if !self.pause(self.pacing.task).await {
                return None;
            }
            self.emit(AgentMessage::task(task.clone()));
        }

        Some(added.len())
    }
}
