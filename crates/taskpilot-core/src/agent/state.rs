//! Agent state management

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::{AgentSettings, CredentialSource};
use crate::error::AgentError;

/// Loop ceilings per credential source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    pub fallback: u32,
    pub user: u32,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            fallback: 4,
            user: 50,
        }
    }
}

impl LoopLimits {
    pub fn ceiling(&self, credential: CredentialSource) -> u32 {
        match credential {
            CredentialSource::User => self.user,
            CredentialSource::Fallback => self.fallback,
        }
    }
}

impl From<&AgentSettings> for LoopLimits {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            fallback: settings.fallback_loop_ceiling,
            user: settings.user_loop_ceiling,
        }
    }
}

/// Cosmetic delays between emitted messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Before each announced task
    pub task: Duration,
    /// Before executing a task and before fetching follow-ups
    pub step: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            task: Duration::from_millis(800),
            step: Duration::from_millis(1000),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            task: Duration::ZERO,
            step: Duration::ZERO,
        }
    }
}

impl From<&AgentSettings> for Pacing {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            task: settings.task_pacing(),
            step: settings.step_pacing(),
        }
    }
}

/// Task bookkeeping for one run
#[derive(Debug, Default)]
pub struct TaskState {
    /// Pending tasks, front executes next
    pub queue: VecDeque<String>,
    /// Popped tasks, including the one executing
    pub completed: Vec<String>,
    /// Loop steps started so far
    pub loops: u32,
}

impl TaskState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the next task and record it as completed before it runs
    pub fn start_next(&mut self) -> Option<String> {
        let task = self.queue.pop_front()?;
        self.completed.push(task.clone());
        Some(task)
    }

    pub fn pending(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// The queue drained
    Completed,
    /// The loop ceiling was exceeded
    CeilingReached,
    /// Manually stopped
    Cancelled,
    /// Fatal error from the probe, initial fetch or a task execution
    Failed(AgentError),
}

/// Summary returned by [`crate::Agent::run`]
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub loops: u32,
    pub completed_tasks: Vec<String>,
    pub pending_tasks: Vec<String>,
}
