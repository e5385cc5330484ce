//! Messages emitted by the agent and the sink that receives them

use serde::{Deserialize, Serialize};

/// A discrete message for the rendering collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentMessage {
    /// The goal being pursued
    Goal { value: String },
    /// Spinner signal, no payload
    Thinking,
    /// A task was added to the queue
    Task { value: String },
    /// Execution result or status announcement
    Action { info: String, value: String },
    /// Error or lifecycle status
    System { value: String },
}

impl AgentMessage {
    pub fn goal(value: impl Into<String>) -> Self {
        Self::Goal {
            value: value.into(),
        }
    }

    pub fn task(value: impl Into<String>) -> Self {
        Self::Task {
            value: value.into(),
        }
    }

    pub fn action(info: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Action {
            info: info.into(),
            value: value.into(),
        }
    }

    pub fn system(value: impl Into<String>) -> Self {
        Self::System {
            value: value.into(),
        }
    }

    pub fn execution(task: &str, result: impl Into<String>) -> Self {
        Self::action(format!("Executing \"{task}\""), result)
    }
}

/// Receives agent output. `shutdown` is called exactly once per run.
pub trait AgentSink: Send + Sync {
    fn render(&self, message: AgentMessage);

    fn shutdown(&self);
}

pub(crate) const COMPLETED_MESSAGE: &str = "All tasks completed. Shutting down.";
pub(crate) const MANUAL_SHUTDOWN_MESSAGE: &str = "The agent has been manually shut down.";
pub(crate) const NO_NEW_TASKS_INFO: &str = "All tasks completed!";
pub(crate) const DEMO_CEILING_MESSAGE: &str = "We're sorry, because this is a demo, we cannot have our agents running for too long. If you would like to run longer, please provide your own API key. Shutting down.";

pub(crate) fn user_ceiling_message(ceiling: u32) -> String {
    format!(
        "This agent has been running for too long ({ceiling} loops). To save your wallet, this agent is shutting down."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_wire_shape() {
        assert_eq!(
            serde_json::to_value(AgentMessage::goal("Plan")).unwrap(),
            json!({"type": "goal", "value": "Plan"})
        );
        assert_eq!(
            serde_json::to_value(AgentMessage::Thinking).unwrap(),
            json!({"type": "thinking"})
        );
        assert_eq!(
            serde_json::to_value(AgentMessage::execution("Book a venue", "Done")).unwrap(),
            json!({"type": "action", "info": "Executing \"Book a venue\"", "value": "Done"})
        );
    }

    #[test]
    fn test_ceiling_message_names_limit() {
        assert!(user_ceiling_message(50).contains("(50 loops)"));
    }
}
