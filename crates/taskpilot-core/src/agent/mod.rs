//! Goal-driven agent: initial task list, then execute and extend the
//! queue one task at a time until it drains or a ceiling is hit.

mod agent_loop;
mod events;
mod state;

pub use agent_loop::{Agent, AgentHandle};
pub use events::{AgentMessage, AgentSink};
pub use state::{LoopLimits, Pacing, RunOutcome, RunReport, TaskState};
