//! taskpilot-core: Goal-driven task loop over an LLM provider
//!
//! Provides:
//! - Configuration loading (taskpilot.toml)
//! - OpenAI-compatible chat completion client
//! - Prompt templates and the model gateway built on them
//! - Response parsing for task arrays
//! - The agent loop that owns the task queue

pub mod agent;
pub mod config;
pub mod error;
pub mod gateway;
pub mod openai;
pub mod parser;
pub mod prompts;

pub use agent::{
    Agent, AgentHandle, AgentMessage, AgentSink, LoopLimits, Pacing, RunOutcome, RunReport,
};
pub use config::{Config, CredentialSource, EffectiveSettings, ModelSettings};
pub use error::{AgentError, ProviderError};
pub use gateway::{ModelGateway, OpenAiGateway};
pub use openai::{ChatMessage, CompletionRequest, OpenAiClient, Role};
pub use parser::{extract_array, is_real_task};
pub use prompts::PromptSet;
