//! CLI commands implementation

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use taskpilot_core::{
    Agent, AgentHandle, AgentSink, Config, EffectiveSettings, LoopLimits, ModelGateway, ModelSettings,
    OpenAiClient, OpenAiGateway, Pacing, PromptSet, RunOutcome,
};

use crate::render::{JsonSink, TerminalSink};

// ANSI color codes
const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Per-invocation overrides for the model settings
#[derive(Debug, Clone, Default)]
pub struct ModelArgs {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

impl ModelArgs {
    fn settings(&self) -> ModelSettings {
        ModelSettings {
            api_key: self.api_key.clone().unwrap_or_default(),
            model_name: self.model.clone().unwrap_or_default(),
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub goal: String,
    pub name: Option<String>,
    pub language: Option<String>,
    pub json: bool,
    pub no_pacing: bool,
    pub model: ModelArgs,
}

/// Load the explicit config file if given, otherwise search for one
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load_from(path)?.with_env_overrides()),
        None => Config::load().context("Failed to load configuration"),
    }
}

fn build_gateway(config: &Config, model: &ModelArgs, language: Option<String>) -> Result<OpenAiGateway> {
    let effective = EffectiveSettings::resolve(&model.settings(), &config.provider)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    debug!(
        model = %effective.model,
        credential = ?effective.credential,
        base_url = %config.provider.base_url,
        "Resolved model settings"
    );

    let client = OpenAiClient::new(
        config.provider.base_url.clone(),
        Duration::from_secs(config.provider.timeout_secs),
    )
    .context("Failed to create HTTP client")?;

    let prompts = PromptSet::new().with_language(language);
    Ok(OpenAiGateway::new(client, effective, prompts))
}

/// What a Ctrl-C did to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Stopped,
    Exit,
}

/// The first interrupt stops the agent; any later one asks to exit
fn on_interrupt(handle: &AgentHandle) -> Interrupt {
    if handle.is_running() {
        handle.stop();
        Interrupt::Stopped
    } else {
        Interrupt::Exit
    }
}

/// Run the agent against a goal until it finishes or is interrupted
pub async fn run(config: Config, args: RunArgs) -> Result<()> {
    if args.goal.trim().is_empty() {
        anyhow::bail!("A goal is required");
    }

    let language = args.language.clone().or_else(|| config.agent.language.clone());
    let gateway = build_gateway(&config, &args.model, language)?;
    let credential = gateway.credential();

    let sink: Arc<dyn AgentSink> = if args.json {
        Arc::new(JsonSink)
    } else {
        Arc::new(TerminalSink::new())
    };

    let pacing = if args.no_pacing {
        Pacing::none()
    } else {
        Pacing::from(&config.agent)
    };
    let name = args.name.clone().unwrap_or_else(|| config.agent.name.clone());

    let agent = Agent::new(name, args.goal.clone(), Arc::new(gateway), credential, sink)
        .with_limits(LoopLimits::from(&config.agent))
        .with_pacing(pacing)
        .with_task_filter(config.agent.filter_degenerate_tasks);

    let handle = agent.handle();
    let ctrl_c = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if on_interrupt(&handle) == Interrupt::Exit {
                eprintln!("{RED}Interrupted again, exiting{RESET}");
                std::process::exit(130);
            }
        }
    });

    let report = agent.run().await;
    ctrl_c.abort();

    info!(
        loops = report.loops,
        completed = report.completed_tasks.len(),
        pending = report.pending_tasks.len(),
        "Agent run finished"
    );

    match report.outcome {
        RunOutcome::Failed(e) => Err(anyhow::Error::new(e).context("Agent run failed")),
        _ => Ok(()),
    }
}

/// Validate a credential with a minimal completion request
pub async fn probe(config: Config, model: ModelArgs) -> Result<()> {
    let gateway = build_gateway(&config, &model, None)?;
    let settings = gateway.settings();

    println!("{}Probing {}{}", BOLD, config.provider.base_url, RESET);
    println!("  Model: {}", settings.model);
    println!("  Credential: {:?}", settings.credential);

    match gateway.probe().await {
        Ok(()) => {
            println!("  {}✓{} Credential accepted", GREEN, RESET);
            Ok(())
        }
        Err(e) => {
            let err = taskpilot_core::AgentError::from_probe(e);
            println!("  {}✗{} {}", RED, RESET, err.user_message());
            Err(anyhow::Error::new(err).context("Credential probe failed"))
        }
    }
}

fn default_config_path() -> Result<PathBuf> {
    Config::user_config_path().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// Write a commented default config file
pub fn config_init(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => default_config_path()?,
    };
    Config::create_default(&path)?;
    println!("{}✓{} Created {}", GREEN, RESET, path.display());
    Ok(())
}

/// Print the merged configuration, hiding the fallback key
pub fn config_show(mut config: Config) -> Result<()> {
    if config.provider.fallback_api_key.is_some() {
        config.provider.fallback_api_key = Some("<set>".to_string());
    }
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}

/// Print where configuration is read from
pub fn config_path() -> Result<()> {
    match Config::find_config_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("No config file found; defaults apply ({} would be used)", default_config_path()?.display()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_args_to_settings() {
        let args = ModelArgs {
            api_key: Some("sk-mine".into()),
            model: None,
            temperature: Some(0.5),
        };
        let settings = args.settings();
        assert_eq!(settings.api_key, "sk-mine");
        assert!(settings.model_name.is_empty());
        assert_eq!(settings.temperature, Some(0.5));
    }

    #[test]
    fn test_build_gateway_requires_a_key() {
        let err = build_gateway(&Config::default(), &ModelArgs::default(), None).unwrap_err();
        assert!(err.to_string().contains("no API key"));
    }

    #[test]
    fn test_build_gateway_with_fallback() {
        let mut config = Config::default();
        config.provider.fallback_api_key = Some("sk-shared".into());

        let gateway = build_gateway(&config, &ModelArgs::default(), None).unwrap();
        assert_eq!(gateway.credential(), taskpilot_core::CredentialSource::Fallback);
        assert_eq!(gateway.settings().model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskpilot.toml");
        std::fs::write(&path, "[agent]\nname = \"Planner\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.agent.name, "Planner");
    }

    struct Discard;

    impl AgentSink for Discard {
        fn render(&self, _message: taskpilot_core::AgentMessage) {}
        fn shutdown(&self) {}
    }

    #[test]
    fn test_second_interrupt_exits() {
        let mut config = Config::default();
        config.provider.fallback_api_key = Some("sk-shared".into());
        let gateway = build_gateway(&config, &ModelArgs::default(), None).unwrap();
        let credential = gateway.credential();

        let agent = Agent::new("TaskPilot", "Goal", Arc::new(gateway), credential, Arc::new(Discard));
        let handle = agent.handle();

        assert_eq!(on_interrupt(&handle), Interrupt::Stopped);
        assert!(!handle.is_running());
        assert_eq!(on_interrupt(&handle), Interrupt::Exit);
    }

    #[tokio::test]
    async fn test_run_rejects_blank_goal() {
        let err = run(Config::default(), RunArgs::default()).await.unwrap_err();
        assert!(err.to_string().contains("goal"));
    }
}
