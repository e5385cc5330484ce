//! taskpilot: run a goal-driven task agent from the terminal
//!
//! The agent asks the model for an initial task list, executes tasks one at
//! a time and asks for follow-up tasks until the queue drains.

mod commands;
mod render;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::{ModelArgs, RunArgs};

#[derive(Debug, Parser)]
#[command(name = "taskpilot")]
#[command(about = "Goal-driven autonomous task agent", version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a taskpilot.toml (default: search upward, then user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ModelOpts {
    /// Personal API key; without one the configured fallback key is used
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model to use (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    temperature: Option<f32>,
}

impl From<ModelOpts> for ModelArgs {
    fn from(opts: ModelOpts) -> Self {
        Self {
            api_key: opts.api_key,
            model: opts.model,
            temperature: opts.temperature,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the agent against a goal
    Run {
        /// The goal to pursue
        #[arg(required = true)]
        goal: Vec<String>,

        /// Name the agent uses for itself
        #[arg(short, long)]
        name: Option<String>,

        /// Language the model should answer in
        #[arg(short, long)]
        language: Option<String>,

        /// Output messages as JSON lines
        #[arg(long)]
        json: bool,

        /// Disable the delays between messages
        #[arg(long)]
        no_pacing: bool,

        #[command(flatten)]
        model: ModelOpts,
    },

    /// Check that the API key is accepted
    Probe {
        #[command(flatten)]
        model: ModelOpts,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Write a commented default config file
    Init {
        /// Where to write it (default: user config dir)
        path: Option<PathBuf>,
    },
    /// Show the effective configuration
    Show,
    /// Show which config file is in use
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            goal,
            name,
            language,
            json,
            no_pacing,
            model,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let args = RunArgs {
                goal: goal.join(" "),
                name,
                language,
                json,
                no_pacing,
                model: model.into(),
            };
            commands::run(config, args).await
        }
        Commands::Probe { model } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::probe(config, model.into()).await
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { path } => commands::config_init(path),
            ConfigAction::Show => commands::config_show(commands::load_config(cli.config.as_deref())?),
            ConfigAction::Path => commands::config_path(),
        },
    }
}
