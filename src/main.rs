use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trellis_core::config::{AppConfig, RetryConfig};
use trellis_core::error::TrellisError;
use trellis_core::event::EventBus;
use trellis_core::traits::LlmClient;
use trellis_core::types::RunId;

use trellis_agent::{PevController, RunLogger};
use trellis_llm::{LlmReasoner, RetryingClient};

const SYSTEM_PROMPT: &str =
    "You are a careful research assistant. Follow the requested output format exactly.";

#[derive(Parser)]
#[command(name = "trellis", version, about = "Plan-Execute-Verify research agent")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "trellis.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one goal and exit
    Run {
        /// The goal; read from stdin when empty
        #[arg(trailing_var_arg = true)]
        goal: Vec<String>,
    },
    /// Read goals line by line until EOF
    Repl,
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trellis=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        let home_config = dirs_home().map(|h| h.join(".trellis").join("config.toml"));
        match home_config {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading config from home directory");
                AppConfig::load(&path)?
            }
            _ => {
                eprintln!(
                    "Warning: No config file found. Set OPENAI_API_KEY (or ANTHROPIC_API_KEY) \
                     and TAVILY_API_KEY, or create trellis.toml"
                );
                env_config()?
            }
        }
    };

    if let Some(Commands::Config) = cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let event_bus = Arc::new(EventBus::default());
    let controller = build_controller(&config)?.with_events(event_bus.clone());

    match cli.command {
        Some(Commands::Run { goal }) => {
            let mut goal = goal.join(" ");
            if goal.trim().is_empty() {
                goal = io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            if goal.trim().is_empty() {
                anyhow::bail!("no goal given");
            }
            run_goal(&controller, &event_bus, &config, goal.trim()).await?;
        }
        Some(Commands::Repl) | None => {
            let stdin = io::stdin();
            loop {
                print!("goal> ");
                io::stdout().flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let goal = line.trim();
                if goal.is_empty() {
                    continue;
                }
                if matches!(goal, "exit" | "quit") {
                    break;
                }
                if let Err(e) = run_goal(&controller, &event_bus, &config, goal).await {
                    eprintln!("Error: {:#}", e);
                }
            }
        }
        Some(Commands::Config) => {}
    }

    Ok(())
}

/// Reasoner, search backend and PEV graph from config.
fn build_controller(config: &AppConfig) -> anyhow::Result<PevController> {
    let primary = trellis_llm::create_client(&config.model);
    let llm: Arc<dyn LlmClient> =
        if !config.fallback_models.is_empty() || config.model.retry.is_some() {
            let retry_config = config.model.retry.clone().unwrap_or_else(RetryConfig::default);
            let fallbacks: Vec<_> = config
                .fallback_models
                .iter()
                .map(|mc| (mc.clone(), trellis_llm::create_client(mc)))
                .collect();
            Arc::new(RetryingClient::new(primary, fallbacks, retry_config))
        } else {
            Arc::from(primary)
        };
    let reasoner =
        Arc::new(LlmReasoner::new(llm, config.model.clone()).with_system_prompt(SYSTEM_PROMPT));

    let search_config = config
        .search
        .as_ref()
        .context("missing [search] section in config")?;
    let search = trellis_tools::create_search(search_config)?;
    info!(
        model = %config.model.model_id,
        search = search.name(),
        max_planning_attempts = config.pev.max_planning_attempts,
        "PEV controller ready"
    );

    Ok(PevController::new(reasoner, search, config.pev.clone())?)
}

/// Run one goal, printing the final answer. Ctrl-C cancels between nodes.
async fn run_goal(
    controller: &PevController,
    event_bus: &Arc<EventBus>,
    config: &AppConfig,
    goal: &str,
) -> anyhow::Result<()> {
    let run_id = RunId::new();
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    let watcher = tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        ctrl_c.cancel();
    });

    let logger = config.log_dir().map(|log_dir| {
        let level = config.log.as_ref().map(|l| l.level).unwrap_or(2);
        RunLogger::new(log_dir, level).spawn(event_bus, run_id.clone(), CancellationToken::new())
    });

    let result = controller.run_with_cancel(run_id, goal, &cancel).await;
    watcher.abort();
    if let Some(handle) = logger {
        if tokio::time::timeout(Duration::from_secs(2), handle).await.is_err() {
            warn!("Run logger did not finish in time");
        }
    }

    match result {
        Ok(result) => {
            info!(
                steps = result.trace.len(),
                planning_attempts = result.state.retry_count,
                elapsed_ms = result.total_elapsed_ms,
                "Run finished"
            );
            println!("{}", result.answer());
            Ok(())
        }
        Err(TrellisError::Cancelled(node)) => {
            eprintln!("Cancelled before '{}'", node);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Minimal config from environment variables, used when no file exists.
fn env_config() -> anyhow::Result<AppConfig> {
    let (provider, model_id, key_var) = if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        ("anthropic", "claude-sonnet-4-20250514", "ANTHROPIC_API_KEY")
    } else {
        ("openai", "gpt-4o", "OPENAI_API_KEY")
    };

    let mut toml = format!(
        "[model]\nprovider = \"{}\"\nmodel_id = \"{}\"\napi_key = \"${{{}}}\"\n",
        provider, model_id, key_var
    );
    if std::env::var("TAVILY_API_KEY").is_ok() {
        toml.push_str("\n[search]\napi_key = \"${TAVILY_API_KEY}\"\n");
    }
    Ok(AppConfig::from_toml(&toml)?)
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
