//! Process lifecycle: build the shared server manager, the model provider,
//! the agent and the sync engine, run one mode, then tear everything down in
//! reverse order.

use crate::cli::{Cli, RunMode};
use crate::stdio::{self, StdioError};
use orrery_core::application::agent::{Agent, AgentRecord, CompletionTarget, PersistError};
use orrery_core::application::sync::ContentSyncEngine;
use orrery_core::application::tooling::{ServerManager, ToolServerInterface};
use orrery_core::config::{AppConfig, ConfigError};
use orrery_core::domain::content::InboxMessage;
use orrery_core::domain::types::MessageRole;
use orrery_core::infrastructure::model::{DynamicModelProvider, ModelProvider};
use serde_json::json;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent state: {0}")]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Stdio(#[from] StdioError),
    #[error("a prompt is required in `once` mode")]
    MissingPrompt,
    #[error("failed to serialize output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Everything one process run owns.
pub struct Session {
    pub manager: Arc<ServerManager>,
    pub agent: Arc<Agent>,
    pub sync: Option<ContentSyncEngine>,
    state_path: Option<PathBuf>,
}

impl Session {
    /// Connects the configured servers and creates (or restores) the agent.
    ///
    /// Unreachable servers are logged and left disconnected; only invalid
    /// configuration fails here.
    pub async fn open(
        config: &AppConfig,
        manager: Arc<ServerManager>,
        provider: Arc<dyn ModelProvider>,
        state_path: Option<PathBuf>,
    ) -> Result<Self, RuntimeError> {
        let summary = manager.initialize(config.servers.clone()).await?;
        info!(
            connected = summary.connected,
            failed = summary.failed,
            tools = summary.total_tools,
            "Tool servers initialized"
        );
        for failure in &summary.failures {
            warn!(server = %failure.server, reason = %failure.reason, "Tool server unavailable");
        }
        if summary.total > 0 && !summary.has_connected_servers() {
            warn!("No tool servers connected; the agent runs without tools");
        }

        let servers: Arc<dyn ToolServerInterface> = manager.clone();
        let target = CompletionTarget::from_config(config);
        let agent = match state_path.as_deref().filter(|path| path.exists()) {
            Some(path) => {
                let record = AgentRecord::load(path)?;
                info!(agent = %record.name, path = %path.display(), "Restoring agent from saved state");
                Agent::from_record(record, &config.agent, target, servers.clone(), provider)
            }
            None => Agent::new(&config.agent, target, servers.clone(), provider),
        };
        let agent = Arc::new(agent);

        let sync = if config.sync.enabled {
            let engine = ContentSyncEngine::new(servers, config.sync.clone());
            engine.set_active_agent(Some(agent.clone()));
            engine.start();
            Some(engine)
        } else {
            debug!("Content sync disabled");
            None
        };

        Ok(Self {
            manager,
            agent,
            sync,
            state_path,
        })
    }

    /// Stops sync, persists and disposes the agent, then closes every
    /// server connection. Connections are closed even when persisting fails.
    pub async fn close(self) -> Result<(), RuntimeError> {
        if let Some(sync) = &self.sync {
            sync.stop();
        }

        let saved = match &self.state_path {
            Some(path) => save_record(&self.agent, path),
            None => Ok(()),
        };
        if let Err(error) = self.agent.export_transcript() {
            warn!(%error, "Failed to export transcript");
        }
        self.agent.dispose();
        self.manager.close_all().await;
        saved
    }
}

fn save_record(agent: &Agent, path: &Path) -> Result<(), RuntimeError> {
    agent.to_record().save(path)?;
    info!(agent = %agent.name(), path = %path.display(), "Agent state saved");
    Ok(())
}

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    init_tracing(cli.mode);
    debug!(mode = ?cli.mode, config = ?cli.config, "CLI arguments parsed");

    let config = AppConfig::load(cli.config.as_deref().map(Path::new))?;
    let provider: Arc<dyn ModelProvider> =
        Arc::new(DynamicModelProvider::from_configs(&config.providers));
    let manager = Arc::new(ServerManager::new());
    let session = Session::open(
        &config,
        manager,
        provider,
        cli.agent_state.as_ref().map(PathBuf::from),
    )
    .await?;

    let outcome = match cli.mode {
        RunMode::Tools => print_catalog(&session),
        RunMode::Once => run_once(&session, &cli.sender, &cli.prompt).await,
        RunMode::Stdio => stdio::run(&session).await.map_err(RuntimeError::from),
    };
    let closed = session.close().await;
    outcome?;
    closed?;
    Ok(())
}

fn print_catalog(session: &Session) -> Result<(), RuntimeError> {
    let manager = &session.manager;
    let output = json!({
        "servers": stdio::servers_json(session),
        "tools": manager.get_all_tools(),
        "resources": manager.list_resources(),
        "prompts": manager.list_prompts(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_once(session: &Session, sender: &str, prompt: &[String]) -> Result<(), RuntimeError> {
    let prompt = prompt.join(" ");
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(RuntimeError::MissingPrompt);
    }

    let agent = &session.agent;
    agent.push_inbox(InboxMessage::new(sender, prompt));
    let report = agent.think().await;
    let reply = last_reply(agent);

    let output = json!({
        "agent": agent.name(),
        "reply": reply,
        "status": agent.status(),
        "error": report.error,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Content of the latest assistant message that answered rather than
/// called tools.
pub(crate) fn last_reply(agent: &Agent) -> Option<String> {
    agent
        .history()
        .into_iter()
        .rev()
        .find(|message| message.role == MessageRole::Assistant && !message.has_tool_calls())
        .map(|message| message.content)
}

/// Logs go to stderr; stdout carries only responses. STDIO mode defaults to
/// `warn` so the JSON-lines channel stays readable in a terminal.
fn init_tracing(mode: RunMode) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let default = match mode {
            RunMode::Stdio => "warn",
            _ => "info",
        };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
