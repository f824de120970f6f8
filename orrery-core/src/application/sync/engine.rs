use super::backoff::BackoffPolicy;
use super::parse::parse_content;
use crate::application::agent::Agent;
use crate::application::tooling::{ToolError, ToolServerInterface, ensure_success};
use crate::config::SyncConfig;
use crate::domain::content::{ContentKind, RemoteContent};
use futures::future::join_all;
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync tool failed: {0}")]
    Tool(#[from] ToolError),
    #[error("{kind} sync abandoned after {attempts} attempts: {last_error}")]
    Exhausted {
        kind: ContentKind,
        attempts: u32,
        last_error: String,
    },
}

/// Bookkeeping for one kind's retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncAttempt {
    pub agent_id: String,
    pub kind: ContentKind,
    pub attempt: u32,
    pub next_delay: Option<Duration>,
    pub deadline: Instant,
}

/// Outcome of one `fetch_agent_content` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub synced: Vec<ContentKind>,
    pub failed: Vec<(ContentKind, String)>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Never started.
    Idle,
    Running,
    Paused,
    /// Terminal until the next `start`.
    Stopped,
}

#[derive(Clone)]
struct SyncControl {
    phase: SyncPhase,
    agent: Option<Arc<Agent>>,
}

/// Fetches content through the server manager and applies it to agents.
struct SyncWorker {
    servers: Arc<dyn ToolServerInterface>,
    config: SyncConfig,
    policy: BackoffPolicy,
}

/// Keeps one active agent's remote content fresh.
///
/// Only one agent is targeted at a time; switching agents cancels the
/// in-flight tick and restarts the timer for the new one. Pausing keeps the
/// target.
pub struct ContentSyncEngine {
    worker: Arc<SyncWorker>,
    control: watch::Sender<SyncControl>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ContentSyncEngine {
    pub fn new(servers: Arc<dyn ToolServerInterface>, config: SyncConfig) -> Self {
        let policy = BackoffPolicy::from_config(&config);
        let (control, _) = watch::channel(SyncControl {
            phase: SyncPhase::Idle,
            agent: None,
        });
        Self {
            worker: Arc::new(SyncWorker {
                servers,
                config,
                policy,
            }),
            control,
            task: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.worker.policy
    }

    pub fn phase(&self) -> SyncPhase {
        self.control.borrow().phase
    }

    pub fn active_agent_id(&self) -> Option<String> {
        self.control
            .borrow()
            .agent
            .as_ref()
            .map(|agent| agent.id().to_string())
    }

    /// Starts the timer task. Must be called inside a tokio runtime.
    /// Does nothing if already running or paused.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(self.phase(), SyncPhase::Running | SyncPhase::Paused)
            && task.as_ref().is_some_and(|handle| !handle.is_finished())
        {
            return;
        }
        self.control.send_modify(|control| control.phase = SyncPhase::Running);
        let worker = Arc::clone(&self.worker);
        let receiver = self.control.subscribe();
        *task = Some(tokio::spawn(run_loop(worker, receiver)));
        info!(
            interval_secs = self.worker.config.interval.as_secs_f64(),
            "Content sync started"
        );
    }

    /// Stops the timer and cancels any in-flight sync. The active agent is
    /// kept so a later `start` resumes with it.
    pub fn stop(&self) {
        self.control.send_modify(|control| control.phase = SyncPhase::Stopped);
        if let Some(handle) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        info!("Content sync stopped");
    }

    pub fn pause(&self) {
        self.control.send_if_modified(|control| {
            if control.phase == SyncPhase::Running {
                control.phase = SyncPhase::Paused;
                true
            } else {
                false
            }
        });
    }

    pub fn resume(&self) {
        self.control.send_if_modified(|control| {
            if control.phase == SyncPhase::Paused {
                control.phase = SyncPhase::Running;
                true
            } else {
                false
            }
        });
    }

    /// Retargets the timer. `None` leaves the engine running with nothing
    /// to sync.
    pub fn set_active_agent(&self, agent: Option<Arc<Agent>>) {
        debug!(
            agent = agent.as_ref().map(|a| a.name()),
            "Content sync target changed"
        );
        self.control.send_modify(|control| control.agent = agent);
    }

    /// Fetches every configured content kind for `agent`, each with its own
    /// retry budget. Fetched kinds are applied; exhausted kinds leave the
    /// agent's content as it was.
    pub async fn fetch_agent_content(&self, agent: &Agent) -> SyncReport {
        self.worker.fetch_agent_content(agent).await
    }
}

impl Drop for ContentSyncEngine {
    fn drop(&mut self) {
        if let Some(handle) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

async fn run_loop(worker: Arc<SyncWorker>, mut control: watch::Receiver<SyncControl>) {
    loop {
        let current = control.borrow_and_update().clone();
        let agent = match (current.phase, current.agent) {
            (SyncPhase::Stopped, _) => break,
            (SyncPhase::Running, Some(agent)) => agent,
            _ => {
                if control.changed().await.is_err() {
                    break;
                }
                continue;
            }
        };

        tokio::select! {
            _ = worker.fetch_agent_content(&agent) => {}
            changed = control.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!("Sync tick interrupted by a control change");
                continue;
            }
        }

        tokio::select! {
            _ = sleep(worker.config.interval) => {}
            changed = control.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Content sync loop exited");
}

impl SyncWorker {
    async fn fetch_agent_content(&self, agent: &Agent) -> SyncReport {
        let kinds = self.config.kinds();
        let outcomes = join_all(kinds.iter().map(|kind| self.sync_kind(agent, *kind))).await;

        let mut report = SyncReport::default();
        for (kind, outcome) in kinds.into_iter().zip(outcomes) {
            match outcome {
                Ok(content) => {
                    agent.apply_remote_content(content);
                    report.synced.push(kind);
                }
                Err(err) => {
                    warn!(agent = %agent.name(), %kind, %err, "Content sync gave up; keeping stale content");
                    agent.report_error(err.to_string());
                    report.failed.push((kind, err.to_string()));
                }
            }
        }
        debug!(
            agent = %agent.name(),
            synced = report.synced.len(),
            failed = report.failed.len(),
            "Content sync tick finished"
        );
        report
    }

    async fn sync_kind(&self, agent: &Agent, kind: ContentKind) -> Result<RemoteContent, SyncError> {
        let mut attempt = SyncAttempt {
            agent_id: agent.id().to_string(),
            kind,
            attempt: 0,
            next_delay: self.policy.delay_for(0),
            deadline: Instant::now() + self.policy.ceiling,
        };

        loop {
            attempt.attempt += 1;
            let error = match self.fetch_once(agent, kind).await {
                Ok(content) => return Ok(content),
                Err(err) => err,
            };

            let retry = (attempt.attempt - 1) as usize;
            attempt.next_delay = self.policy.delay_for(retry);
            let delay = match attempt.next_delay {
                Some(delay) if Instant::now() + delay <= attempt.deadline => delay,
                _ => {
                    return Err(SyncError::Exhausted {
                        kind,
                        attempts: attempt.attempt,
                        last_error: error.to_string(),
                    });
                }
            };
            debug!(
                agent = %attempt.agent_id,
                %kind,
                attempt = attempt.attempt,
                delay_ms = delay.as_millis() as u64,
                %error,
                "Content sync failed; retrying"
            );
            sleep(delay).await;
        }
    }

    async fn fetch_once(&self, agent: &Agent, kind: ContentKind) -> Result<RemoteContent, SyncError> {
        let Some(tool) = self.config.tool_for(kind) else {
            return Err(ToolError::UnknownTool(kind.to_string()).into());
        };
        let arguments = json!({
            "agent_id": agent.id(),
            "agent_name": agent.name(),
        });
        let result = self
            .servers
            .call_tool(&self.config.server, tool, arguments)
            .await?;
        let result = ensure_success(tool, result)?;
        Ok(parse_content(kind, &result.text_content()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::agent::CompletionTarget;
    use crate::application::status::AgentStatus;
    use crate::config::AgentSettings;
    use crate::domain::tool::{ToolCallResult, ToolDescriptor};
    use crate::infrastructure::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
    use async_trait::async_trait;
    use serde_json::Value;

    type Behavior = dyn Fn(&str, usize) -> Result<ToolCallResult, ToolError> + Send + Sync;

    struct ContentServer {
        behavior: Box<Behavior>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl ContentServer {
        fn new(
            behavior: impl Fn(&str, usize) -> Result<ToolCallResult, ToolError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                behavior: Box::new(behavior),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls_to(&self, tool: &str) -> Vec<Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(name, _)| name == tool)
                .map(|(_, args)| args.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ToolServerInterface for ContentServer {
        fn all_tools(&self) -> Vec<ToolDescriptor> {
            vec![
                ToolDescriptor::new("content", "read_notepad"),
                ToolDescriptor::new("content", "read_todo"),
            ]
        }

        fn find_server_for_tool(&self, _tool: &str) -> Option<String> {
            Some("content".into())
        }

        async fn call_tool(
            &self,
            _server: &str,
            tool: &str,
            arguments: Value,
        ) -> Result<ToolCallResult, ToolError> {
            let previous = self.calls_to(tool).len();
            self.calls.lock().unwrap().push((tool.to_string(), arguments));
            (self.behavior)(tool, previous)
        }
    }

    struct SilentProvider;

    #[async_trait]
    impl ModelProvider for SilentProvider {
        async fn chat(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
            Ok(ModelResponse::new("ok", None))
        }
    }

    fn config() -> SyncConfig {
        SyncConfig {
            enabled: true,
            server: "content".into(),
            interval: Duration::from_secs(10),
            base_delay: Duration::from_secs(1),
            ceiling: Duration::from_secs(30),
            notepad_tool: Some("read_notepad".into()),
            todo_tool: Some("read_todo".into()),
            inbox_tool: None,
        }
    }

    fn agent(name: &str, servers: Arc<ContentServer>) -> Arc<Agent> {
        let settings = AgentSettings {
            name: name.into(),
            ..AgentSettings::default()
        };
        let target = CompletionTarget {
            provider: "p".into(),
            model: "m".into(),
            max_rounds: 1,
        };
        Arc::new(Agent::new(&settings, target, servers, Arc::new(SilentProvider)))
    }

    fn down() -> Result<ToolCallResult, ToolError> {
        Err(ToolError::unavailable("content", "connection refused"))
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_keeps_stale_content_within_ceiling() {
        let server = ContentServer::new(|_, _| down());
        let agent = agent("ann", server.clone());
        agent.apply_remote_content(RemoteContent::Notepad("old".into()));
        let engine = ContentSyncEngine::new(server.clone(), config());

        let started = Instant::now();
        let report = engine.fetch_agent_content(&agent).await;

        assert!(started.elapsed() <= Duration::from_secs(30));
        assert_eq!(started.elapsed(), engine.policy().total_delay());
        assert_eq!(report.failed.len(), 2);
        assert_eq!(agent.notepad().as_deref(), Some("old"));
        assert_eq!(server.calls_to("read_notepad").len(), 5);
        assert_eq!(agent.status().status.label(), "error");
    }

    #[tokio::test(start_paused = true)]
    async fn kinds_succeed_and_fail_independently() {
        let server = ContentServer::new(|tool, _| match tool {
            "read_notepad" => Ok(ToolCallResult::text("fresh notes")),
            _ => Ok(ToolCallResult::error("todo store offline")),
        });
        let agent = agent("ann", server.clone());
        agent.push_todo("keep me");
        let engine = ContentSyncEngine::new(server.clone(), config());

        let report = engine.fetch_agent_content(&agent).await;

        assert_eq!(report.synced, vec![ContentKind::Notepad]);
        assert_eq!(report.failed[0].0, ContentKind::Todo);
        assert_eq!(agent.notepad().as_deref(), Some("fresh notes"));
        assert_eq!(agent.todo(), vec!["keep me"]);
        assert!(agent.last_synced(ContentKind::Notepad).is_some());
        assert!(agent.last_synced(ContentKind::Todo).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_recover_after_backoff() {
        let server = ContentServer::new(|tool, previous| match (tool, previous) {
            ("read_notepad", 0 | 1) => down(),
            ("read_notepad", _) => Ok(ToolCallResult::text("third time")),
            _ => Ok(ToolCallResult::text(r#"["a", "b"]"#)),
        });
        let agent = agent("ann", server.clone());
        let engine = ContentSyncEngine::new(server.clone(), config());

        let started = Instant::now();
        let report = engine.fetch_agent_content(&agent).await;

        assert!(report.is_complete());
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(agent.notepad().as_deref(), Some("third time"));
        assert_eq!(agent.todo(), vec!["a", "b"]);
        assert_eq!(agent.status().status, AgentStatus::Idle);
        let args = &server.calls_to("read_notepad")[0];
        assert_eq!(args["agent_id"], agent.id());
        assert_eq!(args["agent_name"], "ann");
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_follows_the_active_agent() {
        let server = ContentServer::new(|_, _| Ok(ToolCallResult::text("[]")));
        let first = agent("first", server.clone());
        let second = agent("second", server.clone());
        let engine = ContentSyncEngine::new(server.clone(), config());
        let ticks = || server.calls_to("read_notepad");

        engine.set_active_agent(Some(first.clone()));
        engine.start();
        assert_eq!(engine.phase(), SyncPhase::Running);
        sleep(Duration::from_secs(25)).await;
        assert_eq!(ticks().len(), 3);

        engine.pause();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks().len(), 3);
        assert_eq!(engine.active_agent_id().as_deref(), Some(first.id()));

        engine.resume();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks().len(), 4);

        engine.set_active_agent(Some(second.clone()));
        sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks().last().unwrap()["agent_id"], second.id());

        engine.stop();
        let stopped_at = ticks().len();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks().len(), stopped_at);
        assert_eq!(engine.phase(), SyncPhase::Stopped);

        engine.start();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks().len(), stopped_at + 1);
    }
}
