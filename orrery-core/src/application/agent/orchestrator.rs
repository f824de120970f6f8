//! Per-agent behavior: tool filtering, inbox and to-do draining, lifecycle.

use super::conversation::{CompletionTarget, ConversationManager, ToolDispatcher};
use super::errors::PersistError;
use super::record::AgentRecord;
use super::state::{AgentState, ToolPreferences};
use super::transcript;
use crate::application::status::{AgentStatus, StatusModel, StatusSnapshot};
use crate::application::tooling::{ToolError, ToolServerInterface};
use crate::config::AgentSettings;
use crate::domain::content::{ContentKind, InboxMessage, RemoteContent};
use crate::domain::tool::{ToolCallResult, ToolDescriptor, split_qualified};
use crate::domain::types::ChatMessage;
use crate::infrastructure::model::ModelProvider;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;

/// Change notifications for UI-style observers.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    InboxChanged { pending: usize },
    TodoChanged { pending: usize },
    NotepadChanged,
    PreferencesChanged,
    ContextFilesChanged,
    ContentSynced { kind: ContentKind },
    Replied { content: String },
}

/// What one `think` pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThinkReport {
    pub inbox_processed: usize,
    pub todo_processed: bool,
    /// Set when the pass did nothing because a cycle was already running.
    pub skipped_busy: bool,
    pub error: Option<String>,
}

pub struct Agent {
    id: String,
    name: String,
    system_prompt: String,
    servers: Arc<dyn ToolServerInterface>,
    conversation: ConversationManager,
    status: Arc<StatusModel>,
    state: RwLock<AgentState>,
    events: broadcast::Sender<AgentEvent>,
    transcript_dir: Option<PathBuf>,
    disposed: AtomicBool,
}

impl Agent {
    pub fn new(
        settings: &AgentSettings,
        target: CompletionTarget,
        servers: Arc<dyn ToolServerInterface>,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        let status = Arc::new(StatusModel::new());
        Self::assemble(
            Uuid::new_v4().to_string(),
            settings.name.clone(),
            settings.system_prompt.clone(),
            settings.transcript_dir.clone(),
            ConversationManager::new(provider, target, status.clone()),
            status,
            servers,
            AgentState::default(),
        )
    }

    /// Rebuilds an agent from its record. Identity, prompt, status and
    /// content come from the record; the transcript directory from
    /// `settings`.
    pub fn from_record(
        record: AgentRecord,
        settings: &AgentSettings,
        target: CompletionTarget,
        servers: Arc<dyn ToolServerInterface>,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        let status = Arc::new(StatusModel::restore(record.status));
        let conversation = ConversationManager::new(provider, target, status.clone());
        conversation.replace_history(record.history);
        let state = AgentState {
            inbox: record.inbox.into(),
            todo: record.todo.into(),
            notepad: record.notepad,
            preferences: record.preferences,
            context_files: record.context_files,
            last_synced: Default::default(),
            handled_inbox: record.handled_inbox.into_iter().collect(),
        };
        Self::assemble(
            record.id,
            record.name,
            record.system_prompt,
            settings.transcript_dir.clone(),
            conversation,
            status,
            servers,
            state,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        id: String,
        name: String,
        system_prompt: String,
        transcript_dir: Option<PathBuf>,
        conversation: ConversationManager,
        status: Arc<StatusModel>,
        servers: Arc<dyn ToolServerInterface>,
        state: AgentState,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let agent = Self {
            id,
            name,
            system_prompt,
            servers,
            conversation,
            status,
            state: RwLock::new(state),
            events,
            transcript_dir,
            disposed: AtomicBool::new(false),
        };
        if agent.conversation.get_history().is_empty() {
            agent.reset_conversation();
        }
        agent
    }

    pub fn to_record(&self) -> AgentRecord {
        let state = self.read_state();
        AgentRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            system_prompt: self.system_prompt.clone(),
            status: self.status.snapshot(),
            preferences: state.preferences.clone(),
            context_files: state.context_files.clone(),
            history: self.conversation.get_history(),
            inbox: state.inbox.iter().cloned().collect(),
            todo: state.todo.iter().cloned().collect(),
            notepad: state.notepad.clone(),
            handled_inbox: state.handled_inbox.iter().cloned().collect(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn is_processing(&self) -> bool {
        self.status.is_processing()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.conversation.get_history()
    }

    pub fn inbox(&self) -> Vec<InboxMessage> {
        self.read_state().inbox.iter().cloned().collect()
    }

    pub fn todo(&self) -> Vec<String> {
        self.read_state().todo.iter().cloned().collect()
    }

    pub fn notepad(&self) -> Option<String> {
        self.read_state().notepad.clone()
    }

    pub fn context_files(&self) -> Vec<String> {
        self.read_state().context_files.clone()
    }

    pub fn preferences(&self) -> ToolPreferences {
        self.read_state().preferences.clone()
    }

    pub fn last_synced(&self, kind: ContentKind) -> Option<DateTime<Utc>> {
        self.read_state().last_synced.get(&kind).copied()
    }

    pub fn push_inbox(&self, message: InboxMessage) {
        let pending = {
            let mut state = self.write_state();
            state.queue_inbox(message);
            state.inbox.len()
        };
        self.emit(AgentEvent::InboxChanged { pending });
    }

    pub fn push_todo(&self, task: impl Into<String>) {
        let pending = {
            let mut state = self.write_state();
            state.todo.push_back(task.into());
            state.todo.len()
        };
        self.emit(AgentEvent::TodoChanged { pending });
    }

    pub fn set_server_enabled(&self, server: &str, enabled: bool) {
        self.write_state().preferences.set_server(server, enabled);
        self.emit(AgentEvent::PreferencesChanged);
    }

    pub fn set_tool_enabled(&self, server: &str, tool: &str, enabled: bool) {
        self.write_state().preferences.set_tool(server, tool, enabled);
        self.emit(AgentEvent::PreferencesChanged);
    }

    pub fn add_context_file(&self, path: impl Into<String>) {
        if self.write_state().add_context_file(path) {
            self.emit(AgentEvent::ContextFilesChanged);
        }
    }

    pub fn remove_context_file(&self, path: &str) {
        if self.write_state().remove_context_file(path) {
            self.emit(AgentEvent::ContextFilesChanged);
        }
    }

    /// Moves an agent out of `error` back to `idle`.
    pub fn clear_error(&self) {
        if matches!(self.status.status(), AgentStatus::Error { .. }) {
            self.status.set_idle_status();
        }
    }

    /// Records a failure that happened outside a conversation cycle.
    /// Ignored while a cycle is running so it cannot mask that cycle's
    /// outcome.
    pub fn report_error(&self, message: impl Into<String>) {
        if self.status.is_processing() {
            debug!(agent = %self.name, "Agent is processing; error not recorded");
            return;
        }
        self.status.set_error_status(message);
    }

    /// Overwrites one content kind with freshly fetched data.
    pub fn apply_remote_content(&self, content: RemoteContent) {
        let kind = content.kind();
        let event = {
            let mut state = self.write_state();
            state.last_synced.insert(kind, Utc::now());
            match content {
                RemoteContent::Notepad(text) => {
                    state.notepad = Some(text);
                    AgentEvent::NotepadChanged
                }
                RemoteContent::Todo(tasks) => {
                    state.todo = tasks.into();
                    AgentEvent::TodoChanged {
                        pending: state.todo.len(),
                    }
                }
                RemoteContent::Inbox(messages) => {
                    state.merge_remote_inbox(messages);
                    AgentEvent::InboxChanged {
                        pending: state.inbox.len(),
                    }
                }
            }
        };
        self.emit(event);
        self.emit(AgentEvent::ContentSynced { kind });
    }

    /// The catalog minus disabled servers, minus disabled tools.
    pub fn get_available_tools(&self) -> Vec<ToolDescriptor> {
        self.read_state()
            .preferences
            .filter(self.servers.all_tools())
    }

    /// Invokes a tool by bare name or `server:tool` id, honoring this
    /// agent's preferences.
    pub async fn call_mcp_tool(
        &self,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ToolError> {
        self.tool_view().dispatch(tool, arguments).await
    }

    /// Drains the inbox head-first.
    ///
    /// Each item starts from a fresh conversation (preamble only), is framed
    /// with its sender and the current time, and is removed only after the
    /// cycle succeeds. The first failure stops the drain and leaves the item
    /// queued; the error is on the agent's status. Returns how many items
    /// were processed.
    pub async fn process_inbox_items(&self) -> usize {
        let mut processed = 0;
        loop {
            let head = self.read_state().inbox.front().cloned();
            let Some(item) = head else {
                break;
            };
            self.reset_conversation();
            self.conversation.add_user_message(frame_inbox(&item));
            info!(agent = %self.name, sender = %item.sender, "Processing inbox message");

            match self.conversation.send_message(&self.tool_view()).await {
                Ok(reply) => {
                    let pending = {
                        let mut state = self.write_state();
                        state.finish_inbox(&item.id);
                        state.inbox.len()
                    };
                    processed += 1;
                    self.emit(AgentEvent::InboxChanged { pending });
                    self.emit(AgentEvent::Replied {
                        content: reply.content,
                    });
                }
                Err(err) => {
                    error!(agent = %self.name, %err, "Inbox message left queued after failure");
                    break;
                }
            }
        }
        processed
    }

    /// Sends the head of the to-do list without removing it; the model
    /// marks tasks done through a tool. Returns whether a cycle succeeded.
    pub async fn process_todo_list(&self) -> bool {
        let Some(task) = self.read_state().todo.front().cloned() else {
            return false;
        };
        self.reset_conversation();
        self.conversation.add_user_message(frame_todo(&task));
        info!(agent = %self.name, "Working on to-do item");

        match self.conversation.send_message(&self.tool_view()).await {
            Ok(reply) => {
                self.emit(AgentEvent::Replied {
                    content: reply.content,
                });
                true
            }
            Err(err) => {
                error!(agent = %self.name, %err, "To-do cycle failed");
                false
            }
        }
    }

    /// One scheduling pass: the whole inbox, then the head of the to-do list.
    ///
    /// No-op when both queues are empty, when a cycle is already running,
    /// or after [`Self::dispose`]. The to-do list waits while inbox items
    /// remain.
    pub async fn think(&self) -> ThinkReport {
        let mut report = ThinkReport::default();
        if self.disposed.load(Ordering::SeqCst) {
            warn!(agent = %self.name, "think() called on a disposed agent");
            return report;
        }
        let (inbox_pending, todo_pending) = {
            let state = self.read_state();
            (!state.inbox.is_empty(), !state.todo.is_empty())
        };
        if !inbox_pending && !todo_pending {
            return report;
        }
        if self.status.is_processing() {
            debug!(agent = %self.name, "Agent busy; skipping think pass");
            report.skipped_busy = true;
            return report;
        }

        report.inbox_processed = self.process_inbox_items().await;
        if self.read_state().inbox.is_empty() {
            report.todo_processed = self.process_todo_list().await;
        }
        report.error = self.status.status().error_message().map(str::to_string);
        report
    }

    /// Appends the history to `{transcript_dir}/{name}.log`. `None` when no
    /// transcript directory is configured.
    pub fn export_transcript(&self) -> Result<Option<PathBuf>, PersistError> {
        let Some(dir) = &self.transcript_dir else {
            return Ok(None);
        };
        let path = transcript::append(dir, &self.name, &self.conversation.get_history())?;
        info!(agent = %self.name, path = %path.display(), "Transcript exported");
        Ok(Some(path))
    }

    /// Releases this agent's own resources. Shared server connections stay
    /// up; they belong to the server manager.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.conversation.clear_conversation();
        info!(agent = %self.name, "Agent disposed");
    }

    fn reset_conversation(&self) {
        self.conversation.clear_conversation();
        let preamble = self.preamble();
        if !preamble.is_empty() {
            self.conversation.add_system_message(preamble);
        }
    }

    fn preamble(&self) -> String {
        let files = self.context_files();
        let mut preamble = self.system_prompt.trim().to_string();
        if !files.is_empty() {
            if !preamble.is_empty() {
                preamble.push_str("\n\n");
            }
            preamble.push_str("Context files:");
            for file in files {
                preamble.push_str("\n- ");
                preamble.push_str(&file);
            }
        }
        preamble
    }

    fn tool_view(&self) -> AgentTools<'_> {
        AgentTools {
            servers: self.servers.as_ref(),
            preferences: self.preferences(),
        }
    }

    fn emit(&self, event: AgentEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn read_state(&self) -> RwLockReadGuard<'_, AgentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, AgentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn frame_inbox(message: &InboxMessage) -> String {
    format!(
        "[{}] Message from {}: {}",
        timestamp(),
        message.sender,
        message.content
    )
}

fn frame_todo(task: &str) -> String {
    format!("[{}] Next task on your to-do list: {}", timestamp(), task)
}

/// The agent's preference-filtered view of the shared catalog.
struct AgentTools<'a> {
    servers: &'a dyn ToolServerInterface,
    preferences: ToolPreferences,
}

impl AgentTools<'_> {
    /// Resolves `name` to a descriptor the agent may call.
    ///
    /// The server manager's resolution comes first. When that owner is
    /// disabled for this agent, the next enabled owner in configuration
    /// order is used; if there is none the call is refused as disabled.
    fn resolve(&self, name: &str) -> Result<ToolDescriptor, ToolError> {
        let catalog = self.servers.all_tools();
        let (server, tool) = match split_qualified(name) {
            Some((server, tool)) => (server.to_string(), tool),
            None => {
                let server = self
                    .servers
                    .find_server_for_tool(name)
                    .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
                (server, name)
            }
        };
        let owned = catalog
            .iter()
            .find(|t| t.server == server && t.name == tool)
            .ok_or_else(|| ToolError::NotFound {
                server: server.clone(),
                tool: tool.to_string(),
            })?;
        if self.preferences.allows(owned) {
            return Ok(owned.clone());
        }
        if split_qualified(name).is_none() {
            if let Some(alternative) = catalog
                .iter()
                .find(|t| t.name == tool && self.preferences.allows(t))
            {
                return Ok(alternative.clone());
            }
        }
        Err(ToolError::Disabled(owned.id.clone()))
    }
}

#[async_trait]
impl<'a> ToolDispatcher for AgentTools<'a> {
    fn available_tools(&self) -> Vec<ToolDescriptor> {
        self.preferences.filter(self.servers.all_tools())
    }

    async fn dispatch(&self, name: &str, arguments: Value) -> Result<ToolCallResult, ToolError> {
        let tool = self.resolve(name)?;
        debug!(tool = %tool.id, "Calling tool");
        self.servers.call_tool(&tool.server, &tool.name, arguments).await
    }
}
