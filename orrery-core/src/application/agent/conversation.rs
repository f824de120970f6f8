//! Conversation history and the completion cycle.

use super::errors::AgentError;
use crate::application::status::StatusModel;
use crate::application::tooling::ToolError;
use crate::config::AppConfig;
use crate::domain::tool::{ToolCallResult, ToolDescriptor};
use crate::domain::types::{ChatMessage, MessageRole};
use crate::infrastructure::model::{ModelProvider, ModelRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Tool access granted to one conversation cycle.
///
/// The agent implements this over its preference-filtered catalog, so a
/// cycle can neither see nor call tools the agent has switched off.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    fn available_tools(&self) -> Vec<ToolDescriptor>;

    /// `name` is a bare tool name or a `server:tool` id.
    async fn dispatch(&self, name: &str, arguments: Value) -> Result<ToolCallResult, ToolError>;
}

/// Which backend and model a conversation talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionTarget {
    pub provider: String,
    pub model: String,
    pub max_rounds: usize,
}

impl CompletionTarget {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            provider: config.default_provider.clone(),
            model: config.model.clone(),
            max_rounds: config.agent.max_rounds,
        }
    }
}

pub struct ConversationManager {
    provider: Arc<dyn ModelProvider>,
    target: CompletionTarget,
    status: Arc<StatusModel>,
    history: Mutex<Vec<ChatMessage>>,
    session_id: Mutex<Option<String>>,
}

impl ConversationManager {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        target: CompletionTarget,
        status: Arc<StatusModel>,
    ) -> Self {
        Self {
            provider,
            target,
            status,
            history: Mutex::new(Vec::new()),
            session_id: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &CompletionTarget {
        &self.target
    }

    pub fn add_system_message(&self, text: impl Into<String>) {
        self.push(ChatMessage::system(text));
    }

    pub fn add_user_message(&self, text: impl Into<String>) {
        self.push(ChatMessage::user(text));
    }

    /// Empties history. Callers re-add any system preamble themselves.
    pub fn clear_conversation(&self) {
        self.lock_history().clear();
        *self
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Owned copy of the history.
    pub fn get_history(&self) -> Vec<ChatMessage> {
        self.lock_history().clone()
    }

    pub fn replace_history(&self, messages: Vec<ChatMessage>) {
        *self.lock_history() = messages;
    }

    /// Runs one conversation cycle over the current history.
    ///
    /// Rounds repeat while the model keeps requesting tools, up to
    /// `max_rounds` completions. A round (the assistant message and every
    /// tool response it triggered) is appended in one step, so history never
    /// holds an assistant tool call without its responses.
    ///
    /// Status moves to `processing` for the duration, then `idle` or
    /// `error` with the failure message.
    pub async fn send_message(&self, tools: &dyn ToolDispatcher) -> Result<ChatMessage, AgentError> {
        self.status.set_processing_status();
        match self.run_cycle(tools).await {
            Ok(reply) => {
                self.status.set_idle_status();
                Ok(reply)
            }
            Err(err) => {
                warn!(%err, "Conversation cycle failed");
                self.status.set_error_status(err.to_string());
                Err(err)
            }
        }
    }

    async fn run_cycle(&self, tools: &dyn ToolDispatcher) -> Result<ChatMessage, AgentError> {
        let limit = self.target.max_rounds;
        for round in 1..=limit {
            let request = ModelRequest {
                provider: self.target.provider.clone(),
                model: self.target.model.clone(),
                messages: self.get_history(),
                tools: tools.available_tools(),
                session_id: self.current_session(),
            };
            debug!(
                round,
                messages = request.messages.len(),
                tools = request.tools.len(),
                "Submitting conversation to model provider"
            );

            let response = self.provider.chat(request).await?;
            if response.session_id.is_some() {
                *self
                    .session_id
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = response.session_id;
            }
            let mut reply = response.message;
            reply.role = MessageRole::Assistant;

            if !reply.has_tool_calls() {
                info!(round, "Model returned final reply");
                self.push(reply.clone());
                return Ok(reply);
            }

            let mut committed = Vec::with_capacity(reply.tool_calls.len() + 1);
            for call in &reply.tool_calls {
                info!(tool = %call.name, round, "Model requested tool execution");
                let response = match tools.dispatch(&call.name, call.arguments.clone()).await {
                    Ok(result) => {
                        ChatMessage::tool_response(&call.id, result.text_content(), result.is_error)
                    }
                    Err(err) => {
                        warn!(tool = %call.name, %err, "Tool call failed");
                        ChatMessage::tool_response(&call.id, err.to_string(), true)
                    }
                };
                committed.push(response);
            }
            committed.insert(0, reply);
            self.lock_history().extend(committed);
        }

        Err(AgentError::MaxRoundsExceeded { limit })
    }

    fn push(&self, message: ChatMessage) {
        self.lock_history().push(message);
    }

    fn current_session(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, Vec<ChatMessage>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::status::AgentStatus;
    use crate::domain::types::ToolCall;
    use crate::infrastructure::model::{ModelError, ModelResponse};
    use serde_json::json;
    use std::collections::VecDeque;

    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<ChatMessage, String>>>,
        seen: Mutex<Vec<usize>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<ChatMessage, String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
            self.seen.lock().unwrap().push(request.messages.len());
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(message)) => Ok(ModelResponse::from_message(message, None)),
                Some(Err(reason)) => Err(ModelError::invalid_response("scripted", reason)),
                None => Err(ModelError::invalid_response("scripted", "script exhausted")),
            }
        }
    }

    struct EchoTools;

    #[async_trait]
    impl ToolDispatcher for EchoTools {
        fn available_tools(&self) -> Vec<ToolDescriptor> {
            vec![ToolDescriptor::new("files", "read")]
        }

        async fn dispatch(&self, name: &str, arguments: Value) -> Result<ToolCallResult, ToolError> {
            match name {
                "files:read" | "read" => Ok(ToolCallResult::text(format!("read {arguments}"))),
                other => Err(ToolError::UnknownTool(other.to_string())),
            }
        }
    }

    fn manager(provider: Arc<ScriptedProvider>, max_rounds: usize) -> (ConversationManager, Arc<StatusModel>) {
        let status = Arc::new(StatusModel::new());
        let target = CompletionTarget {
            provider: "scripted".into(),
            model: "test".into(),
            max_rounds,
        };
        (ConversationManager::new(provider, target, status.clone()), status)
    }

    fn tool_call(id: &str, name: &str) -> ChatMessage {
        ChatMessage::assistant_with_tools("", vec![ToolCall::new(id, name, json!({"path": "a"}))])
    }

    #[tokio::test]
    async fn plain_reply_is_appended_and_status_returns_idle() {
        let provider = ScriptedProvider::new(vec![Ok(ChatMessage::assistant("pong"))]);
        let (conversation, status) = manager(provider, 4);
        conversation.add_user_message("ping");

        let reply = conversation.send_message(&EchoTools).await.unwrap();

        assert_eq!(reply.content, "pong");
        assert_eq!(conversation.get_history().len(), 2);
        assert_eq!(status.status(), AgentStatus::Idle);
    }

    #[tokio::test]
    async fn tool_rounds_resolve_before_the_final_reply() {
        let provider = ScriptedProvider::new(vec![
            Ok(tool_call("c1", "files:read")),
            Ok(tool_call("c2", "missing")),
            Ok(ChatMessage::assistant("done")),
        ]);
        let (conversation, _) = manager(provider.clone(), 4);
        conversation.add_user_message("read a");

        conversation.send_message(&EchoTools).await.unwrap();

        let history = conversation.get_history();
        let roles: Vec<MessageRole> = history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant,
            ]
        );
        assert_eq!(history[2].tool_call_id.as_deref(), Some("c1"));
        assert!(!history[2].is_error);
        assert!(history[4].is_error);
        assert_eq!(*provider.seen.lock().unwrap(), vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn failure_sets_error_and_leaves_no_dangling_call() {
        let provider = ScriptedProvider::new(vec![
            Ok(tool_call("c1", "read")),
            Err("upstream down".into()),
        ]);
        let (conversation, status) = manager(provider, 4);
        conversation.add_user_message("read a");

        let err = conversation.send_message(&EchoTools).await.unwrap_err();

        assert!(matches!(err, AgentError::Model(_)));
        let message = status.status().error_message().map(str::to_string).unwrap();
        assert!(message.contains("upstream down"));
        let history = conversation.get_history();
        assert_eq!(history.len(), 3);
        assert_eq!(history.last().unwrap().role, MessageRole::Tool);
    }

    #[tokio::test]
    async fn runaway_tool_loop_is_bounded() {
        let provider = ScriptedProvider::new(vec![
            Ok(tool_call("c1", "read")),
            Ok(tool_call("c2", "read")),
            Ok(tool_call("c3", "read")),
        ]);
        let (conversation, status) = manager(provider, 2);
        conversation.add_user_message("loop");

        let err = conversation.send_message(&EchoTools).await.unwrap_err();

        assert!(matches!(err, AgentError::MaxRoundsExceeded { limit: 2 }));
        assert_eq!(status.status().label(), "error");
    }

    #[tokio::test]
    async fn history_snapshot_does_not_alias_live_state() {
        let provider = ScriptedProvider::new(vec![]);
        let (conversation, _) = manager(provider, 1);
        conversation.add_system_message("preamble");
        let snapshot = conversation.get_history();
        conversation.clear_conversation();
        assert_eq!(snapshot.len(), 1);
        assert!(conversation.get_history().is_empty());
    }
}
