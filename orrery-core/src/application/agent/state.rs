//! Mutable per-agent state that is not conversation history.

use crate::domain::content::{ContentKind, InboxMessage};
use crate::domain::tool::{ToolDescriptor, qualified_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Per-agent enable/disable switches. Anything not listed is enabled.
///
/// A disabled server hides all of its tools regardless of their own entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPreferences {
    #[serde(default)]
    pub servers: BTreeMap<String, bool>,
    /// Keyed by `server:tool`.
    #[serde(default)]
    pub tools: BTreeMap<String, bool>,
}

impl ToolPreferences {
    pub fn is_server_enabled(&self, server: &str) -> bool {
        self.servers.get(server).copied().unwrap_or(true)
    }

    pub fn is_tool_enabled(&self, server: &str, tool: &str) -> bool {
        self.tools
            .get(&qualified_id(server, tool))
            .copied()
            .unwrap_or(true)
    }

    pub fn allows(&self, tool: &ToolDescriptor) -> bool {
        self.is_server_enabled(&tool.server) && self.is_tool_enabled(&tool.server, &tool.name)
    }

    pub fn set_server(&mut self, server: impl Into<String>, enabled: bool) {
        self.servers.insert(server.into(), enabled);
    }

    pub fn set_tool(&mut self, server: &str, tool: &str, enabled: bool) {
        self.tools.insert(qualified_id(server, tool), enabled);
    }

    /// Applies the server switch first, then the individual switches.
    pub fn filter(&self, tools: Vec<ToolDescriptor>) -> Vec<ToolDescriptor> {
        tools
            .into_iter()
            .filter(|tool| self.is_server_enabled(&tool.server))
            .filter(|tool| self.is_tool_enabled(&tool.server, &tool.name))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentState {
    pub inbox: VecDeque<InboxMessage>,
    pub todo: VecDeque<String>,
    pub notepad: Option<String>,
    pub preferences: ToolPreferences,
    pub context_files: Vec<String>,
    pub last_synced: BTreeMap<ContentKind, DateTime<Utc>>,
    /// Ids of inbox messages already answered. A sync that still lists one
    /// of them does not queue it again.
    pub handled_inbox: BTreeSet<String>,
}

impl AgentState {
    /// Returns `false` if the file was already listed.
    pub fn add_context_file(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.context_files.contains(&path) {
            return false;
        }
        self.context_files.push(path);
        true
    }

    /// Queues a local message. Its id is bumped past any id already queued
    /// or handled, so a repeat of an answered message is not mistaken for it.
    pub fn queue_inbox(&mut self, mut message: InboxMessage) {
        let mut nth = 0;
        while self.inbox.iter().any(|m| m.id == message.id)
            || self.handled_inbox.contains(&message.id)
        {
            nth += 1;
            message.id = message.derived_id(nth);
        }
        self.inbox.push_back(message);
    }

    /// Replaces the inbox with a fetched copy, minus anything already
    /// handled. Handled ids the remote no longer lists are forgotten.
    pub fn merge_remote_inbox(&mut self, messages: Vec<InboxMessage>) {
        let Self {
            inbox,
            handled_inbox,
            ..
        } = self;
        handled_inbox.retain(|id| messages.iter().any(|m| &m.id == id));
        *inbox = messages
            .into_iter()
            .filter(|m| !handled_inbox.contains(&m.id))
            .collect();
    }

    /// Drops the message with `id` from the inbox and remembers it as
    /// handled.
    pub fn finish_inbox(&mut self, id: &str) {
        self.inbox.retain(|m| m.id != id);
        self.handled_inbox.insert(id.to_string());
    }

    pub fn remove_context_file(&mut self, path: &str) -> bool {
        let before = self.context_files.len();
        self.context_files.retain(|existing| existing != path);
        before != self.context_files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_server_wins_over_enabled_tool() {
        let mut prefs = ToolPreferences::default();
        prefs.set_server("files", false);
        prefs.set_tool("files", "read", true);

        let tools = vec![
            ToolDescriptor::new("files", "read"),
            ToolDescriptor::new("web", "fetch"),
        ];
        let visible: Vec<String> = prefs.filter(tools).into_iter().map(|t| t.id).collect();
        assert_eq!(visible, vec!["web:fetch"]);
    }

    #[test]
    fn disabled_tool_is_hidden_on_enabled_server() {
        let mut prefs = ToolPreferences::default();
        prefs.set_server("files", true);
        prefs.set_tool("files", "delete", false);

        assert!(prefs.allows(&ToolDescriptor::new("files", "read")));
        assert!(!prefs.allows(&ToolDescriptor::new("files", "delete")));
    }

    #[test]
    fn handled_message_is_not_requeued_by_sync() {
        let mut state = AgentState::default();
        state.queue_inbox(InboxMessage::new("Bob", "ping"));
        let id = state.inbox[0].id.clone();
        state.finish_inbox(&id);
        assert!(state.inbox.is_empty());

        let fetched = InboxMessage::new("Bob", "ping");
        state.merge_remote_inbox(vec![fetched.clone(), InboxMessage::new("Ann", "hi")]);
        assert_eq!(state.inbox.len(), 1);
        assert_eq!(state.inbox[0].sender, "Ann");

        // once the remote drops it, the id is forgotten
        state.merge_remote_inbox(vec![]);
        assert!(state.handled_inbox.is_empty());
        state.merge_remote_inbox(vec![fetched]);
        assert_eq!(state.inbox.len(), 1);
    }

    #[test]
    fn local_repeat_of_handled_message_gets_new_id() {
        let mut state = AgentState::default();
        state.queue_inbox(InboxMessage::new("Bob", "ping"));
        let first = state.inbox[0].id.clone();
        state.queue_inbox(InboxMessage::new("Bob", "ping"));
        assert_ne!(state.inbox[1].id, first);

        state.finish_inbox(&first);
        state.queue_inbox(InboxMessage::new("Bob", "ping"));
        assert_eq!(state.inbox.len(), 2);
        assert!(state.inbox.iter().all(|m| m.id != first));
    }

    #[test]
    fn context_files_stay_ordered_and_unique() {
        let mut state = AgentState::default();
        assert!(state.add_context_file("b.md"));
        assert!(state.add_context_file("a.md"));
        assert!(!state.add_context_file("b.md"));
        assert_eq!(state.context_files, vec!["b.md", "a.md"]);
        assert!(state.remove_context_file("b.md"));
        assert!(!state.remove_context_file("b.md"));
    }
}
