use crate::constants::{
    DEFAULT_SYNC_BASE_DELAY_MS, DEFAULT_SYNC_CEILING_SECS, DEFAULT_SYNC_INTERVAL_SECS,
};
use crate::domain::content::ContentKind;
use serde::Deserialize;
use std::time::Duration;

/// `[sync]` section: where and how often agent content is mirrored from.
///
/// Each content kind maps to a tool on `server`; a kind without a tool is
/// not synced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub enabled: bool,
    pub server: String,
    pub interval: Duration,
    pub base_delay: Duration,
    pub ceiling: Duration,
    pub notepad_tool: Option<String>,
    pub todo_tool: Option<String>,
    pub inbox_tool: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: String::new(),
            interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            base_delay: Duration::from_millis(DEFAULT_SYNC_BASE_DELAY_MS),
            ceiling: Duration::from_secs(DEFAULT_SYNC_CEILING_SECS),
            notepad_tool: None,
            todo_tool: None,
            inbox_tool: None,
        }
    }
}

impl SyncConfig {
    pub fn tool_for(&self, kind: ContentKind) -> Option<&str> {
        match kind {
            ContentKind::Notepad => self.notepad_tool.as_deref(),
            ContentKind::Todo => self.todo_tool.as_deref(),
            ContentKind::Inbox => self.inbox_tool.as_deref(),
        }
    }

    /// Kinds that have a tool mapping, in fixed order.
    pub fn kinds(&self) -> Vec<ContentKind> {
        ContentKind::ALL
            .into_iter()
            .filter(|kind| self.tool_for(*kind).is_some())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(super) struct RawSyncConfig {
    #[serde(default)]
    pub(super) enabled: bool,
    pub(super) server: Option<String>,
    pub(super) interval_secs: Option<u64>,
    pub(super) base_delay_ms: Option<u64>,
    pub(super) ceiling_secs: Option<u64>,
    pub(super) notepad_tool: Option<String>,
    pub(super) todo_tool: Option<String>,
    pub(super) inbox_tool: Option<String>,
}

impl From<RawSyncConfig> for SyncConfig {
    fn from(raw: RawSyncConfig) -> Self {
        let defaults = SyncConfig::default();
        Self {
            enabled: raw.enabled,
            server: raw.server.unwrap_or_default(),
            interval: raw
                .interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            base_delay: raw
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            ceiling: raw
                .ceiling_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.ceiling),
            notepad_tool: raw.notepad_tool.filter(|t| !t.trim().is_empty()),
            todo_tool: raw.todo_tool.filter(|t| !t.trim().is_empty()),
            inbox_tool: raw.inbox_tool.filter(|t| !t.trim().is_empty()),
        }
    }
}
