//! Serialized form of an agent.

use super::errors::PersistError;
use super::state::ToolPreferences;
use crate::application::status::StatusSnapshot;
use crate::domain::content::InboxMessage;
use crate::domain::types::ChatMessage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Everything needed to rebuild an agent, minus its live dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
    pub status: StatusSnapshot,
    #[serde(default)]
    pub preferences: ToolPreferences,
    #[serde(default)]
    pub context_files: Vec<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub inbox: Vec<InboxMessage>,
    #[serde(default)]
    pub todo: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notepad: Option<String>,
    #[serde(default)]
    pub handled_inbox: Vec<String>,
}

impl AgentRecord {
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
        }
        fs::write(path, self.to_json()?).map_err(|e| PersistError::io(path, e))?;
        debug!(path = %path.display(), agent = %self.name, "Agent record saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).map_err(|e| PersistError::io(path, e))?;
        Self::from_json(&content)
    }
}
