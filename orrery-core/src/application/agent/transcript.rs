//! Human-readable, append-only conversation log per agent.

use super::errors::PersistError;
use crate::domain::types::{ChatMessage, MessageRole};
use chrono::{SecondsFormat, Utc};
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

pub fn render(agent: &str, history: &[ChatMessage]) -> String {
    let mut out = format!(
        "=== {agent} @ {} ===\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    for message in history {
        let label = match (message.role, message.is_error) {
            (MessageRole::Tool, true) => "tool (error)".to_string(),
            (role, _) => role.as_str().to_string(),
        };
        let _ = write!(out, "[{label}]");
        if let Some(id) = &message.tool_call_id {
            let _ = write!(out, " ({id})");
        }
        let _ = writeln!(out, " {}", message.content);
        for call in &message.tool_calls {
            let _ = writeln!(out, "  -> {} {} {}", call.id, call.name, call.arguments);
        }
    }
    out.push('\n');
    out
}

/// Appends the rendered history to `{dir}/{agent}.log`.
pub fn append(dir: &Path, agent: &str, history: &[ChatMessage]) -> Result<PathBuf, PersistError> {
    fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;
    let path = dir.join(format!("{}.log", file_stem(agent)));
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| PersistError::io(&path, e))?;
    file.write_all(render(agent, history).as_bytes())
        .map_err(|e| PersistError::io(&path, e))?;
    Ok(path)
}

fn file_stem(agent: &str) -> String {
    let stem: String = agent
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "agent".to_string() } else { stem }
}
