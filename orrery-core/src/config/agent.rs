use crate::constants::DEFAULT_MAX_ROUNDS;
use serde::Deserialize;
use std::path::PathBuf;

/// `[agent]` section: the agent the entry point creates on startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub name: String,
    pub system_prompt: String,
    pub max_rounds: usize,
    /// Directory for per-agent transcript logs; disabled when unset.
    pub transcript_dir: Option<PathBuf>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: "assistant".to_string(),
            system_prompt: String::new(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            transcript_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(super) struct RawAgentSettings {
    pub(super) name: Option<String>,
    pub(super) system_prompt: Option<String>,
    pub(super) max_rounds: Option<usize>,
    pub(super) transcript_dir: Option<String>,
}

impl From<RawAgentSettings> for AgentSettings {
    fn from(raw: RawAgentSettings) -> Self {
        let defaults = AgentSettings::default();
        Self {
            name: raw.name.unwrap_or(defaults.name),
            system_prompt: raw.system_prompt.unwrap_or(defaults.system_prompt),
            max_rounds: raw.max_rounds.unwrap_or(defaults.max_rounds),
            transcript_dir: raw.transcript_dir.map(|dir| {
                PathBuf::from(
                    shellexpand::full(&dir)
                        .map(|cow| cow.into_owned())
                        .unwrap_or(dir.clone()),
                )
            }),
        }
    }
}
