use super::error::ConfigError;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Launch parameters of one stdio MCP tool server.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            workdir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawServer {
    name: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    workdir: Option<String>,
}

impl From<RawServer> for ServerConfig {
    fn from(raw: RawServer) -> Self {
        let expand = |s: &str| -> String {
            shellexpand::full(s)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| s.to_string())
        };

        let command = PathBuf::from(expand(&raw.command));
        let workdir = raw.workdir.map(|d| PathBuf::from(expand(&d)));
        let args = raw.args.into_iter().map(|arg| expand(&arg)).collect();
        let env = raw
            .env
            .into_iter()
            .map(|(key, value)| (key, expand(&value)))
            .collect();

        Self {
            name: raw.name.trim().to_string(),
            command,
            args,
            env,
            workdir,
        }
    }
}

/// Rejects server lists the connection manager cannot key by name.
pub fn validate_servers(servers: &[ServerConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (index, server) in servers.iter().enumerate() {
        if server.name.trim().is_empty() {
            return Err(ConfigError::EmptyServerName { index });
        }
        if !seen.insert(server.name.as_str()) {
            return Err(ConfigError::DuplicateServer {
                server: server.name.clone(),
            });
        }
    }
    Ok(())
}
