use thiserror::Error;

/// Transport-level failures talking to one MCP server.
#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("MCP server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("MCP server '{server}' request cancelled")]
    Cancelled { server: String },
}

impl ToolInvokeError {
    /// JSON-RPC "method not found": the server lacks an optional capability.
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, ToolInvokeError::Rpc { code: -32601, .. })
    }
}

/// Failures of the uniform tool call surface.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{tool}' was not found on server '{server}'")]
    NotFound { server: String, tool: String },
    #[error("no connected server provides tool '{0}'")]
    UnknownTool(String),
    #[error("tool '{0}' is disabled for this agent")]
    Disabled(String),
    #[error("MCP server '{server}' is unavailable: {reason}")]
    ServerUnavailable { server: String, reason: String },
    #[error("tool '{tool}' reported an error: {message}")]
    Execution { tool: String, message: String },
}

impl ToolError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ToolError::NotFound { .. } | ToolError::UnknownTool(_))
    }

    pub fn unavailable(server: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::ServerUnavailable {
            server: server.into(),
            reason: reason.into(),
        }
    }
}
