use async_trait::async_trait;
use serde_json::Value;

use super::error::ToolError;
use crate::domain::tool::{ToolCallResult, ToolDescriptor};

/// The call surface agents and the sync engine see.
///
/// Implemented by [`super::ServerManager`]; tests substitute stubs.
#[async_trait]
pub trait ToolServerInterface: Send + Sync {
    /// Snapshot of every tool on every connected server.
    fn all_tools(&self) -> Vec<ToolDescriptor>;

    /// Owning server of a bare tool name (or `server:tool` id).
    fn find_server_for_tool(&self, tool: &str) -> Option<String>;

    async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ToolError>;
}

/// Turns an `is_error` result into [`ToolError::Execution`].
pub fn ensure_success(tool: &str, result: ToolCallResult) -> Result<ToolCallResult, ToolError> {
    if result.is_error {
        Err(ToolError::Execution {
            tool: tool.to_string(),
            message: result.text_content(),
        })
    } else {
        Ok(result)
    }
}
