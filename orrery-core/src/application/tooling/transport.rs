use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::error::ToolInvokeError;
use crate::config::ServerConfig;

/// What a server told us during the `initialize` handshake.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Handshake {
    pub server_name: Option<String>,
    pub instructions: Option<String>,
    pub capabilities: Value,
}

impl Handshake {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.get(capability).is_some()
    }
}

/// One JSON-RPC channel to a tool server.
#[async_trait]
pub trait ServerTransport: Send + Sync {
    /// Starts the server (if needed) and performs the protocol handshake.
    async fn connect(&self) -> Result<Handshake, ToolInvokeError>;

    /// Sends a request and returns its `result` member.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError>;

    /// Tears the channel down. Safe to call repeatedly.
    async fn close(&self);
}

pub trait TransportFactory: Send + Sync {
    fn create(&self, config: &ServerConfig) -> Arc<dyn ServerTransport>;
}

/// Spawns each server as a child process speaking MCP over stdio.
#[cfg(feature = "native-transport")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTransportFactory;

#[cfg(feature = "native-transport")]
impl TransportFactory for ProcessTransportFactory {
    fn create(&self, config: &ServerConfig) -> Arc<dyn ServerTransport> {
        Arc::new(super::process::McpProcess::new(config.clone()))
    }
}
