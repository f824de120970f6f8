use super::connection::{ConnectionState, ServerConnection, ServerStatus};
use super::discovery::{DiscoverySummary, ServerOutcome};
use super::error::{ToolError, ToolInvokeError};
use super::interface::ToolServerInterface;
use super::protocol::{
    call_params, next_cursor, parse_call_result, parse_prompts, parse_resources, parse_tools,
};
use super::registry::{ServerCatalog, ToolRegistry};
use super::transport::{Handshake, TransportFactory};
use crate::config::{ConfigError, ServerConfig, validate_servers};
use crate::domain::tool::{PromptDescriptor, ResourceDescriptor, ToolCallResult, ToolDescriptor};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Value, json};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Guard against servers that hand out cursors forever.
const MAX_LIST_PAGES: usize = 64;

/// Owns every tool-server connection and the shared catalog.
///
/// The catalog is an immutable [`ToolRegistry`] behind an `Arc`; discovery
/// builds a new registry per server and swaps it in, so readers never see a
/// half-updated catalog. Only `initialize`, `refresh_all` and `close_all`
/// replace it.
pub struct ServerManager {
    factory: Arc<dyn TransportFactory>,
    connections: RwLock<Vec<Arc<ServerConnection>>>,
    registry: RwLock<Arc<ToolRegistry>>,
    lifecycle: AsyncMutex<()>,
}

#[cfg(feature = "native-transport")]
impl Default for ServerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerManager {
    /// Manager that launches servers as stdio child processes.
    #[cfg(feature = "native-transport")]
    pub fn new() -> Self {
        Self::with_factory(Arc::new(super::transport::ProcessTransportFactory))
    }

    pub fn with_factory(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            connections: RwLock::new(Vec::new()),
            registry: RwLock::new(Arc::new(ToolRegistry::new())),
            lifecycle: AsyncMutex::new(()),
        }
    }

    /// Connects every configured server.
    ///
    /// Only a malformed server list is an error. Servers that fail to
    /// connect are left `Disconnected` with the reason kept for
    /// [`Self::server_statuses`] and reported in the summary.
    pub async fn initialize(
        &self,
        configs: Vec<ServerConfig>,
    ) -> Result<DiscoverySummary, ConfigError> {
        validate_servers(&configs)?;
        let _guard = self.lifecycle.lock().await;

        self.shutdown_connections().await;
        let connections: Vec<Arc<ServerConnection>> = configs
            .into_iter()
            .enumerate()
            .map(|(order, config)| {
                let transport = self.factory.create(&config);
                Arc::new(ServerConnection::new(config, order, transport))
            })
            .collect();
        *self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner) = connections.clone();
        self.replace_registry(|_| ToolRegistry::new());

        info!(servers = connections.len(), "Connecting MCP servers");
        let outcomes = join_all(
            connections
                .iter()
                .map(|connection| self.connect_and_discover(connection)),
        )
        .await;
        let summary = DiscoverySummary::from_outcomes(outcomes);
        info!(
            connected = summary.connected,
            failed = summary.failed,
            tools = summary.total_tools,
            "MCP server initialization finished"
        );
        Ok(summary)
    }

    /// Re-runs discovery on every configured server.
    ///
    /// Connected servers are re-listed; disconnected ones get a fresh
    /// connection attempt. Each server's catalog is swapped independently,
    /// so one failure leaves the others' new catalogs in place.
    pub async fn refresh_all(&self) -> DiscoverySummary {
        let _guard = self.lifecycle.lock().await;
        let connections = self.connection_list();
        debug!(servers = connections.len(), "Refreshing MCP server catalogs");

        let outcomes = join_all(connections.iter().map(|connection| async move {
            match (connection.state(), connection.handshake()) {
                (ConnectionState::Connected, Some(handshake)) => {
                    match self.list_catalog(connection, &handshake).await {
                        Ok(catalog) => self.accept_catalog(connection, catalog, handshake),
                        Err(err) => self.reject_server(connection, err).await,
                    }
                }
                _ => self.connect_and_discover(connection).await,
            }
        }))
        .await;

        let summary = DiscoverySummary::from_outcomes(outcomes);
        info!(
            connected = summary.connected,
            failed = summary.failed,
            tools = summary.total_tools,
            "MCP server refresh finished"
        );
        summary
    }

    /// Tools of every connected server, in configuration order.
    pub fn get_all_tools(&self) -> Vec<ToolDescriptor> {
        self.connected_view().tools()
    }

    pub fn list_resources(&self) -> Vec<ResourceDescriptor> {
        self.connected_view().resources()
    }

    pub fn list_prompts(&self) -> Vec<PromptDescriptor> {
        self.connected_view().prompts()
    }

    /// See [`ToolRegistry::find_server_for_tool`] for the resolution order.
    pub fn find_server_for_tool(&self, tool: &str) -> Option<String> {
        self.connected_view()
            .find_server_for_tool(tool)
            .map(str::to_string)
    }

    /// Invokes `tool` on `server`.
    ///
    /// A JSON-RPC error or `isError` reply is an application-level failure
    /// and comes back as `Ok` with `is_error` set. Transport failures mark
    /// the server disconnected and return [`ToolError::ServerUnavailable`].
    pub async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ToolError> {
        let not_found = || ToolError::NotFound {
            server: server.to_string(),
            tool: tool.to_string(),
        };
        let connection = self.connection(server).ok_or_else(not_found)?;
        if connection.state() != ConnectionState::Connected {
            let reason = connection
                .status(0)
                .last_error
                .unwrap_or_else(|| "not connected".to_string());
            return Err(ToolError::unavailable(server, reason));
        }
        if self.registry_snapshot().tool(server, tool).is_none() {
            return Err(not_found());
        }

        debug!(server, tool, "Dispatching tool call");
        match connection
            .transport
            .request("tools/call", call_params(tool, arguments))
            .await
        {
            Ok(result) => {
                let parsed = parse_call_result(&result);
                if parsed.is_error {
                    warn!(server, tool, "Tool reported an application-level error");
                } else {
                    debug!(server, tool, blocks = parsed.content.len(), "Tool call finished");
                }
                Ok(parsed)
            }
            Err(ToolInvokeError::Rpc { code, message, .. }) => {
                warn!(server, tool, code, %message, "Tool call rejected by server");
                Ok(ToolCallResult::error(message))
            }
            Err(err) => {
                warn!(server, tool, %err, "Tool call failed; marking server disconnected");
                connection.transport.close().await;
                connection.mark_disconnected(Some(err.to_string()));
                Err(ToolError::unavailable(server, err.to_string()))
            }
        }
    }

    /// Releases every connection. Calling it twice is harmless.
    pub async fn close_all(&self) {
        let _guard = self.lifecycle.lock().await;
        self.shutdown_connections().await;
        self.replace_registry(|_| ToolRegistry::new());
        info!("All MCP server connections closed");
    }

    pub fn server_statuses(&self) -> Vec<ServerStatus> {
        let registry = self.registry_snapshot();
        self.connection_list()
            .iter()
            .map(|connection| {
                let tools = registry
                    .catalog(connection.name())
                    .map(|catalog| catalog.tools.len())
                    .unwrap_or(0);
                connection.status(tools)
            })
            .collect()
    }

    pub fn server_instructions(&self, server: &str) -> Option<String> {
        self.connection(server)?.handshake()?.instructions
    }

    async fn connect_and_discover(&self, connection: &Arc<ServerConnection>) -> ServerOutcome {
        connection.mark_connecting();
        debug!(server = connection.name(), "Connecting MCP server");
        let handshake = match connection.transport.connect().await {
            Ok(handshake) => handshake,
            Err(err) => return self.reject_server(connection, err).await,
        };
        match self.list_catalog(connection, &handshake).await {
            Ok(catalog) => self.accept_catalog(connection, catalog, handshake),
            Err(err) => self.reject_server(connection, err).await,
        }
    }

    fn accept_catalog(
        &self,
        connection: &ServerConnection,
        catalog: ServerCatalog,
        handshake: Handshake,
    ) -> ServerOutcome {
        let tools = catalog.tools.len();
        self.replace_registry(|registry| registry.with_catalog(catalog));
        connection.mark_connected(handshake);
        info!(server = connection.name(), tools, "MCP server connected");
        ServerOutcome::Connected { tools }
    }

    async fn reject_server(
        &self,
        connection: &ServerConnection,
        err: ToolInvokeError,
    ) -> ServerOutcome {
        warn!(server = connection.name(), %err, "MCP server unavailable");
        connection.transport.close().await;
        self.replace_registry(|registry| registry.without_server(connection.name()));
        connection.mark_disconnected(Some(err.to_string()));
        ServerOutcome::Failed {
            server: connection.name().to_string(),
            reason: err.to_string(),
        }
    }

    async fn list_catalog(
        &self,
        connection: &ServerConnection,
        handshake: &Handshake,
    ) -> Result<ServerCatalog, ToolInvokeError> {
        let server = connection.name();
        let tools = self
            .list_all(connection, "tools/list", |value| parse_tools(server, value))
            .await?;

        let resources = if handshake.supports("resources") {
            self.list_optional(connection, "resources/list", |value| {
                parse_resources(server, value)
            })
            .await?
        } else {
            Vec::new()
        };

        let prompts = if handshake.supports("prompts") {
            self.list_optional(connection, "prompts/list", |value| parse_prompts(server, value))
                .await?
        } else {
            Vec::new()
        };

        Ok(ServerCatalog::new(server, connection.order)
            .with_tools(tools)
            .with_resources(resources)
            .with_prompts(prompts))
    }

    async fn list_all<T>(
        &self,
        connection: &ServerConnection,
        method: &str,
        parse: impl Fn(&Value) -> Vec<T>,
    ) -> Result<Vec<T>, ToolInvokeError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = connection.transport.request(method, params).await?;
            items.extend(parse(&result));
            match next_cursor(&result) {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => return Ok(items),
            }
        }
        warn!(
            server = connection.name(),
            method, "Stopped following list cursors after page limit"
        );
        Ok(items)
    }

    /// Like `list_all`, but a server that does not implement `method`
    /// contributes an empty list.
    async fn list_optional<T>(
        &self,
        connection: &ServerConnection,
        method: &str,
        parse: impl Fn(&Value) -> Vec<T>,
    ) -> Result<Vec<T>, ToolInvokeError> {
        match self.list_all(connection, method, parse).await {
            Err(err) if err.is_method_not_found() => {
                debug!(server = connection.name(), method, "Capability not implemented");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn shutdown_connections(&self) {
        for connection in self.connection_list() {
            connection.transport.close().await;
            connection.mark_disconnected(None);
        }
    }

    fn replace_registry(&self, update: impl FnOnce(&ToolRegistry) -> ToolRegistry) {
        let mut guard = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let next = update(&guard);
        *guard = Arc::new(next);
    }

    fn registry_snapshot(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn connection_list(&self) -> Vec<Arc<ServerConnection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn connection(&self, server: &str) -> Option<Arc<ServerConnection>> {
        self.connection_list()
            .into_iter()
            .find(|connection| connection.name() == server)
    }

    /// The registry restricted to servers that are currently connected.
    fn connected_view(&self) -> ToolRegistry {
        let registry = self.registry_snapshot();
        let mut view = ToolRegistry::new();
        for connection in self.connection_list() {
            if connection.state() != ConnectionState::Connected {
                continue;
            }
            if let Some(catalog) = registry.catalog(connection.name()) {
                view = view.with_catalog(catalog.clone());
            }
        }
        view
    }
}

#[async_trait]
impl ToolServerInterface for ServerManager {
    fn all_tools(&self) -> Vec<ToolDescriptor> {
        self.get_all_tools()
    }

    fn find_server_for_tool(&self, tool: &str) -> Option<String> {
        ServerManager::find_server_for_tool(self, tool)
    }

    async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ToolError> {
        ServerManager::call_tool(self, server, tool, arguments).await
    }
}
