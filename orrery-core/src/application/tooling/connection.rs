use super::transport::{Handshake, ServerTransport};
use crate::config::ServerConfig;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Lifecycle of one server connection.
///
/// `Disconnected -> Connecting -> Connected -> Disconnected`. Nothing inside
/// the manager reconnects on its own; `refresh_all` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// Diagnostic view of one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStatus {
    pub name: String,
    pub state: ConnectionState,
    pub tool_count: usize,
    pub last_error: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug)]
struct ConnectionInfo {
    state: ConnectionState,
    last_error: Option<String>,
    handshake: Option<Handshake>,
}

pub(crate) struct ServerConnection {
    pub(crate) config: ServerConfig,
    pub(crate) order: usize,
    pub(crate) transport: Arc<dyn ServerTransport>,
    info: RwLock<ConnectionInfo>,
}

impl ServerConnection {
    pub(crate) fn new(config: ServerConfig, order: usize, transport: Arc<dyn ServerTransport>) -> Self {
        Self {
            config,
            order,
            transport,
            info: RwLock::new(ConnectionInfo {
                state: ConnectionState::Disconnected,
                last_error: None,
                handshake: None,
            }),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.config.name
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.info.read().unwrap_or_else(PoisonError::into_inner).state
    }

    pub(crate) fn mark_connecting(&self) {
        let mut info = self.info.write().unwrap_or_else(PoisonError::into_inner);
        info.state = ConnectionState::Connecting;
    }

    pub(crate) fn handshake(&self) -> Option<Handshake> {
        self.info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handshake
            .clone()
    }

    pub(crate) fn mark_connected(&self, handshake: Handshake) {
        let mut info = self.info.write().unwrap_or_else(PoisonError::into_inner);
        info.state = ConnectionState::Connected;
        info.last_error = None;
        info.handshake = Some(handshake);
    }

    pub(crate) fn mark_disconnected(&self, reason: Option<String>) {
        let mut info = self.info.write().unwrap_or_else(PoisonError::into_inner);
        info.state = ConnectionState::Disconnected;
        if reason.is_some() {
            info.last_error = reason;
        }
    }

    pub(crate) fn status(&self, tool_count: usize) -> ServerStatus {
        let info = self.info.read().unwrap_or_else(PoisonError::into_inner);
        ServerStatus {
            name: self.config.name.clone(),
            state: info.state,
            tool_count,
            last_error: info.last_error.clone(),
            instructions: info
                .handshake
                .as_ref()
                .and_then(|handshake| handshake.instructions.clone()),
        }
    }
}
