//! # orrery-core
//!
//! Runtime for autonomous agents that work through MCP tool servers.
//!
//! - [`application::tooling::ServerManager`] connects the configured servers
//!   and keeps one shared catalog of their tools, resources and prompts.
//! - [`application::agent::Agent`] drains an inbox and a to-do list through
//!   completion cycles, calling only the tools it has enabled.
//! - [`application::sync::ContentSyncEngine`] mirrors the active agent's
//!   content from a server with bounded backoff.
//!
//! The entry point builds the manager once and hands it to every agent.

pub mod application;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use application::agent::{Agent, AgentError, AgentRecord, CompletionTarget};
pub use application::status::{AgentStatus, StatusModel};
pub use application::sync::ContentSyncEngine;
pub use application::tooling::{DiscoverySummary, ServerManager, ToolServerInterface};
pub use config::AppConfig;
pub use infrastructure::model::{ModelProvider, ModelRequest, ModelResponse};
