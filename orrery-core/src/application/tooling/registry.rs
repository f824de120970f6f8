//! Per-server catalog of tools, resources and prompts.
//!
//! A registry value is immutable once built. The manager swaps whole
//! registries behind an `Arc`, so readers always see a complete snapshot.

use crate::domain::tool::{PromptDescriptor, ResourceDescriptor, ToolDescriptor, split_qualified};
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerCatalog {
    pub server: String,
    /// Position of the server in the configuration; resolution order.
    pub order: usize,
    pub tools: Vec<ToolDescriptor>,
    pub resources: Vec<ResourceDescriptor>,
    pub prompts: Vec<PromptDescriptor>,
}

impl ServerCatalog {
    pub fn new(server: impl Into<String>, order: usize) -> Self {
        Self {
            server: server.into(),
            order,
            ..Self::default()
        }
    }

    /// Drops repeated tool names so `server:tool` stays unique.
    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        let mut seen = HashSet::new();
        self.tools = tools
            .into_iter()
            .filter(|tool| {
                let fresh = seen.insert(tool.name.clone());
                if !fresh {
                    warn!(
                        server = %self.server,
                        tool = %tool.name,
                        "server listed the same tool twice; keeping the first entry"
                    );
                }
                fresh
            })
            .collect();
        self
    }

    pub fn with_resources(mut self, resources: Vec<ResourceDescriptor>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_prompts(mut self, prompts: Vec<PromptDescriptor>) -> Self {
        self.prompts = prompts;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolRegistry {
    catalogs: Vec<ServerCatalog>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a registry where `catalog` replaces any prior catalog of the
    /// same server. Catalogs stay sorted by configuration order.
    pub fn with_catalog(&self, catalog: ServerCatalog) -> Self {
        let mut catalogs: Vec<ServerCatalog> = self
            .catalogs
            .iter()
            .filter(|existing| existing.server != catalog.server)
            .cloned()
            .collect();
        let position = catalogs
            .iter()
            .position(|existing| existing.order > catalog.order)
            .unwrap_or(catalogs.len());
        catalogs.insert(position, catalog);
        Self { catalogs }
    }

    pub fn without_server(&self, server: &str) -> Self {
        Self {
            catalogs: self
                .catalogs
                .iter()
                .filter(|catalog| catalog.server != server)
                .cloned()
                .collect(),
        }
    }

    pub fn servers(&self) -> impl Iterator<Item = &str> {
        self.catalogs.iter().map(|catalog| catalog.server.as_str())
    }

    pub fn catalog(&self, server: &str) -> Option<&ServerCatalog> {
        self.catalogs.iter().find(|catalog| catalog.server == server)
    }

    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.catalogs
            .iter()
            .flat_map(|catalog| catalog.tools.iter().cloned())
            .collect()
    }

    pub fn resources(&self) -> Vec<ResourceDescriptor> {
        self.catalogs
            .iter()
            .flat_map(|catalog| catalog.resources.iter().cloned())
            .collect()
    }

    pub fn prompts(&self) -> Vec<PromptDescriptor> {
        self.catalogs
            .iter()
            .flat_map(|catalog| catalog.prompts.iter().cloned())
            .collect()
    }

    pub fn tool(&self, server: &str, tool: &str) -> Option<&ToolDescriptor> {
        self.catalog(server)?
            .tools
            .iter()
            .find(|descriptor| descriptor.name == tool)
    }

    /// Resolves a tool to its server.
    ///
    /// A `server:tool` id resolves to that server if it owns the tool. A bare
    /// name resolves to the first server in configuration order that owns it.
    /// Known limitation: a bare name shared by several servers always lands
    /// on the earliest one; callers wanting another server must qualify.
    pub fn find_server_for_tool(&self, tool: &str) -> Option<&str> {
        if let Some((server, name)) = split_qualified(tool) {
            if self.tool(server, name).is_some() {
                return Some(self.catalog(server)?.server.as_str());
            }
        }
        self.catalogs
            .iter()
            .find(|catalog| catalog.tools.iter().any(|descriptor| descriptor.name == tool))
            .map(|catalog| catalog.server.as_str())
    }

    pub fn tool_count(&self) -> usize {
        self.catalogs.iter().map(|catalog| catalog.tools.len()).sum()
    }
}
