// Shared fakes for the integration tests: an in-memory MCP server and a
// scripted completion provider.
#![allow(dead_code)]

use async_trait::async_trait;
use orrery_core::application::tooling::{
    Handshake, ServerManager, ServerTransport, ToolInvokeError, TransportFactory,
};
use orrery_core::config::ServerConfig;
use orrery_core::domain::types::{ChatMessage, ToolCall};
use orrery_core::infrastructure::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// How the in-memory server answers one `tools/call`.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// `isError: true` result
    Failure(String),
    /// Broken pipe: the manager drops the connection
    Broken,
}

#[derive(Default)]
pub struct MemoryServer {
    pub name: String,
    tools: Vec<String>,
    scripted: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Mutex<HashMap<String, Reply>>,
    pub calls: Mutex<Vec<(String, Value)>>,
    pub refuse: AtomicBool,
    pub closes: AtomicUsize,
}

impl MemoryServer {
    pub fn new(name: &str, tools: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            tools: tools.iter().map(|tool| tool.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn refusing(name: &str) -> Arc<Self> {
        let server = Self::new(name, &[]);
        server.refuse.store(true, Ordering::SeqCst);
        server
    }

    /// Queues one-shot replies for `tool`, consumed in order.
    pub fn script(&self, tool: &str, replies: Vec<Reply>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(tool.to_string())
            .or_default()
            .extend(replies);
    }

    /// Reply used once the script for `tool` is empty.
    pub fn always(&self, tool: &str, reply: Reply) {
        self.fallback.lock().unwrap().insert(tool.to_string(), reply);
    }

    pub fn calls_to(&self, tool: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == tool)
            .count()
    }

    fn next_reply(&self, tool: &str) -> Reply {
        if let Some(reply) = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(tool)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        self.fallback
            .lock()
            .unwrap()
            .get(tool)
            .cloned()
            .unwrap_or_else(|| Reply::Text(format!("{tool} ok")))
    }
}

#[async_trait]
impl ServerTransport for MemoryServer {
    async fn connect(&self) -> Result<Handshake, ToolInvokeError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ToolInvokeError::Terminated {
                server: self.name.clone(),
            });
        }
        Ok(Handshake {
            server_name: Some(self.name.clone()),
            instructions: None,
            capabilities: json!({ "tools": {} }),
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError> {
        match method {
            "tools/list" => {
                let tools: Vec<Value> = self
                    .tools
                    .iter()
                    .map(|name| json!({ "name": name, "description": format!("{name} tool") }))
                    .collect();
                Ok(json!({ "tools": tools }))
            }
            "tools/call" => {
                let tool = params["name"].as_str().unwrap_or_default().to_string();
                let arguments = params["arguments"].clone();
                self.calls.lock().unwrap().push((tool.clone(), arguments));
                match self.next_reply(&tool) {
                    Reply::Text(text) => Ok(json!({
                        "content": [{ "type": "text", "text": text }],
                        "isError": false
                    })),
                    Reply::Failure(text) => Ok(json!({
                        "content": [{ "type": "text", "text": text }],
                        "isError": true
                    })),
                    Reply::Broken => Err(ToolInvokeError::Transport {
                        server: self.name.clone(),
                        message: "pipe closed".into(),
                    }),
                }
            }
            other => Err(ToolInvokeError::Rpc {
                server: self.name.clone(),
                code: -32601,
                message: format!("method not found: {other}"),
            }),
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MemoryFactory {
    servers: HashMap<String, Arc<MemoryServer>>,
}

impl TransportFactory for MemoryFactory {
    fn create(&self, config: &ServerConfig) -> Arc<dyn ServerTransport> {
        match self.servers.get(&config.name) {
            Some(server) => server.clone(),
            None => MemoryServer::refusing(&config.name),
        }
    }
}

/// A manager whose transports are the given servers, plus the matching
/// configs in the given order.
pub fn memory_manager(servers: &[Arc<MemoryServer>]) -> (Arc<ServerManager>, Vec<ServerConfig>) {
    let factory = MemoryFactory {
        servers: servers
            .iter()
            .map(|server| (server.name.clone(), server.clone()))
            .collect(),
    };
    let configs = servers
        .iter()
        .map(|server| ServerConfig::new(server.name.clone(), "/usr/bin/memory-mcp"))
        .collect();
    (Arc::new(ServerManager::with_factory(Arc::new(factory))), configs)
}

pub async fn connected_manager(servers: &[Arc<MemoryServer>]) -> Arc<ServerManager> {
    let (manager, configs) = memory_manager(servers);
    manager.initialize(configs).await.expect("valid server config");
    manager
}

/// Completion provider that replays a fixed script and records requests.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ChatMessage, String>>>,
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<ChatMessage, String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn offered_tools(&self, request: usize) -> Vec<String> {
        self.requests.lock().unwrap()[request]
            .tools
            .iter()
            .map(|tool| tool.id.clone())
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(message)) => Ok(ModelResponse::from_message(message, None)),
            Some(Err(reason)) => Err(ModelError::invalid_response("scripted", reason)),
            None => Err(ModelError::invalid_response("scripted", "script exhausted")),
        }
    }
}

pub fn reply(text: &str) -> Result<ChatMessage, String> {
    Ok(ChatMessage::assistant(text))
}

pub fn call(id: &str, tool: &str, arguments: Value) -> Result<ChatMessage, String> {
    Ok(ChatMessage::assistant_with_tools(
        "",
        vec![ToolCall::new(id, tool, arguments)],
    ))
}
