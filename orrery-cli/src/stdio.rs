//! JSON-lines session on stdin/stdout.
//!
//! Each input line is one request; each gets exactly one response line.
//! A line that is not JSON is delivered to the agent's inbox as a message
//! from `user`.

use crate::runtime::{Session, last_reply};
use orrery_core::domain::content::InboxMessage;
use orrery_core::domain::tool::ToolDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize stdio response: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StdioRequest {
    Message {
        #[serde(default = "default_sender")]
        sender: String,
        content: String,
    },
    Todo {
        task: String,
    },
    Think,
    Call {
        tool: String,
        #[serde(default)]
        arguments: Value,
    },
    Tools,
    Servers,
    Status,
    History,
    Enable {
        server: String,
        #[serde(default)]
        tool: Option<String>,
    },
    Disable {
        server: String,
        #[serde(default)]
        tool: Option<String>,
    },
    Refresh,
    ClearError,
    Export,
}

fn default_sender() -> String {
    "user".to_string()
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StdioResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StdioResponse {
    fn success(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Parses one input line. Non-JSON text becomes a message from `user`.
pub fn parse_line(line: &str) -> Result<StdioRequest, serde_json::Error> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return Ok(StdioRequest::Message {
            sender: default_sender(),
            content: trimmed.to_string(),
        });
    }
    serde_json::from_str(trimmed)
}

pub async fn handle_request(session: &Session, request: StdioRequest) -> StdioResponse {
    let agent = &session.agent;
    match request {
        StdioRequest::Message { sender, content } => {
            if content.trim().is_empty() {
                return StdioResponse::error("message content cannot be empty");
            }
            agent.push_inbox(InboxMessage::new(sender, content));
            think(session).await
        }
        StdioRequest::Todo { task } => {
            agent.push_todo(task);
            StdioResponse::success(json!({ "todo": agent.todo() }))
        }
        StdioRequest::Think => think(session).await,
        StdioRequest::Call { tool, arguments } => {
            let arguments = if arguments.is_null() { json!({}) } else { arguments };
            match agent.call_mcp_tool(&tool, arguments).await {
                Ok(result) => StdioResponse {
                    ok: !result.is_error,
                    data: Some(json!({ "content": result.text_content(), "is_error": result.is_error })),
                    error: None,
                },
                Err(err) => StdioResponse::error(err.to_string()),
            }
        }
        StdioRequest::Tools => {
            let ids = |tools: Vec<ToolDescriptor>| {
                tools.into_iter().map(|tool| tool.id).collect::<Vec<_>>()
            };
            StdioResponse::success(json!({
                "available": ids(agent.get_available_tools()),
                "catalog": ids(session.manager.get_all_tools()),
            }))
        }
        StdioRequest::Servers => StdioResponse::success(servers_json(session)),
        StdioRequest::Status => StdioResponse::success(json!({
            "agent": agent.name(),
            "status": agent.status(),
            "inbox": agent.inbox().len(),
            "todo": agent.todo(),
            "notepad": agent.notepad(),
        })),
        StdioRequest::History => StdioResponse::success(json!(agent.history())),
        StdioRequest::Enable { server, tool } => set_preference(session, &server, tool, true),
        StdioRequest::Disable { server, tool } => set_preference(session, &server, tool, false),
        StdioRequest::Refresh => {
            let summary = session.manager.refresh_all().await;
            StdioResponse::success(json!({
                "connected": summary.connected,
                "failed": summary.failed,
                "tools": summary.total_tools,
            }))
        }
        StdioRequest::ClearError => {
            agent.clear_error();
            StdioResponse::success(json!({ "status": agent.status() }))
        }
        StdioRequest::Export => match agent.export_transcript() {
            Ok(Some(path)) => StdioResponse::success(json!({ "path": path.display().to_string() })),
            Ok(None) => StdioResponse::error("no transcript directory configured"),
            Err(err) => StdioResponse::error(err.to_string()),
        },
    }
}

async fn think(session: &Session) -> StdioResponse {
    let agent = &session.agent;
    let report = agent.think().await;
    let reply = last_reply(agent);
    let data = json!({
        "reply": reply,
        "inbox_processed": report.inbox_processed,
        "todo_processed": report.todo_processed,
        "busy": report.skipped_busy,
        "status": agent.status(),
    });
    StdioResponse {
        ok: report.error.is_none(),
        data: Some(data),
        error: report.error,
    }
}

fn set_preference(
    session: &Session,
    server: &str,
    tool: Option<String>,
    enabled: bool,
) -> StdioResponse {
    let agent = &session.agent;
    match tool {
        Some(tool) => agent.set_tool_enabled(server, &tool, enabled),
        None => agent.set_server_enabled(server, enabled),
    }
    StdioResponse::success(json!({ "preferences": agent.preferences() }))
}

pub(crate) fn servers_json(session: &Session) -> Value {
    let servers: Vec<Value> = session
        .manager
        .server_statuses()
        .into_iter()
        .map(|status| {
            json!({
                "name": status.name,
                "state": status.state.to_string(),
                "tools": status.tool_count,
                "last_error": status.last_error,
                "instructions": status.instructions,
            })
        })
        .collect();
    json!(servers)
}

pub async fn run(session: &Session) -> Result<(), StdioError> {
    let stdin = BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = io::stdout();
    info!(agent = %session.agent.name(), "Entering STDIO mode; awaiting input lines");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Received STDIO line");

        let response = match parse_line(&line) {
            Ok(request) => handle_request(session, request).await,
            Err(error) => {
                error!(%error, "Failed to parse STDIO input line");
                StdioResponse::error(format!("invalid request: {error}"))
            }
        };
        write_response(&mut stdout, &response).await?;
    }

    stdout.flush().await?;
    Ok(())
}

async fn write_response(stdout: &mut io::Stdout, response: &StdioResponse) -> Result<(), StdioError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    stdout.write_all(&payload).await?;
    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_user_message() {
        assert_eq!(
            parse_line("  hello there ").unwrap(),
            StdioRequest::Message {
                sender: "user".into(),
                content: "hello there".into()
            }
        );
    }

    #[test]
    fn json_requests_are_tagged_by_type() {
        assert_eq!(
            parse_line(r#"{"type": "disable", "server": "files"}"#).unwrap(),
            StdioRequest::Disable {
                server: "files".into(),
                tool: None
            }
        );
        assert_eq!(
            parse_line(r#"{"type": "message", "sender": "Bob", "content": "ping"}"#).unwrap(),
            StdioRequest::Message {
                sender: "Bob".into(),
                content: "ping".into()
            }
        );
        assert!(parse_line(r#"{"type": "launch"}"#).is_err());
    }

    #[test]
    fn error_response_omits_data() {
        let json = serde_json::to_value(StdioResponse::error("nope")).unwrap();
        assert_eq!(json, json!({ "ok": false, "error": "nope" }));
    }
}
