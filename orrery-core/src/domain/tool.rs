//! Tool-protocol value objects shared by the registry, the manager and agents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator between server name and tool name in a fully-qualified id.
pub const QUALIFIER: char = ':';

/// One callable capability and its owning server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub server: String,
    pub name: String,
    /// Fully-qualified id, always `server:name`.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl ToolDescriptor {
    pub fn new(server: impl Into<String>, name: impl Into<String>) -> Self {
        let server = server.into();
        let name = name.into();
        Self {
            id: qualified_id(&server, &name),
            server,
            name,
            description: None,
            input_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

pub fn qualified_id(server: &str, tool: &str) -> String {
    format!("{server}{QUALIFIER}{tool}")
}

/// Splits `server:tool` into its parts. Bare names return `None`.
pub fn split_qualified(id: &str) -> Option<(&str, &str)> {
    let (server, tool) = id.split_once(QUALIFIER)?;
    if server.is_empty() || tool.is_empty() {
        return None;
    }
    Some((server, tool))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub server: String,
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDescriptor {
    pub server: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
}

/// One block of tool output, tagged with its kind (`text`, `image`, ...).
///
/// Text blocks carry the text as a JSON string; other kinds keep the raw
/// block as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub kind: String,
    pub payload: Value,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            payload: Value::String(text.into()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        if self.kind.eq_ignore_ascii_case("text") {
            self.payload.as_str()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: true,
        }
    }

    /// Text blocks joined by newlines; non-text blocks are rendered as JSON.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|block| match block.as_text() {
                Some(text) => text.to_string(),
                None => block.payload.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_id_is_server_qualified() {
        let tool = ToolDescriptor::new("files", "read");
        assert_eq!(tool.id, "files:read");
    }

    #[test]
    fn split_qualified_rejects_bare_and_partial_ids() {
        assert_eq!(split_qualified("files:read"), Some(("files", "read")));
        assert_eq!(split_qualified("read"), None);
        assert_eq!(split_qualified(":read"), None);
        assert_eq!(split_qualified("files:"), None);
    }

    #[test]
    fn text_content_renders_non_text_blocks_as_json() {
        let result = ToolCallResult {
            content: vec![
                ContentBlock::text("first"),
                ContentBlock {
                    kind: "image".into(),
                    payload: json!({ "type": "image", "mimeType": "image/png" }),
                },
            ],
            is_error: false,
        };
        let rendered = result.text_content();
        assert!(rendered.starts_with("first\n"));
        assert!(rendered.contains("image/png"));
    }
}
