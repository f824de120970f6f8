//! Adapters between MCP JSON payloads and the internal descriptor types.
//!
//! Nothing outside this file looks at raw `tools/list` or `tools/call`
//! shapes.

use super::transport::Handshake;
use crate::domain::tool::{
    ContentBlock, PromptDescriptor, ResourceDescriptor, ToolCallResult, ToolDescriptor,
};
use serde_json::{Value, json};

pub(crate) fn parse_handshake(result: &Value) -> Handshake {
    Handshake {
        server_name: result
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .map(str::to_string),
        instructions: result
            .get("instructions")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
        capabilities: result
            .get("capabilities")
            .cloned()
            .unwrap_or_else(|| json!({})),
    }
}

pub(crate) fn next_cursor(result: &Value) -> Option<String> {
    result
        .get("nextCursor")
        .and_then(Value::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_tools(server: &str, result: &Value) -> Vec<ToolDescriptor> {
    items(result, "tools")
        .filter_map(|tool| {
            let name = tool.get("name").and_then(Value::as_str)?;
            let mut descriptor = ToolDescriptor::new(server, name);
            descriptor.description = text_field(tool, "description");
            descriptor.input_schema = tool.get("inputSchema").cloned();
            Some(descriptor)
        })
        .collect()
}

pub(crate) fn parse_resources(server: &str, result: &Value) -> Vec<ResourceDescriptor> {
    items(result, "resources")
        .filter_map(|resource| {
            let uri = resource.get("uri").and_then(Value::as_str)?;
            Some(ResourceDescriptor {
                server: server.to_string(),
                uri: uri.to_string(),
                name: text_field(resource, "name").unwrap_or_else(|| uri.to_string()),
                description: text_field(resource, "description"),
                mime_type: text_field(resource, "mimeType"),
            })
        })
        .collect()
}

pub(crate) fn parse_prompts(server: &str, result: &Value) -> Vec<PromptDescriptor> {
    items(result, "prompts")
        .filter_map(|prompt| {
            let name = prompt.get("name").and_then(Value::as_str)?;
            let arguments = prompt
                .get("arguments")
                .and_then(Value::as_array)
                .map(|args| {
                    args.iter()
                        .filter_map(|arg| arg.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some(PromptDescriptor {
                server: server.to_string(),
                name: name.to_string(),
                description: text_field(prompt, "description"),
                arguments,
            })
        })
        .collect()
}

pub(crate) fn call_params(tool: &str, arguments: Value) -> Value {
    json!({
        "name": tool,
        "arguments": match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        }
    })
}

pub(crate) fn parse_call_result(result: &Value) -> ToolCallResult {
    let mut content: Vec<ContentBlock> = items(result, "content")
        .map(|block| {
            let kind = block
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            match block.get("text").and_then(Value::as_str) {
                Some(text) if kind.eq_ignore_ascii_case("text") => ContentBlock::text(text),
                _ => ContentBlock {
                    kind,
                    payload: block.clone(),
                },
            }
        })
        .collect();

    if content.is_empty() {
        if let Some(structured) = result.get("structuredContent") {
            content.push(ContentBlock {
                kind: "structured".to_string(),
                payload: structured.clone(),
            });
        }
    }

    ToolCallResult {
        content,
        is_error: result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

fn items<'a>(result: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    result
        .get(key)
        .and_then(Value::as_array)
        .map(|array| array.iter())
        .into_iter()
        .flatten()
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
