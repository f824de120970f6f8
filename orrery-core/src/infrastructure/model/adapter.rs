//! Message adapters - convert between the canonical history and wire formats

use crate::domain::tool::{QUALIFIER, ToolDescriptor};
use crate::domain::types::{ChatMessage, MessageRole, ToolCall};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Stand-in for `server:tool` in function names, which may not contain `:`.
const WIRE_SEPARATOR: &str = "__";

pub struct MessageAdapter;

impl MessageAdapter {
    /// Function name sent to the provider for a tool id.
    pub fn wire_tool_name(id: &str) -> String {
        id.replacen(QUALIFIER, WIRE_SEPARATOR, 1)
    }

    /// Inverse of [`Self::wire_tool_name`]. Names without the separator are
    /// passed through untouched.
    pub fn tool_name_from_wire(name: &str) -> String {
        match name.split_once(WIRE_SEPARATOR) {
            Some((server, tool)) if !server.is_empty() && !tool.is_empty() => {
                format!("{server}{QUALIFIER}{tool}")
            }
            _ => name.to_string(),
        }
    }

    /// `[{"role": "...", "content": "...", ...}]` with OpenAI tool-call fields
    pub fn to_openai_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut value = json!({
                    "role": msg.role.as_str(),
                    "content": msg.content.clone()
                });
                if msg.has_tool_calls() {
                    value["tool_calls"] = msg
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": Self::wire_tool_name(&call.name),
                                    "arguments": call.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                }
                if let Some(id) = &msg.tool_call_id {
                    value["tool_call_id"] = json!(id);
                }
                value
            })
            .collect()
    }

    /// Ollama takes the same shape, but tool arguments are objects and
    /// calls carry no ids.
    pub fn to_ollama_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut value = json!({
                    "role": msg.role.as_str(),
                    "content": msg.content.clone()
                });
                if msg.has_tool_calls() {
                    value["tool_calls"] = msg
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "function": {
                                    "name": Self::wire_tool_name(&call.name),
                                    "arguments": call.arguments,
                                }
                            })
                        })
                        .collect();
                }
                value
            })
            .collect()
    }

    /// Function declarations understood by both OpenAI and Ollama.
    pub fn tools_format(tools: &[ToolDescriptor]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                let parameters = tool
                    .input_schema
                    .clone()
                    .unwrap_or_else(|| json!({ "type": "object", "properties": {} }));
                json!({
                    "type": "function",
                    "function": {
                        "name": Self::wire_tool_name(&tool.id),
                        "description": tool.description.clone().unwrap_or_default(),
                        "parameters": parameters,
                    }
                })
            })
            .collect()
    }

    /// Builds the canonical assistant message from a wire reply.
    ///
    /// `tool_calls` entries may carry arguments as a JSON string (OpenAI) or
    /// an object (Ollama). Calls without an id get a fresh one.
    pub fn assistant_from_wire(content: Option<String>, tool_calls: &[Value]) -> ChatMessage {
        let calls = tool_calls
            .iter()
            .filter_map(|call| {
                let function = call.get("function")?;
                let name = function.get("name")?.as_str()?;
                let arguments = match function.get("arguments") {
                    Some(Value::String(raw)) if raw.trim().is_empty() => Value::Object(Map::new()),
                    Some(Value::String(raw)) => {
                        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
                    }
                    Some(other) => other.clone(),
                    None => Value::Object(Map::new()),
                };
                let id = call
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
                Some(ToolCall::new(id, Self::tool_name_from_wire(name), arguments))
            })
            .collect();
        ChatMessage {
            tool_calls: calls,
            ..ChatMessage::new(MessageRole::Assistant, content.unwrap_or_default())
        }
    }
}
