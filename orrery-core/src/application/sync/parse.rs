//! Lenient decoding of fetched content.
//!
//! Servers may answer with JSON or with plain lines; both are accepted.

use crate::domain::content::{ContentKind, InboxMessage, RemoteContent};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

pub fn parse_content(kind: ContentKind, text: &str) -> RemoteContent {
    match kind {
        ContentKind::Notepad => RemoteContent::Notepad(parse_notepad(text)),
        ContentKind::Todo => RemoteContent::Todo(parse_todo(text)),
        ContentKind::Inbox => RemoteContent::Inbox(parse_inbox(text)),
    }
}

fn parse_notepad(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::String(inner)) => inner,
        Ok(Value::Object(map)) => map
            .get("notepad")
            .or_else(|| map.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| text.to_string()),
        _ => text.to_string(),
    }
}

fn parse_todo(text: &str) -> Vec<String> {
    if let Some(items) = json_array(text, &["todo", "todos", "items"]) {
        return items
            .iter()
            .filter_map(|item| match item {
                Value::String(task) => Some(task.clone()),
                Value::Object(map) => ["task", "title", "content"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str))
                    .map(str::to_string),
                _ => None,
            })
            .filter(|task| !task.trim().is_empty())
            .collect();
    }
    text.lines()
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_inbox(text: &str) -> Vec<InboxMessage> {
    let messages: Vec<(InboxMessage, Option<String>)> =
        match json_array(text, &["inbox", "messages"]) {
            Some(items) => items.iter().filter_map(inbox_from_json).collect(),
            None => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| match line.split_once(':') {
                    Some((sender, content)) if !sender.trim().is_empty() => {
                        InboxMessage::new(sender.trim(), content.trim())
                    }
                    _ => InboxMessage::new("unknown", line),
                })
                .map(|message| (message, None))
                .collect(),
        };
    with_stable_ids(messages)
}

/// Server ids win; otherwise repeats of one sender/content pair are
/// numbered in fetch order so each keeps the same id on the next fetch.
fn with_stable_ids(messages: Vec<(InboxMessage, Option<String>)>) -> Vec<InboxMessage> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    messages
        .into_iter()
        .map(|(mut message, remote_id)| {
            message.id = match remote_id {
                Some(id) => id,
                None => {
                    let nth = seen.entry(message.derived_id(0)).or_insert(0);
                    let id = message.derived_id(*nth);
                    *nth += 1;
                    id
                }
            };
            message
        })
        .collect()
}

fn inbox_from_json(item: &Value) -> Option<(InboxMessage, Option<String>)> {
    let content = str_field(item, &["content", "message", "text"])?;
    let sender = str_field(item, &["sender", "from"]).unwrap_or("unknown");
    let mut message = InboxMessage::new(sender, content);
    if let Some(received_at) = str_field(item, &["received_at", "timestamp"])
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
    {
        message.received_at = received_at.with_timezone(&Utc);
    }
    let remote_id = match item.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };
    Some((message, remote_id))
}

fn str_field<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str))
}

/// A top-level JSON array, or an array under one of `keys`.
fn json_array(text: &str, keys: &[&str]) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => keys.iter().find_map(|key| match map.remove(*key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }),
        _ => None,
    }
}

fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    for prefix in ["- [ ] ", "- [x] ", "* [ ] ", "- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return rest.trim();
        }
    }
    match line.split_once(". ") {
        Some((number, rest)) if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) => {
            rest.trim()
        }
        _ => line,
    }
}
