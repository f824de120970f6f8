// Agent record tests - saving, restoring and transcript export on disk.

mod support;

use orrery_core::application::agent::{Agent, AgentRecord, CompletionTarget, PersistError};
use orrery_core::application::status::AgentStatus;
use orrery_core::application::tooling::ToolServerInterface;
use orrery_core::config::AgentSettings;
use orrery_core::domain::content::InboxMessage;
use orrery_core::domain::types::MessageRole;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use support::{MemoryServer, ScriptedProvider, call, connected_manager, reply};
use tempfile::tempdir;

fn target() -> CompletionTarget {
    CompletionTarget {
        provider: "scripted".into(),
        model: "test-model".into(),
        max_rounds: 4,
    }
}

#[tokio::test]
async fn restored_agent_matches_the_saved_one() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("state").join("agent.json");
    let manager = connected_manager(&[MemoryServer::new("files", &["read", "write"])]).await;
    let servers: Arc<dyn ToolServerInterface> = manager.clone();
    let settings = AgentSettings {
        name: "Archivist".into(),
        system_prompt: "Keep records.".into(),
        ..AgentSettings::default()
    };

    let provider = ScriptedProvider::new(vec![
        call("c1", "files:read", json!({ "path": "a" })),
        reply("archived"),
    ]);
    let original = Agent::new(&settings, target(), servers.clone(), provider);
    original.set_tool_enabled("files", "write", false);
    original.add_context_file("notes/plan.md");
    original.push_todo("file the minutes");
    original.push_inbox(InboxMessage::new("Bob", "archive this"));
    original.think().await;
    original.push_inbox(InboxMessage::new("Carol", "later"));

    let record = original.to_record();
    record.save(&path).expect("record saved");
    let loaded = AgentRecord::load(&path).expect("record loaded");
    assert_eq!(loaded, record);

    let restored = Agent::from_record(
        loaded,
        &settings,
        target(),
        servers,
        ScriptedProvider::new(vec![]),
    );
    assert_eq!(restored.id(), original.id());
    assert_eq!(restored.name(), "Archivist");
    assert_eq!(restored.system_prompt(), "Keep records.");
    assert_eq!(restored.status(), original.status());
    assert_eq!(restored.preferences(), original.preferences());
    assert_eq!(restored.context_files(), vec!["notes/plan.md"]);
    assert_eq!(restored.todo(), vec!["file the minutes"]);
    assert_eq!(restored.inbox().len(), 1);
    assert_eq!(restored.history(), original.history());

    let ids: Vec<String> = restored.get_available_tools().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["files:read"]);
}

#[test]
fn error_status_survives_a_round_trip() {
    let json = r#"{
        "id": "7f0c",
        "name": "Ada",
        "system_prompt": "",
        "status": {
            "status": { "state": "error", "message": "sync failed" },
            "changed_at": "2026-01-05T10:00:00Z"
        }
    }"#;
    let record = AgentRecord::from_json(json).expect("minimal record parses");
    assert_eq!(
        record.status.status,
        AgentStatus::Error {
            message: "sync failed".into()
        }
    );
    assert!(record.history.is_empty());
    assert!(record.preferences.is_server_enabled("anything"));

    let again = AgentRecord::from_json(&record.to_json().expect("serializes")).expect("parses");
    assert_eq!(again, record);
}

#[tokio::test]
async fn agent_saved_mid_cycle_restores_ready_to_work() {
    let manager = connected_manager(&[]).await;
    let json = r#"{
        "id": "7f0c",
        "name": "Ada",
        "system_prompt": "",
        "status": {
            "status": { "state": "processing" },
            "changed_at": "2026-01-05T10:00:00Z"
        }
    }"#;
    let record = AgentRecord::from_json(json).expect("record parses");
    let saved_at = record.status.changed_at;
    let agent = Agent::from_record(
        record,
        &AgentSettings::default(),
        target(),
        manager,
        ScriptedProvider::new(vec![reply("back again")]),
    );
    assert_eq!(agent.status().status, AgentStatus::Idle);
    assert!(agent.status().changed_at > saved_at);

    agent.push_inbox(InboxMessage::new("Bob", "still there?"));
    agent.clear_error();
    let report = agent.think().await;
    assert!(!report.skipped_busy);
    assert_eq!(report.inbox_processed, 1);
    assert!(agent.inbox().is_empty());
}

#[test]
fn loading_garbage_is_a_persist_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("agent.json");
    fs::write(&path, "not json").expect("write");

    assert!(matches!(AgentRecord::load(&path), Err(PersistError::Json(_))));
    assert!(matches!(
        AgentRecord::load(&dir.path().join("missing.json")),
        Err(PersistError::Io { .. })
    ));
}

#[tokio::test]
async fn transcript_export_appends_per_agent_log() {
    let dir = tempdir().expect("tempdir");
    let manager = connected_manager(&[]).await;
    let settings = AgentSettings {
        name: "Ada".into(),
        transcript_dir: Some(dir.path().to_path_buf()),
        ..AgentSettings::default()
    };
    let provider = ScriptedProvider::new(vec![reply("first answer"), reply("second answer")]);
    let agent = Agent::new(&settings, target(), manager, provider);

    agent.push_inbox(InboxMessage::new("Bob", "one"));
    agent.think().await;
    let path = agent
        .export_transcript()
        .expect("export works")
        .expect("transcript dir configured");
    agent.push_inbox(InboxMessage::new("Bob", "two"));
    agent.think().await;
    let second = agent.export_transcript().expect("export works");
    assert_eq!(second.as_deref(), Some(path.as_path()));

    let text = fs::read_to_string(&path).expect("log readable");
    let first = text.find("first answer").expect("first cycle logged");
    let later = text.find("second answer").expect("second cycle logged");
    assert!(first < later);
    assert_eq!(text.matches("=== Ada @").count(), 2);
    assert!(agent.history().iter().any(|m| m.role == MessageRole::Assistant));
}
