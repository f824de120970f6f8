// Content sync tests - fetching agent content through the server manager,
// bounded backoff, and the timer lifecycle. Time is paused so backoff and
// interval sleeps complete instantly.

mod support;

use orrery_core::application::agent::{Agent, CompletionTarget};
use orrery_core::application::status::AgentStatus;
use orrery_core::application::sync::{ContentSyncEngine, SyncPhase};
use orrery_core::application::tooling::{ServerManager, ToolServerInterface};
use orrery_core::config::{AgentSettings, SyncConfig};
use orrery_core::domain::content::ContentKind;
use std::sync::Arc;
use std::time::Duration;
use support::{MemoryServer, Reply, ScriptedProvider, connected_manager};
use tokio::time::{Instant, sleep};

fn sync_config() -> SyncConfig {
    SyncConfig {
        enabled: true,
        server: "workspace".into(),
        interval: Duration::from_secs(10),
        base_delay: Duration::from_secs(1),
        ceiling: Duration::from_secs(30),
        notepad_tool: Some("get_notepad".into()),
        todo_tool: Some("get_todo".into()),
        inbox_tool: Some("get_inbox".into()),
    }
}

fn workspace() -> Arc<MemoryServer> {
    let server = MemoryServer::new("workspace", &["get_notepad", "get_todo", "get_inbox"]);
    server.always("get_notepad", Reply::Text("Remember the milk".into()));
    server.always(
        "get_todo",
        Reply::Text(r#"["draft agenda", {"task": "book room"}]"#.into()),
    );
    server.always("get_inbox", Reply::Text("Bob: lunch?\nCarol: standup moved".into()));
    server
}

fn agent(manager: &Arc<ServerManager>) -> Arc<Agent> {
    let servers: Arc<dyn ToolServerInterface> = manager.clone();
    Arc::new(Agent::new(
        &AgentSettings::default(),
        CompletionTarget {
            provider: "scripted".into(),
            model: "test-model".into(),
            max_rounds: 4,
        },
        servers,
        ScriptedProvider::new(vec![]),
    ))
}

fn engine(manager: &Arc<ServerManager>) -> ContentSyncEngine {
    ContentSyncEngine::new(manager.clone(), sync_config())
}

#[tokio::test(start_paused = true)]
async fn fetched_content_replaces_agent_state() {
    let server = workspace();
    let manager = connected_manager(&[server.clone()]).await;
    let agent = agent(&manager);
    let engine = engine(&manager);

    let report = engine.fetch_agent_content(&agent).await;

    assert!(report.is_complete());
    assert_eq!(report.synced.len(), 3);
    assert_eq!(agent.notepad().as_deref(), Some("Remember the milk"));
    assert_eq!(agent.todo(), vec!["draft agenda", "book room"]);
    let inbox = agent.inbox();
    assert_eq!(inbox.len(), 2);
    assert_eq!(inbox[0].sender, "Bob");
    assert_eq!(inbox[1].content, "standup moved");
    assert!(agent.last_synced(ContentKind::Inbox).is_some());

    let (tool, arguments) = server.calls.lock().unwrap()[0].clone();
    assert!(tool.starts_with("get_"));
    assert_eq!(arguments["agent_id"], agent.id());
}

#[tokio::test(start_paused = true)]
async fn failing_kind_exhausts_within_ceiling_and_others_still_sync() {
    let server = workspace();
    server.always("get_inbox", Reply::Failure("inbox store offline".into()));
    let manager = connected_manager(&[server.clone()]).await;
    let agent = agent(&manager);
    let engine = engine(&manager);

    let started = Instant::now();
    let report = engine.fetch_agent_content(&agent).await;
    let elapsed = started.elapsed();

    assert_eq!(report.synced, vec![ContentKind::Notepad, ContentKind::Todo]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, ContentKind::Inbox);
    assert!(report.failed[0].1.contains("inbox store offline"));

    // 1 + 2 + 4 + 8 seconds of backoff; the next 16 s would pass the ceiling.
    assert_eq!(server.calls_to("get_inbox"), 5);
    assert_eq!(elapsed, Duration::from_secs(15));
    assert!(elapsed <= engine.policy().ceiling);

    assert!(agent.inbox().is_empty());
    assert!(agent.last_synced(ContentKind::Inbox).is_none());
    assert!(matches!(agent.status().status, AgentStatus::Error { .. }));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover_before_the_ceiling() {
    let server = workspace();
    server.script(
        "get_notepad",
        vec![Reply::Failure("busy".into()), Reply::Failure("busy".into())],
    );
    let manager = connected_manager(&[server.clone()]).await;
    let agent = agent(&manager);
    let engine = engine(&manager);

    let started = Instant::now();
    let report = engine.fetch_agent_content(&agent).await;

    assert!(report.is_complete());
    assert_eq!(server.calls_to("get_notepad"), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(agent.notepad().as_deref(), Some("Remember the milk"));
    assert_eq!(agent.status().status, AgentStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn timer_follows_start_pause_resume_and_stop() {
    let server = workspace();
    let manager = connected_manager(&[server.clone()]).await;
    let agent = agent(&manager);
    let engine = engine(&manager);
    assert_eq!(engine.phase(), SyncPhase::Idle);

    engine.set_active_agent(Some(agent.clone()));
    engine.start();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(engine.phase(), SyncPhase::Running);
    assert_eq!(server.calls_to("get_notepad"), 1);
    assert_eq!(engine.active_agent_id().as_deref(), Some(agent.id()));

    sleep(Duration::from_secs(10)).await;
    assert_eq!(server.calls_to("get_notepad"), 2);

    engine.pause();
    sleep(Duration::from_secs(60)).await;
    assert_eq!(engine.phase(), SyncPhase::Paused);
    assert_eq!(server.calls_to("get_notepad"), 2);

    engine.resume();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(server.calls_to("get_notepad"), 3);

    engine.stop();
    sleep(Duration::from_secs(60)).await;
    assert_eq!(engine.phase(), SyncPhase::Stopped);
    assert_eq!(server.calls_to("get_notepad"), 3);
    assert_eq!(engine.active_agent_id().as_deref(), Some(agent.id()));
}
