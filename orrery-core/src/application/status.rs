//! Agent processing state: `idle`, `processing` or `error`.
//!
//! Every setter writes the new value and notifies watchers in one step
//! through a [`tokio::sync::watch`] channel. Transitions are never rejected;
//! callers use [`StatusModel::is_processing`] to guard against re-entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Processing,
    Error { message: String },
}

impl AgentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Processing => "processing",
            AgentStatus::Error { .. } => "error",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            AgentStatus::Error { message } => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Error { message } => write!(f, "error: {message}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Status plus the moment it was set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: AgentStatus,
    pub changed_at: DateTime<Utc>,
}

impl StatusSnapshot {
    fn now(status: AgentStatus) -> Self {
        Self {
            status,
            changed_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct StatusModel {
    tx: watch::Sender<StatusSnapshot>,
}

impl Default for StatusModel {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusModel {
    pub fn new() -> Self {
        Self::restore(StatusSnapshot::now(AgentStatus::Idle))
    }

    /// Starts from a previously persisted snapshot, keeping its timestamp.
    ///
    /// No cycle survives a restart, so a saved `processing` comes back as
    /// `idle` stamped now.
    pub fn restore(snapshot: StatusSnapshot) -> Self {
        let snapshot = if snapshot.status == AgentStatus::Processing {
            warn!(
                saved_at = %snapshot.changed_at,
                "Restored status was processing; an interrupted cycle is reset to idle"
            );
            StatusSnapshot::now(AgentStatus::Idle)
        } else {
            snapshot
        };
        let (tx, _) = watch::channel(snapshot);
        Self { tx }
    }

    pub fn set_processing_status(&self) {
        self.set(AgentStatus::Processing);
    }

    pub fn set_idle_status(&self) {
        self.set(AgentStatus::Idle);
    }

    pub fn set_error_status(&self, message: impl Into<String>) {
        self.set(AgentStatus::Error {
            message: message.into(),
        });
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub fn status(&self) -> AgentStatus {
        self.tx.borrow().status.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.tx.borrow().status == AgentStatus::Processing
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    fn set(&self, status: AgentStatus) {
        debug!(status = status.label(), "Agent status changed");
        self.tx.send_replace(StatusSnapshot::now(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let model = StatusModel::new();
        assert_eq!(model.status(), AgentStatus::Idle);
        assert!(!model.is_processing());
    }

    #[test]
    fn every_transition_is_accepted_and_stamped() {
        let model = StatusModel::new();
        let before = model.snapshot().changed_at;

        model.set_error_status("boom");
        assert_eq!(model.status().error_message(), Some("boom"));
        model.set_processing_status();
        model.set_processing_status();
        assert!(model.is_processing());
        model.set_idle_status();

        assert_eq!(model.status(), AgentStatus::Idle);
        assert!(model.snapshot().changed_at >= before);
    }

    #[test]
    fn restoring_processing_comes_back_idle() {
        let saved_at = "2026-01-05T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let model = StatusModel::restore(StatusSnapshot {
            status: AgentStatus::Processing,
            changed_at: saved_at,
        });
        assert_eq!(model.status(), AgentStatus::Idle);
        assert!(model.snapshot().changed_at > saved_at);

        let error = StatusSnapshot {
            status: AgentStatus::Error {
                message: "sync failed".into(),
            },
            changed_at: saved_at,
        };
        assert_eq!(StatusModel::restore(error.clone()).snapshot(), error);
    }

    #[tokio::test]
    async fn subscribers_observe_the_latest_value() {
        let model = StatusModel::new();
        let mut rx = model.subscribe();

        model.set_processing_status();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().status, AgentStatus::Processing);

        model.set_error_status("lost connection");
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow().status,
            AgentStatus::Error {
                message: "lost connection".into()
            }
        );
    }

    #[test]
    fn snapshot_serializes_tagged_status() {
        let model = StatusModel::new();
        model.set_error_status("x");
        let json = serde_json::to_value(model.snapshot()).unwrap();
        assert_eq!(json["status"]["state"], "error");
        assert_eq!(json["status"]["message"], "x");
        assert!(json.get("changed_at").is_some());
    }
}
