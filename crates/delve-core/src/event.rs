use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Progress and completion events of an exploration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The API handed out the initial room and the drones.
    Started {
        session_id: Uuid,
        room_id: String,
        drones: Vec<String>,
    },
    /// A room id was seen for the first time.
    RoomDiscovered { session_id: Uuid, room_id: String },
    /// A valid writing was read.
    WritingFound {
        session_id: Uuid,
        room_id: String,
        order: i64,
        text: String,
    },
    /// One explorer exhausted its frontier.
    ExplorerFinished {
        session_id: Uuid,
        drone_id: String,
        rooms_processed: usize,
    },
    /// The report was acknowledged. Sent exactly once per completed session.
    Finished {
        session_id: Uuid,
        ack: String,
        stats: SessionStats,
    },
    /// The session was cancelled before finishing.
    Cancelled { session_id: Uuid },
    /// The start or report request failed; the session is over.
    Failed { session_id: Uuid, error: String },
}

/// Summary of a finished session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Distinct rooms known to the orchestrator.
    pub rooms_known: usize,
    /// Valid writings that went into the report.
    pub writings_found: usize,
    /// Rooms evaluated per drone.
    pub rooms_processed: BTreeMap<String, usize>,
    /// The aggregated message that was reported.
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A broadcast-based event bus for session progress.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<SessionEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}
