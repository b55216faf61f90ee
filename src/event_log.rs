//! Event log for engine activity (v0.1)
//!
//! Append-only audit trail of everything the engine does:
//! - Event: envelope with id + timestamp + kind
//! - EventKind: lifecycle / reconciliation / fine-grained write & asset
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in the engine activity log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since log creation (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// All possible event types (3 levels)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // LIFECYCLE LEVEL
    // ═══════════════════════════════════════════
    EngineStarted {
        root: String,
    },
    EngineStopped,

    // ═══════════════════════════════════════════
    // RECONCILIATION LEVEL
    // ═══════════════════════════════════════════
    SnapshotReceived,
    PassCompleted {
        applied: usize,
        duration_ms: u64,
    },
    CollectionExpanded {
        path: String,
        children: usize,
    },

    // ═══════════════════════════════════════════
    // FINE-GRAINED (writes/assets)
    // ═══════════════════════════════════════════
    WriteIssued {
        path: String,
    },
    RemoveIssued {
        path: String,
    },
    PushIssued {
        path: String,
        key: String,
    },
    WriteFailed {
        path: String,
        error: String,
    },
    ConfirmDeclined {
        path: String,
    },
    UploadAdvanced {
        path: String,
        stage: String,
    },
    AssetFetchQueued {
        path: String,
    },
    AssetApplied {
        path: String,
    },
    AssetOpened {
        path: String,
    },
    AssetFetchFailed {
        path: String,
        error: String,
    },
    StaleFetchDropped {
        path: String,
    },
}

impl EventKind {
    /// Extract the store path if the event is path-related
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::CollectionExpanded { path, .. }
            | Self::WriteIssued { path }
            | Self::RemoveIssued { path }
            | Self::PushIssued { path, .. }
            | Self::WriteFailed { path, .. }
            | Self::ConfirmDeclined { path }
            | Self::UploadAdvanced { path, .. }
            | Self::AssetFetchQueued { path }
            | Self::AssetApplied { path }
            | Self::AssetOpened { path }
            | Self::AssetFetchFailed { path, .. }
            | Self::StaleFetchDropped { path } => Some(path),
            Self::EngineStarted { .. }
            | Self::EngineStopped
            | Self::SnapshotReceived
            | Self::PassCompleted { .. } => None,
        }
    }

    /// Check if this is a lifecycle-level event
    pub fn is_lifecycle_event(&self) -> bool {
        matches!(self, Self::EngineStarted { .. } | Self::EngineStopped)
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Create a new event log (call at engine construction)
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Filter events by store path
    pub fn filter_path(&self, path: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.path() == Some(path))
            .collect()
    }

    /// Filter lifecycle-level events only
    pub fn lifecycle_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.is_lifecycle_event())
            .collect()
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}
