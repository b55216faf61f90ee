//! Surface-to-store synchronization (v0.1)
//!
//! The write direction of the binding. Every operation is fire-and-forget:
//! a rejected write is logged and recorded in the event log, the surface
//! keeps its state, and the next snapshot settles what the store actually
//! holds. Nothing here mutates the surface.
//!
//! Coercion rules per input kind:
//! - empty raw value → the bound entry is removed, whatever the kind
//! - number inputs → numeric write; an unparseable raw value is reported
//!   as a write failure and skipped
//! - checkboxes → `1` / `0`
//! - everything else → the raw string

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Number, Value};
use tracing::{debug, warn};

use crate::error::BindError;
use crate::event_log::{EventKind, EventLog};
use crate::path::Path;
use crate::store::StoreClient;
use crate::surface::{InputKind, NodeId};

use crate::assets::RawAsset;

/// A user interaction, as the embedder reports it to the engine
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Text-like input committed a new raw value
    Edited { node: NodeId, raw: String },
    /// Checkbox toggled
    Toggled { node: NodeId, checked: bool },
    /// File input received a file
    FileChosen { node: NodeId, file: RawAsset },
    /// Action trigger clicked
    Clicked { node: NodeId },
}

/// Gate consulted before destructive actions
pub trait ConfirmGate: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Fixed-answer gate for embedders without a prompt, and for tests
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm {
    answer: bool,
}

impl AutoConfirm {
    pub fn accept() -> Self {
        Self { answer: true }
    }

    pub fn decline() -> Self {
        Self { answer: false }
    }
}

impl ConfirmGate for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        self.answer
    }
}

/// The write direction of the binding
#[derive(Clone)]
pub struct TwoWaySync {
    /// Binding root store path; incoming paths are relative to it
    root: Path,
    store: Arc<dyn StoreClient>,
    confirm: Arc<dyn ConfirmGate>,
    events: EventLog,
}

impl TwoWaySync {
    pub fn new(
        root: Path,
        store: Arc<dyn StoreClient>,
        confirm: Arc<dyn ConfirmGate>,
        events: EventLog,
    ) -> Self {
        Self {
            root,
            store,
            confirm,
            events,
        }
    }

    fn data_path(&self, path: &Path) -> Path {
        self.root.join(path).prefixed("data")
    }

    fn asset_path(&self, path: &Path) -> Path {
        self.root.join(path).prefixed("asset")
    }

    /// Commit an edited raw value at the node's resolved path
    pub async fn write_scalar(&self, path: &Path, kind: InputKind, raw: &str) {
        if raw.is_empty() {
            self.remove_value(path).await;
            return;
        }

        let value = match kind {
            InputKind::Number => match raw.parse::<f64>().ok().and_then(Number::from_f64) {
                Some(n) => Value::Number(n),
                None => {
                    let err = BindError::Coercion { raw: raw.into() };
                    warn!(path = %path, error = %err, "input value skipped");
                    self.events.emit(EventKind::WriteFailed {
                        path: self.data_path(path).to_string(),
                        error: err.to_string(),
                    });
                    return;
                }
            },
            _ => Value::String(raw.into()),
        };

        self.write_value(path, value).await;
    }

    /// Commit a checkbox toggle as `1` / `0`
    pub async fn toggle(&self, path: &Path, checked: bool) {
        let value = if checked { json!(1) } else { json!(0) };
        self.write_value(path, value).await;
    }

    /// Append a fresh entry under the collection at `path`
    ///
    /// The generated key is ordering-friendly, so enumeration order follows
    /// insertion order; the entry body carries the creation stamp.
    pub async fn add_entry(&self, path: &Path) {
        let target = self.data_path(path);
        let body = json!({ "added": now_ms() });
        match self.store.push(&target, body).await {
            Ok(key) => {
                debug!(path = %target, key, "entry pushed");
                self.events.emit(EventKind::PushIssued {
                    path: target.to_string(),
                    key,
                });
            }
            Err(err) => self.report_failure(&target, err),
        }
    }

    /// Remove the entry at `path`, behind the confirm gate
    ///
    /// The parallel asset subtree is removed best-effort afterwards; its
    /// failure neither blocks nor rolls back the data removal.
    pub async fn remove_entry(&self, path: &Path) {
        let target = self.data_path(path);
        if !self.confirm.confirm(&format!("Delete '{target}'?")) {
            debug!(path = %target, "removal declined");
            self.events.emit(EventKind::ConfirmDeclined {
                path: target.to_string(),
            });
            return;
        }

        match self.store.remove(&target).await {
            Ok(()) => {
                self.events.emit(EventKind::RemoveIssued {
                    path: target.to_string(),
                });
            }
            Err(err) => {
                self.report_failure(&target, err);
                return;
            }
        }

        let asset_target = self.asset_path(path);
        if let Err(err) = self.store.remove(&asset_target).await {
            debug!(path = %asset_target, error = %err, "asset cleanup failed");
        }
    }

    async fn write_value(&self, path: &Path, value: Value) {
        let target = self.data_path(path);
        match self.store.write(&target, value).await {
            Ok(()) => {
                self.events.emit(EventKind::WriteIssued {
                    path: target.to_string(),
                });
            }
            Err(err) => self.report_failure(&target, err),
        }
    }

    async fn remove_value(&self, path: &Path) {
        let target = self.data_path(path);
        match self.store.remove(&target).await {
            Ok(()) => {
                self.events.emit(EventKind::RemoveIssued {
                    path: target.to_string(),
                });
            }
            Err(err) => self.report_failure(&target, err),
        }
    }

    fn report_failure(&self, target: &Path, err: BindError) {
        warn!(path = %target, error = %err, "store rejected the operation");
        self.events.emit(EventKind::WriteFailed {
            path: target.to_string(),
            error: err.to_string(),
        });
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
