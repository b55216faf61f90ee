//! In-memory reference store (v0.1)
//!
//! Holds one hierarchical value behind a lock and fans snapshots out to
//! subscribers synchronously on every mutation, which keeps tests fully
//! deterministic. Push keys are lexicographically ordered so enumeration
//! order matches insertion order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::BindError;
use crate::path::Path;
use crate::store::StoreClient;

struct Subscriber {
    path: Path,
    sender: UnboundedSender<Value>,
}

struct Inner {
    value: Value,
    subscribers: Vec<Subscriber>,
    /// When set, every authenticate call fails (test hook)
    reject_auth: bool,
    /// When set, every write/remove/push fails (test hook)
    reject_writes: bool,
}

/// In-memory store; clones share the same value tree
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    push_counter: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_value(Value::Object(Map::new()))
    }

    /// Start from a seeded value tree
    pub fn with_value(value: Value) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                value,
                subscribers: Vec::new(),
                reject_auth: false,
                reject_writes: false,
            })),
            push_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Make every authenticate call fail
    pub fn reject_auth(self) -> Self {
        self.inner.write().reject_auth = true;
        self
    }

    /// Make every mutation fail
    pub fn reject_writes(&self, reject: bool) {
        self.inner.write().reject_writes = reject;
    }

    /// Snapshot of the whole value tree
    pub fn value(&self) -> Value {
        self.inner.read().value.clone()
    }

    /// Read without going through the async trait (test convenience)
    pub fn value_at(&self, path: &Path) -> Option<Value> {
        path.get(&self.inner.read().value).cloned()
    }

    fn notify(inner: &mut Inner) {
        inner.subscribers.retain(|sub| {
            let snapshot = sub.path.get(&inner.value).cloned().unwrap_or(Value::Null);
            sub.sender.send(snapshot).is_ok()
        });
    }

    fn check_writable(inner: &Inner, path: &Path) -> Result<(), BindError> {
        if inner.reject_writes {
            Err(BindError::write(path.to_string(), "store rejects writes"))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn authenticate(&self, token: &str) -> Result<(), BindError> {
        if self.inner.read().reject_auth {
            return Err(BindError::Authentication {
                detail: format!("token '{token}' rejected"),
            });
        }
        Ok(())
    }

    async fn subscribe(&self, path: &Path) -> Result<UnboundedReceiver<Value>, BindError> {
        let (sender, receiver) = unbounded_channel();
        let mut inner = self.inner.write();
        // Subscriptions fire immediately with the current value.
        let snapshot = path.get(&inner.value).cloned().unwrap_or(Value::Null);
        let _ = sender.send(snapshot);
        inner.subscribers.push(Subscriber {
            path: path.clone(),
            sender,
        });
        Ok(receiver)
    }

    fn unsubscribe(&self, path: &Path) {
        self.inner.write().subscribers.retain(|sub| sub.path != *path);
    }

    async fn write(&self, path: &Path, value: Value) -> Result<(), BindError> {
        let mut inner = self.inner.write();
        Self::check_writable(&inner, path)?;
        path.set(&mut inner.value, value);
        Self::notify(&mut inner);
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<(), BindError> {
        let mut inner = self.inner.write();
        Self::check_writable(&inner, path)?;
        path.remove(&mut inner.value);
        Self::notify(&mut inner);
        Ok(())
    }

    async fn push(&self, path: &Path, value: Value) -> Result<String, BindError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let n = self.push_counter.fetch_add(1, Ordering::SeqCst);
        // Zero-padded hex keeps keys lexicographically ordered by time.
        let key = format!("k{millis:013x}{n:05x}");

        let mut inner = self.inner.write();
        Self::check_writable(&inner, path)?;
        path.child(key.clone()).set(&mut inner.value, value);
        Self::notify(&mut inner);
        Ok(key)
    }

    async fn read_once(&self, path: &Path) -> Result<Option<Value>, BindError> {
        Ok(path.get(&self.inner.read().value).cloned())
    }
}
