//! Local durable cache (v0.1)
//!
//! Key/value byte cache for snapshot seeding and thumbnail reuse.
//! Namespaces:
//! - `data:<root>`: the last full snapshot, serialized
//! - `thumb:<lastModified>:<path>`: cached thumbnail payloads

use dashmap::DashMap;
use serde_json::Value;

use crate::path::Path;

/// The durable cache as the engine sees it (localStorage-shaped)
pub trait SnapshotCache: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
}

/// Cache key for the persisted snapshot of a binding root
pub fn data_key(root: &str) -> String {
    format!("data:{root}")
}

/// Cache key for a thumbnail payload
///
/// The modification stamp is part of the key, so a re-uploaded asset never
/// serves a stale thumbnail.
pub fn thumb_key(last_modified: Option<&Value>, path: &Path) -> String {
    match last_modified {
        Some(stamp) => format!("thumb:{stamp}:{path}"),
        None => format!("thumb:null:{path}"),
    }
}

/// In-memory cache; clones share the same map
#[derive(Clone, Default)]
pub struct MemoryCache {
    items: std::sync::Arc<DashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl SnapshotCache for MemoryCache {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).map(|entry| entry.value().clone())
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items.insert(key.to_string(), value.to_string());
    }
}
