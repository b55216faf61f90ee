//! Binary asset pipeline (v0.1)
//!
//! Assets live in a store tree parallel to the bound data: metadata at
//! `data/<path>`, derived thumbnail at `asset/<path>/thumb`, raw payload at
//! `asset/<path>/raw`. The metadata write is what the reconciler fingerprints
//! (`lastModified`), so a display never updates before its thumbnail exists.
//!
//! Display goes through the durable cache first; a miss queues a deferred
//! fetch that is dropped silently when the target node is destroyed before
//! completion (collection children regenerate mid-flight all the time).

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::{thumb_key, SnapshotCache};
use crate::error::BindError;
use crate::event_log::{EventKind, EventLog};
use crate::path::Path;
use crate::store::StoreClient;
use crate::surface::{NodeId, Surface};

/// A user-chosen file, payload carried as an opaque encoded string
#[derive(Debug, Clone)]
pub struct RawAsset {
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub last_modified: u64,
    pub payload: String,
}

impl RawAsset {
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    /// The metadata record written to the data tree
    pub fn metadata(&self) -> Value {
        json!({
            "lastModified": self.last_modified,
            "name": self.name,
            "size": self.size,
            "type": self.media_type,
        })
    }
}

/// Derives a displayable payload (thumbnail) from a raw image asset
pub trait AssetTransform: Send + Sync {
    fn transform(&self, raw: &RawAsset) -> Result<String, BindError>;
}

/// Pass-through transform; the raw payload doubles as its own thumbnail
#[derive(Debug, Default)]
pub struct IdentityTransform;

impl AssetTransform for IdentityTransform {
    fn transform(&self, raw: &RawAsset) -> Result<String, BindError> {
        Ok(raw.payload.clone())
    }
}

/// How far an upload chain advanced before stopping
///
/// The chain is strictly gated, so partial progress is always consistent:
/// stored metadata implies a stored thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadProgress {
    /// Nothing durable happened
    None,
    /// Image chain: thumbnail stored, metadata write failed
    Thumbnail,
    /// Non-image chain: raw stored, metadata write failed
    Raw,
    /// Image chain: thumbnail and metadata stored, raw write failed
    Metadata,
    Complete,
}

/// Outcome of one upload attempt
#[derive(Debug)]
pub struct UploadReport {
    pub progress: UploadProgress,
    pub error: Option<BindError>,
}

impl UploadReport {
    fn complete() -> Self {
        Self {
            progress: UploadProgress::Complete,
            error: None,
        }
    }

    fn stopped(progress: UploadProgress, error: BindError) -> Self {
        Self {
            progress,
            error: Some(error),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress == UploadProgress::Complete
    }
}

/// A queued thumbnail fetch, completed on a later engine turn
#[derive(Debug, Clone)]
pub struct PendingFetch {
    pub node: NodeId,
    pub path: Path,
    pub cache_key: String,
}

/// Upload and display routines over the parallel asset tree
#[derive(Clone)]
pub struct AssetPipeline {
    store: Arc<dyn StoreClient>,
    cache: Arc<dyn SnapshotCache>,
    transform: Arc<dyn AssetTransform>,
    events: EventLog,
}

impl AssetPipeline {
    pub fn new(
        store: Arc<dyn StoreClient>,
        cache: Arc<dyn SnapshotCache>,
        transform: Arc<dyn AssetTransform>,
        events: EventLog,
    ) -> Self {
        Self {
            store,
            cache,
            transform,
            events,
        }
    }

    /// Run the gated upload chain for `raw` at the resolved `path`
    ///
    /// Image assets: thumbnail, then metadata, then raw payload. Non-image
    /// assets skip the transform: raw payload, then metadata. A failed write
    /// stops the chain; everything already stored stays stored.
    pub async fn upload(&self, path: &Path, raw: &RawAsset) -> UploadReport {
        if raw.is_image() {
            self.upload_image(path, raw).await
        } else {
            self.upload_other(path, raw).await
        }
    }

    async fn upload_image(&self, path: &Path, raw: &RawAsset) -> UploadReport {
        let thumb = match self.transform.transform(raw) {
            Ok(thumb) => thumb,
            Err(err) => {
                warn!(path = %path, error = %err, "asset transform failed");
                return UploadReport::stopped(UploadProgress::None, err);
            }
        };

        let thumb_path = path.prefixed("asset").child("thumb");
        if let Err(err) = self.store.write(&thumb_path, Value::String(thumb)).await {
            return self.stop_chain(path, UploadProgress::None, err);
        }
        self.advanced(path, "thumbnail");

        let data_path = path.prefixed("data");
        if let Err(err) = self.store.write(&data_path, raw.metadata()).await {
            return self.stop_chain(path, UploadProgress::Thumbnail, err);
        }
        self.advanced(path, "metadata");

        let raw_path = path.prefixed("asset").child("raw");
        if let Err(err) = self
            .store
            .write(&raw_path, Value::String(raw.payload.clone()))
            .await
        {
            return self.stop_chain(path, UploadProgress::Metadata, err);
        }
        self.advanced(path, "raw");

        UploadReport::complete()
    }

    async fn upload_other(&self, path: &Path, raw: &RawAsset) -> UploadReport {
        let raw_path = path.prefixed("asset").child("raw");
        if let Err(err) = self
            .store
            .write(&raw_path, Value::String(raw.payload.clone()))
            .await
        {
            return self.stop_chain(path, UploadProgress::None, err);
        }
        self.advanced(path, "raw");

        let data_path = path.prefixed("data");
        if let Err(err) = self.store.write(&data_path, raw.metadata()).await {
            return self.stop_chain(path, UploadProgress::Raw, err);
        }
        self.advanced(path, "metadata");

        UploadReport::complete()
    }

    fn advanced(&self, path: &Path, stage: &str) {
        self.events.emit(EventKind::UploadAdvanced {
            path: path.to_string(),
            stage: stage.to_string(),
        });
    }

    fn stop_chain(&self, path: &Path, progress: UploadProgress, err: BindError) -> UploadReport {
        warn!(path = %path, error = %err, "upload chain stopped");
        self.events.emit(EventKind::WriteFailed {
            path: path.to_string(),
            error: err.to_string(),
        });
        UploadReport::stopped(progress, err)
    }

    /// Bring an asset display node up to date with its metadata value
    ///
    /// Absent metadata hides the node. A cached thumbnail is applied
    /// immediately; otherwise the returned fetch must be queued and later
    /// passed to [`complete_fetch`](Self::complete_fetch).
    pub fn display(
        &self,
        surface: &dyn Surface,
        node: NodeId,
        path: &Path,
        meta: Option<&Value>,
    ) -> Option<PendingFetch> {
        let stamp = meta.and_then(|m| m.get("lastModified"));
        if meta.is_none() || meta == Some(&Value::Null) {
            surface.set_visible(node, false);
            return None;
        }
        surface.set_visible(node, true);

        let cache_key = thumb_key(stamp, path);
        if let Some(cached) = self.cache.get_item(&cache_key) {
            surface.set_image_source(node, &cached);
            self.events.emit(EventKind::AssetApplied {
                path: path.to_string(),
            });
            return None;
        }

        self.events.emit(EventKind::AssetFetchQueued {
            path: path.to_string(),
        });
        Some(PendingFetch {
            node,
            path: path.clone(),
            cache_key,
        })
    }

    /// Fetch the raw payload at `path` and hand it to the embedder's viewer
    ///
    /// Triggered by a click on an asset display node. A missing or rejected
    /// payload is logged and recorded; nothing opens.
    pub async fn open_raw(&self, surface: &dyn Surface, path: &Path) {
        let raw_path = path.prefixed("asset").child("raw");
        match self.store.read_once(&raw_path).await {
            Ok(Some(Value::String(payload))) => {
                surface.open_asset(&payload);
                self.events.emit(EventKind::AssetOpened {
                    path: path.to_string(),
                });
            }
            Ok(other) => {
                let err = BindError::fetch(
                    path.to_string(),
                    format!("no raw payload at '{raw_path}' (got {other:?})"),
                );
                warn!(error = %err, "raw asset fetch failed");
                self.events.emit(EventKind::AssetFetchFailed {
                    path: path.to_string(),
                    error: err.to_string(),
                });
            }
            Err(err) => {
                warn!(path = %path, error = %err, "raw asset fetch failed");
                self.events.emit(EventKind::AssetFetchFailed {
                    path: path.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }

    /// Complete a deferred thumbnail fetch
    ///
    /// Dropped without effect when the target node was destroyed while the
    /// fetch was in flight. Fetched payloads are written back to the cache.
    pub async fn complete_fetch(&self, surface: &dyn Surface, fetch: PendingFetch) {
        if !surface.exists(fetch.node) {
            debug!(path = %fetch.path, "deferred fetch targets a destroyed node, dropping");
            self.events.emit(EventKind::StaleFetchDropped {
                path: fetch.path.to_string(),
            });
            return;
        }

        let thumb_path = fetch.path.prefixed("asset").child("thumb");
        let payload = match self.store.read_once(&thumb_path).await {
            Ok(Some(Value::String(payload))) => payload,
            Ok(other) => {
                let err = BindError::fetch(
                    fetch.path.to_string(),
                    format!("no thumbnail payload at '{thumb_path}' (got {other:?})"),
                );
                warn!(error = %err, "asset fetch failed");
                self.events.emit(EventKind::AssetFetchFailed {
                    path: fetch.path.to_string(),
                    error: err.to_string(),
                });
                return;
            }
            Err(err) => {
                warn!(path = %fetch.path, error = %err, "asset fetch failed");
                self.events.emit(EventKind::AssetFetchFailed {
                    path: fetch.path.to_string(),
                    error: err.to_string(),
                });
                return;
            }
        };

        surface.set_image_source(fetch.node, &payload);
        self.cache.set_item(&fetch.cache_key, &payload);
        self.events.emit(EventKind::AssetApplied {
            path: fetch.path.to_string(),
        });
    }
}
