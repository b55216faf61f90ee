//! pathbind - path-addressed data binding between a surface and a store

pub mod assets;
pub mod cache;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod expand;
pub mod fingerprint;
pub mod path;
pub mod reconcile;
pub mod resolver;
pub mod store;
pub mod surface;
pub mod sync;
pub mod telemetry;

pub use assets::{
    AssetPipeline, AssetTransform, IdentityTransform, PendingFetch, RawAsset, UploadProgress,
    UploadReport,
};
pub use cache::{MemoryCache, SnapshotCache};
pub use engine::Engine;
pub use error::{BindError, FixSuggestion};
pub use event_log::{Event, EventKind, EventLog};
pub use expand::CollectionExpander;
pub use fingerprint::{Fingerprint, Role};
pub use path::Path;
pub use reconcile::{PassReport, Reconciler};
pub use resolver::PathResolver;
pub use store::{MemoryStore, StoreClient};
pub use surface::{
    ActionKind, InputKind, MemorySurface, NodeId, RootDeclaration, Selector, Surface,
};
pub use sync::{AutoConfirm, ConfirmGate, InputEvent, TwoWaySync};
