//! Remote store abstraction (v0.1)
//!
//! The engine consumes the remote hierarchical store through this seam:
//! a value-change subscription plus path-keyed write primitives. Writes are
//! fire-and-forget from the engine's perspective; their effects are only
//! observed through the next subscription snapshot.
//!
//! Key types:
//! - `StoreClient`: the async trait the embedder implements
//! - `MemoryStore`: in-crate reference implementation with synchronous
//!   snapshot fan-out, used by tests and demos

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::BindError;
use crate::path::Path;

/// The remote store as the engine sees it
///
/// All paths are absolute within the store root the client was built for.
/// Implementations must be cheap to share (`Arc<dyn StoreClient>`).
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Perform the credential handshake; failure is fatal to startup
    async fn authenticate(&self, token: &str) -> Result<(), BindError>;

    /// Subscribe to value changes at `path`
    ///
    /// The receiver yields the current value immediately, then again after
    /// every store mutation. A missing subtree is delivered as `Null`.
    async fn subscribe(&self, path: &Path) -> Result<UnboundedReceiver<Value>, BindError>;

    /// Detach every subscription registered at `path`
    fn unsubscribe(&self, path: &Path);

    /// Overwrite the value at `path`
    async fn write(&self, path: &Path, value: Value) -> Result<(), BindError>;

    /// Delete the subtree at `path`
    async fn remove(&self, path: &Path) -> Result<(), BindError>;

    /// Append a child under `path` with a generated, ordering-friendly key
    async fn push(&self, path: &Path, value: Value) -> Result<String, BindError>;

    /// Single-shot read at `path`; `None` when absent
    async fn read_once(&self, path: &Path) -> Result<Option<Value>, BindError>;
}
