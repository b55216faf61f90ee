//! Rendering surface abstraction (v0.1)
//!
//! The engine never touches a concrete UI toolkit. It consumes a surface
//! through role-based node selection, declared-attribute access, display
//! mutation and markup capture/replacement.
//!
//! Key types:
//! - `Surface`: the trait the embedder implements over its real UI
//! - `MemorySurface`: in-crate reference implementation over a minimal
//!   markup grammar, used by tests and demos
//! - `NodeId`: stable handle for a live node; regenerated collection
//!   children always receive fresh handles

mod memory;

pub use memory::MemorySurface;

/// Stable handle for a surface node
///
/// Handles are never reused within one surface instance, so a destroyed
/// node's id fails the `exists` check forever after.
pub type NodeId = u64;

/// Role-specific selection queries, in the order the reconciler runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Nodes declaring `type="collection"` and a path
    Collection,
    /// Image-like nodes declaring a path
    AssetDisplay,
    /// Inputs and text areas declaring a path
    ScalarBound,
    /// Nodes declaring a `show` path
    Conditional,
}

/// Kind of an input-like node, driving coercion and apply rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Email,
    Number,
    Checkbox,
    /// Never written programmatically during reconciliation
    File,
    TextArea,
}

/// Declared click action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Add,
    Remove,
}

/// What the binding root declares before the engine detaches it
#[derive(Debug, Clone, Default)]
pub struct RootDeclaration {
    /// Root store path; absence is a fatal configuration error
    pub path: Option<String>,
    /// Optional credential token for the authentication handshake
    pub credential: Option<String>,
}

/// The rendering surface as the engine sees it
///
/// All methods take `&self`; implementations are expected to use interior
/// mutability so one handle can be shared between the engine and the
/// embedder (the same shape as the store types in this crate).
pub trait Surface: Send + Sync {
    /// Read the binding root's declaration (path + optional credential)
    fn root_declaration(&self) -> RootDeclaration;

    /// Remove the root declaration attributes so they never participate
    /// in fragment resolution
    fn detach_root_declaration(&self);

    /// All nodes matching `selector`, in document order
    fn select(&self, selector: Selector) -> Vec<NodeId>;

    /// Whether the node is still attached to the surface
    fn exists(&self, id: NodeId) -> bool;

    fn parent(&self, id: NodeId) -> Option<NodeId>;

    /// The node's declared path fragment, if any
    fn path_fragment(&self, id: NodeId) -> Option<String>;

    /// The node's declared show fragment, if any
    fn show_fragment(&self, id: NodeId) -> Option<String>;

    fn action(&self, id: NodeId) -> Option<ActionKind>;

    fn input_kind(&self, id: NodeId) -> Option<InputKind>;

    /// Currently displayed content of an input-like node
    fn value(&self, id: NodeId) -> Option<String>;

    fn set_value(&self, id: NodeId, value: &str);

    fn checked(&self, id: NodeId) -> bool;

    fn set_checked(&self, id: NodeId, checked: bool);

    fn set_visible(&self, id: NodeId, visible: bool);

    fn set_image_source(&self, id: NodeId, source: &str);

    /// Hand a raw asset payload to the embedder's viewer
    ///
    /// Triggered by a click on an asset display node; what "opening" means
    /// (a new window, an external viewer) is the embedder's business.
    fn open_asset(&self, payload: &str);

    /// The node's child markup (template capture source)
    fn inner_markup(&self, id: NodeId) -> Option<String>;

    /// Replace the node's children with freshly materialized markup
    ///
    /// Existing descendants are destroyed; their handles become stale.
    fn set_inner_markup(&self, id: NodeId, markup: &str);

    /// Handles of every element below `id`, in document order
    fn descendants(&self, id: NodeId) -> Vec<NodeId>;
}
