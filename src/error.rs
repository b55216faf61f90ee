//! Error types with fix suggestions (v0.1)

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
///
/// Fatal variants (BIND-001, BIND-002) abort startup. Everything else is
/// reported through the event log and tracing; the UI keeps its pre-failure
/// state until the next snapshot confirms or refutes the change.
#[derive(Error, Debug)]
pub enum BindError {
    // ─────────────────────────────────────────────────────────────
    // Fatal configuration errors (BIND-001 to BIND-002)
    // ─────────────────────────────────────────────────────────────
    #[error("BIND-001: Binding root declares no path: {detail}")]
    Configuration { detail: String },

    #[error("BIND-002: Authentication handshake failed: {detail}")]
    Authentication { detail: String },

    // ─────────────────────────────────────────────────────────────
    // Store I/O errors (BIND-010 to BIND-012)
    // ─────────────────────────────────────────────────────────────
    #[error("BIND-010: Store rejected write at '{path}': {detail}")]
    Write { path: String, detail: String },

    #[error("BIND-011: Asset fetch failed at '{path}': {detail}")]
    Fetch { path: String, detail: String },

    #[error("BIND-012: Deferred completion targets a destroyed node (path '{path}')")]
    StaleNode { path: String },

    // ─────────────────────────────────────────────────────────────
    // Input and asset errors (BIND-020 to BIND-031)
    // ─────────────────────────────────────────────────────────────
    #[error("BIND-020: Cannot coerce input value '{raw}' to a number")]
    Coercion { raw: String },

    #[error("BIND-030: Asset transform failed: {detail}")]
    Transform { detail: String },

    #[error("BIND-031: Markup parse error at byte {position}: {detail}")]
    Markup { position: usize, detail: String },
}

impl BindError {
    /// Check if this error must abort engine startup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BindError::Configuration { .. } | BindError::Authentication { .. }
        )
    }

    pub fn configuration(detail: impl Into<String>) -> Self {
        BindError::Configuration {
            detail: detail.into(),
        }
    }

    pub fn write(path: impl Into<String>, detail: impl Into<String>) -> Self {
        BindError::Write {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn fetch(path: impl Into<String>, detail: impl Into<String>) -> Self {
        BindError::Fetch {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

impl FixSuggestion for BindError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            BindError::Configuration { .. } => {
                Some("Declare path=\"...\" on the binding root element")
            }
            BindError::Authentication { .. } => {
                Some("Check the credential token, or remove it entirely for anonymous access")
            }
            BindError::Write { .. } => {
                Some("Verify store permissions for the target path; the UI state is unchanged")
            }
            BindError::Fetch { .. } => {
                Some("The bound element keeps its last-known content; no retry is scheduled")
            }
            BindError::StaleNode { .. } => {
                Some("Harmless: the owning collection regenerated its children mid-fetch")
            }
            BindError::Coercion { .. } => Some("Numeric inputs must hold a parseable number"),
            BindError::Transform { .. } => {
                Some("Check the raw asset payload; non-image assets skip the transform")
            }
            BindError::Markup { .. } => {
                Some("Surface markup must be well-formed: quoted attributes, balanced tags")
            }
        }
    }
}
