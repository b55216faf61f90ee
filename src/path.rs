//! Store path algebra (v0.1)
//!
//! Paths address locations in the hierarchical store value. A path is an
//! absolute, rooted sequence of non-empty string segments, displayed as
//! `/a/b` (the root alone is `/`).
//!
//! Declared fragments resolve left-to-right over the joined ancestor chain:
//! - `""` resets everything collected so far (this is also how absolute
//!   fragments work: a leading `/` yields an empty segment)
//! - `".."` pops one segment, saturating at root
//! - `"."` is skipped
//! - anything else is appended
//!
//! Resolution is idempotent: re-resolving an already-absolute path is a
//! no-op.

use serde_json::{Map, Value};
use std::fmt;

/// An absolute path into the store value
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<String>);

impl Path {
    /// The bare root path `/`
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Resolve an ordered fragment chain (binding root first) into an
    /// absolute path
    pub fn resolve(fragments: &[impl AsRef<str>]) -> Self {
        let joined = fragments
            .iter()
            .map(|f| f.as_ref())
            .collect::<Vec<_>>()
            .join("/");

        let mut segments: Vec<String> = Vec::new();
        for part in joined.split('/') {
            match part {
                "" => segments.clear(),
                ".." => {
                    segments.pop();
                }
                "." => {}
                other => segments.push(other.to_string()),
            }
        }
        Self(segments)
    }

    /// Parse a single absolute or relative path string
    pub fn parse(path: &str) -> Self {
        Self::resolve(&[path])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append one segment, returning a new path
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Prepend one segment, returning a new path
    ///
    /// Used to address the parallel store trees (`data/<path>`,
    /// `asset/<path>`).
    pub fn prefixed(&self, segment: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.push(segment.into());
        segments.extend(self.0.iter().cloned());
        Self(segments)
    }

    /// Concatenate another path under this one, returning a new path
    ///
    /// Used to compose the binding root with a node's root-relative
    /// resolved path into a full store address.
    pub fn join(&self, other: &Path) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Read the value at this path
    ///
    /// Missing keys yield `None`, never an error. Numeric segments index
    /// into arrays as a tolerance, mirroring the store's key-addressed
    /// lookup; the data model itself carries no arrays.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.0 {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` at this path, creating intermediate objects
    ///
    /// An intermediate value that is not an object is overwritten with one.
    /// Setting at the root path replaces the whole value.
    pub fn set(&self, root: &mut Value, value: Value) {
        if self.0.is_empty() {
            *root = value;
            return;
        }

        let mut current = root;
        for segment in &self.0[..self.0.len() - 1] {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            current = current
                .as_object_mut()
                .expect("just ensured object")
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let last = self.0.last().expect("non-empty path");
        current
            .as_object_mut()
            .expect("just ensured object")
            .insert(last.clone(), value);
    }

    /// Delete the key at this path, if present
    ///
    /// Deleting at the root clears the whole value to an empty object.
    pub fn remove(&self, root: &mut Value) {
        if self.0.is_empty() {
            *root = Value::Object(Map::new());
            return;
        }

        let Some(parent) = self.parent() else { return };
        let last = self.0.last().expect("non-empty path");
        if let Some(target) = Self::get_mut(&parent, root) {
            if let Value::Object(map) = target {
                map.remove(last);
            }
        }
    }

    fn get_mut<'a>(path: &Path, root: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = root;
        for segment in &path.0 {
            current = match current {
                Value::Object(map) => map.get_mut(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_plain_chain() {
        let path = Path::resolve(&["/a", "b", "..", "c"]);
        assert_eq!(path.to_string(), "/a/c");
    }

    #[test]
    fn resolve_empty_fragment_resets() {
        let path = Path::resolve(&["/a/b", "", "c"]);
        assert_eq!(path.to_string(), "/c");
    }

    #[test]
    fn resolve_absolute_fragment_resets() {
        // An absolute fragment mid-chain discards everything before it.
        let path = Path::resolve(&["x", "y", "/a", "b"]);
        assert_eq!(path.to_string(), "/a/b");
    }

    #[test]
    fn resolve_dot_is_skipped() {
        let path = Path::resolve(&["a", ".", "b", "."]);
        assert_eq!(path.to_string(), "/a/b");
    }

    #[test]
    fn resolve_dotdot_saturates_at_root() {
        let path = Path::resolve(&["..", "..", "a"]);
        assert_eq!(path.to_string(), "/a");

        let path = Path::resolve(&["a", "..", ".."]);
        assert_eq!(path.to_string(), "/");
    }

    #[test]
    fn resolve_is_idempotent() {
        let cases = [
            vec!["/a", "b", "..", "c"],
            vec!["", "x"],
            vec!["a", ".", ".."],
            vec![],
        ];
        for fragments in cases {
            let once = Path::resolve(&fragments);
            let twice = Path::parse(&once.to_string());
            assert_eq!(once, twice, "not idempotent for {fragments:?}");
        }
    }

    #[test]
    fn no_fragments_resolve_to_root() {
        let empty: [&str; 0] = [];
        let path = Path::resolve(&empty);
        assert!(path.is_root());
        assert_eq!(path.to_string(), "/");
    }

    #[test]
    fn get_tolerates_missing_keys() {
        let value = json!({"a": {"name": "x"}});
        assert_eq!(Path::parse("/a/name").get(&value), Some(&json!("x")));
        assert_eq!(Path::parse("/a/missing").get(&value), None);
        assert_eq!(Path::parse("/b/deep/er").get(&value), None);
        assert_eq!(Path::parse("/a/name/below").get(&value), None);
    }

    #[test]
    fn get_at_root_returns_whole_value() {
        let value = json!({"a": 1});
        assert_eq!(Path::root().get(&value), Some(&value));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut value = json!({});
        Path::parse("/a/b/c").set(&mut value, json!(1));
        assert_eq!(value, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn set_overwrites_non_object_intermediates() {
        let mut value = json!({"a": "scalar"});
        Path::parse("/a/b").set(&mut value, json!(2));
        assert_eq!(value, json!({"a": {"b": 2}}));
    }

    #[test]
    fn set_empty_map_invalidates_subtree() {
        // The expander overwrites previous-snapshot subtrees this way.
        let mut value = json!({"items": {"k1": {"name": "x"}}});
        Path::parse("/items").set(&mut value, json!({}));
        assert_eq!(value, json!({"items": {}}));
    }

    #[test]
    fn remove_deletes_key() {
        let mut value = json!({"a": {"name": "x", "keep": 1}});
        Path::parse("/a/name").remove(&mut value);
        assert_eq!(value, json!({"a": {"keep": 1}}));
    }

    #[test]
    fn remove_missing_key_is_noop() {
        let mut value = json!({"a": 1});
        Path::parse("/b/c").remove(&mut value);
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn join_concatenates() {
        let root = Path::parse("/form");
        let rel = Path::parse("/a/name");
        assert_eq!(root.join(&rel).to_string(), "/form/a/name");
        assert_eq!(root.join(&Path::root()), root);
        assert_eq!(Path::root().join(&rel), rel);
    }

    #[test]
    fn prefixed_addresses_parallel_trees() {
        let path = Path::parse("/gallery/photo");
        assert_eq!(path.prefixed("data").to_string(), "/data/gallery/photo");
        assert_eq!(path.prefixed("asset").to_string(), "/asset/gallery/photo");
    }
}
