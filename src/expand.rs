//! Collection expansion (v0.1)
//!
//! Materializes a variable-length list of bound subtrees from a captured
//! template and the live key set of a collection value.
//!
//! Placeholder grammar (purely textual, applied to opaque markup):
//! - `path="."`  / `show="."`  → the attribute becomes the child key
//! - `path="x"` / `show="x"`  → the attribute becomes `key/x`
//!
//! Attributes other than `path` and `show` are never touched.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::path::Path;
use crate::resolver::PathResolver;
use crate::surface::{NodeId, Surface};

/// Pattern for path/show attribute declarations in template markup
///
/// The leading boundary keeps attributes that merely end in `path`/`show`
/// (`data-path="…"`) out of the rewrite.
static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([<\s])(path|show)="([^"]*)""#).expect("static pattern"));

/// Rewrite every declared-path placeholder in `template` under `key`
pub fn rewrite_placeholders(template: &str, key: &str) -> String {
    PLACEHOLDER_PATTERN
        .replace_all(template, |caps: &Captures<'_>| {
            let pre = &caps[1];
            let attr = &caps[2];
            let fragment = &caps[3];
            if fragment == "." {
                format!(r#"{pre}{attr}="{key}""#)
            } else {
                format!(r#"{pre}{attr}="{key}/{fragment}""#)
            }
        })
        .into_owned()
}

/// Regenerates collection children from captured templates
///
/// Templates are captured at most once per node instance (the only node
/// state the capture mutates) and live in a side table keyed by handle.
#[derive(Debug, Default)]
pub struct CollectionExpander {
    templates: HashMap<NodeId, String>,
}

impl CollectionExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regenerate the children of `node` from the current key set
    ///
    /// Also overwrites the `previous` snapshot's subtree at `path` with an
    /// empty mapping, so every regenerated descendant binding reads as
    /// changed even when the new subtree holds stale-looking values.
    /// Returns the number of materialized children.
    pub fn expand(
        &mut self,
        surface: &dyn Surface,
        resolver: &mut PathResolver,
        node: NodeId,
        path: &Path,
        value: Option<&Value>,
        previous: &mut Option<Value>,
    ) -> usize {
        if let Some(prev) = previous.as_mut() {
            path.set(prev, Value::Object(Map::new()));
        }

        let template = self
            .templates
            .entry(node)
            .or_insert_with(|| surface.inner_markup(node).unwrap_or_default())
            .clone();

        // The regenerated children get fresh handles; drop every side-table
        // entry of the subtree being destroyed.
        let doomed = surface.descendants(node);
        resolver.forget(&doomed);
        self.forget(&doomed);

        let keys: Vec<&String> = match value {
            Some(Value::Object(map)) => map.keys().collect(),
            _ => Vec::new(),
        };

        let rendered: String = keys
            .iter()
            .map(|key| rewrite_placeholders(&template, key))
            .collect();
        surface.set_inner_markup(node, &rendered);

        keys.len()
    }

    /// Drop captured templates for destroyed nodes
    pub fn forget(&mut self, nodes: &[NodeId]) {
        for node in nodes {
            self.templates.remove(node);
        }
    }

    /// Drop all captured templates (engine stop)
    pub fn clear(&mut self) {
        self.templates.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{MemorySurface, Selector, Surface};
    use serde_json::json;

    #[test]
    fn rewrite_dot_becomes_key() {
        assert_eq!(
            rewrite_placeholders(r#"<input path="." />"#, "k1"),
            r#"<input path="k1" />"#
        );
    }

    #[test]
    fn rewrite_fragment_is_prefixed_with_key() {
        assert_eq!(
            rewrite_placeholders(r#"<input path="name" />"#, "k1"),
            r#"<input path="k1/name" />"#
        );
    }

    #[test]
    fn rewrite_covers_show_attributes() {
        assert_eq!(
            rewrite_placeholders(r#"<div show="done">x</div>"#, "k2"),
            r#"<div show="k2/done">x</div>"#
        );
    }

    #[test]
    fn rewrite_leaves_unrelated_attributes_alone() {
        let template = r#"<input class="path-input" data-x="name" path="name" />"#;
        assert_eq!(
            rewrite_placeholders(template, "k1"),
            r#"<input class="path-input" data-x="name" path="k1/name" />"#
        );
    }

    #[test]
    fn rewrite_requires_the_full_attribute_name() {
        // Attributes that merely end in path/show stay untouched.
        let template = r#"<input data-path="name" data-show="done" path="name" />"#;
        assert_eq!(
            rewrite_placeholders(template, "k1"),
            r#"<input data-path="name" data-show="done" path="k1/name" />"#
        );
    }

    fn collection_surface() -> (MemorySurface, NodeId) {
        let surface = MemorySurface::from_markup(
            r#"<form><div type="collection" path="items"><input path="name" /><input path="." /></div></form>"#,
        )
        .unwrap();
        let node = surface.select(Selector::Collection)[0];
        (surface, node)
    }

    #[test]
    fn expand_materializes_one_clone_per_key() {
        let (surface, node) = collection_surface();
        let mut expander = CollectionExpander::new();
        let mut resolver = PathResolver::new();
        let mut previous = None;

        let value = json!({"k1": {"name": "a"}, "k2": {"name": "b"}});
        let count = expander.expand(
            &surface,
            &mut resolver,
            node,
            &Path::parse("/items"),
            Some(&value),
            &mut previous,
        );

        assert_eq!(count, 2);
        assert!(surface.find_by_attr("path", "k1/name").is_some());
        assert!(surface.find_by_attr("path", "k1").is_some());
        assert!(surface.find_by_attr("path", "k2/name").is_some());
    }

    #[test]
    fn expand_absent_value_yields_empty_subtree() {
        let (surface, node) = collection_surface();
        let mut expander = CollectionExpander::new();
        let mut resolver = PathResolver::new();
        let mut previous = None;

        let count = expander.expand(
            &surface,
            &mut resolver,
            node,
            &Path::parse("/items"),
            None,
            &mut previous,
        );

        assert_eq!(count, 0);
        assert!(surface.descendants(node).is_empty());
    }

    #[test]
    fn expand_invalidates_previous_subtree() {
        let (surface, node) = collection_surface();
        let mut expander = CollectionExpander::new();
        let mut resolver = PathResolver::new();
        let mut previous = Some(json!({"items": {"k1": {"name": "stale"}}}));

        let value = json!({"k1": {"name": "stale"}});
        expander.expand(
            &surface,
            &mut resolver,
            node,
            &Path::parse("/items"),
            Some(&value),
            &mut previous,
        );

        assert_eq!(previous.unwrap(), json!({"items": {}}));
    }

    #[test]
    fn template_is_captured_once() {
        let (surface, node) = collection_surface();
        let mut expander = CollectionExpander::new();
        let mut resolver = PathResolver::new();
        let mut previous = None;

        let value = json!({"k1": {}});
        expander.expand(
            &surface,
            &mut resolver,
            node,
            &Path::parse("/items"),
            Some(&value),
            &mut previous,
        );

        // Second expansion clones the captured template, not the rewritten
        // children currently in the tree.
        let value = json!({"k9": {}});
        expander.expand(
            &surface,
            &mut resolver,
            node,
            &Path::parse("/items"),
            Some(&value),
            &mut previous,
        );

        assert!(surface.find_by_attr("path", "k9/name").is_some());
        assert!(surface.find_by_attr("path", "k1/k9/name").is_none());
        assert!(surface.find_by_attr("path", "k1/name").is_none());
    }
}
