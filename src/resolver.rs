//! Declarative path resolution (v0.1)
//!
//! Walks a bound node's ancestor chain, collects declared fragments in
//! root-to-node order and normalizes them into one absolute path
//! (see `path` for the fragment grammar).
//!
//! Resolutions are memoized in side tables keyed by node handle, never
//! written back onto the surface. Freshly materialized collection children
//! carry fresh handles, so they always resolve from scratch; handles of
//! destroyed nodes are forgotten during expansion.

use std::collections::HashMap;

use crate::path::Path;
use crate::surface::{NodeId, Surface};

/// Resolves declared fragments to absolute paths, with per-node memoization
#[derive(Debug, Default)]
pub struct PathResolver {
    paths: HashMap<NodeId, Path>,
    show_paths: HashMap<NodeId, Path>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute path of `node`
    ///
    /// A node with no declared fragment anywhere in its chain resolves to
    /// the bare root `/`. Unusual, but valid.
    pub fn resolve(&mut self, surface: &dyn Surface, node: NodeId) -> Path {
        if let Some(path) = self.paths.get(&node) {
            return path.clone();
        }
        let fragments = fragment_chain(surface, Some(node));
        let path = Path::resolve(&fragments);
        self.paths.insert(node, path.clone());
        path
    }

    /// Absolute show-path of `node`
    ///
    /// The `show` fragment resolves against the node's *parent* chain: a
    /// conditional attached to a node is evaluated in that node's own
    /// addressing context, not the conditional target's.
    pub fn resolve_show(&mut self, surface: &dyn Surface, node: NodeId) -> Option<Path> {
        if let Some(path) = self.show_paths.get(&node) {
            return Some(path.clone());
        }
        let show = surface.show_fragment(node)?;
        let mut fragments = fragment_chain(surface, surface.parent(node));
        fragments.push(show);
        let path = Path::resolve(&fragments);
        self.show_paths.insert(node, path.clone());
        Some(path)
    }

    /// Drop memoized state for destroyed nodes
    pub fn forget(&mut self, nodes: &[NodeId]) {
        for node in nodes {
            self.paths.remove(node);
            self.show_paths.remove(node);
        }
    }

    /// Drop all memoized state (engine stop)
    pub fn clear(&mut self) {
        self.paths.clear();
        self.show_paths.clear();
    }
}

/// Declared fragments from the binding root down to `start`
fn fragment_chain(surface: &dyn Surface, start: Option<NodeId>) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = start;
    while let Some(id) = current {
        if let Some(fragment) = surface.path_fragment(id) {
            fragments.push(fragment);
        }
        current = surface.parent(id);
    }
    fragments.reverse();
    fragments
}
