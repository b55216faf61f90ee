//! Snapshot reconciliation (v0.1)
//!
//! One pass walks the bound nodes in role groups (collections first, then
//! asset displays, scalars and conditionals) and re-applies exactly the
//! nodes whose fingerprint changed between the previous and current
//! snapshot. The previous snapshot is swapped only after the whole pass, so
//! a failing apply never leaves the pair half-advanced.
//!
//! Collection expansion happens inside the pass; the children it
//! materializes carry fresh handles and are applied unconditionally in the
//! remaining groups of the same pass.

use std::collections::HashSet;
use std::time::Instant;

use serde_json::Value;
use tracing::debug;

use crate::assets::{AssetPipeline, PendingFetch};
use crate::event_log::{EventKind, EventLog};
use crate::expand::CollectionExpander;
use crate::fingerprint::{changed, display_string, truthy, Role};
use crate::path::Path;
use crate::resolver::PathResolver;
use crate::surface::{InputKind, NodeId, Selector, Surface};

/// What one reconciliation pass did
#[derive(Debug)]
pub struct PassReport {
    /// Bound nodes whose fingerprint changed and were re-applied
    pub applied: usize,
    /// Thumbnail fetches to complete on later engine turns
    pub fetches: Vec<PendingFetch>,
    pub duration_ms: u64,
}

/// Drives snapshot pairs onto the surface with minimal re-application
pub struct Reconciler {
    /// Binding root store path; resolved node paths are relative to it
    root: Path,
    previous: Option<Value>,
    resolver: PathResolver,
    expander: CollectionExpander,
    events: EventLog,
}

impl Reconciler {
    pub fn new(root: Path, events: EventLog) -> Self {
        Self {
            root,
            previous: None,
            resolver: PathResolver::new(),
            expander: CollectionExpander::new(),
            events,
        }
    }

    /// Apply `snapshot` (the subtree under the binding root) to the surface
    pub fn reconcile(
        &mut self,
        surface: &dyn Surface,
        assets: &AssetPipeline,
        snapshot: &Value,
    ) -> PassReport {
        let started = Instant::now();
        let mut applied = 0;
        let mut fetches = Vec::new();
        // Handles materialized by expansion during this pass; they have no
        // meaningful previous state, so they are applied unconditionally.
        let mut fresh: HashSet<NodeId> = HashSet::new();

        applied += self.reconcile_collections(surface, snapshot, &mut fresh);
        applied += self.reconcile_assets(surface, assets, snapshot, &fresh, &mut fetches);
        applied += self.reconcile_scalars(surface, snapshot, &fresh);
        applied += self.reconcile_conditionals(surface, snapshot, &fresh);

        self.previous = Some(snapshot.clone());

        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(applied, duration_ms, "reconciliation pass complete");
        PassReport {
            applied,
            fetches,
            duration_ms,
        }
    }

    /// Expand changed collections until no unvisited collection remains
    ///
    /// Expansion can materialize nested collections, so selection repeats
    /// until a round makes no progress.
    fn reconcile_collections(
        &mut self,
        surface: &dyn Surface,
        snapshot: &Value,
        fresh: &mut HashSet<NodeId>,
    ) -> usize {
        let mut applied = 0;
        let mut seen: HashSet<NodeId> = HashSet::new();
        loop {
            let mut progressed = false;
            for node in surface.select(Selector::Collection) {
                if !seen.insert(node) {
                    continue;
                }
                progressed = true;
                let path = self.resolver.resolve(surface, node);
                let value = path.get(snapshot);
                if !self.must_apply(Role::Collection, node, &path, value, fresh) {
                    continue;
                }
                let children = self.expander.expand(
                    surface,
                    &mut self.resolver,
                    node,
                    &path,
                    value,
                    &mut self.previous,
                );
                fresh.extend(surface.descendants(node));
                self.events.emit(EventKind::CollectionExpanded {
                    path: path.to_string(),
                    children,
                });
                applied += 1;
            }
            if !progressed {
                break;
            }
        }
        applied
    }

    fn reconcile_assets(
        &mut self,
        surface: &dyn Surface,
        assets: &AssetPipeline,
        snapshot: &Value,
        fresh: &HashSet<NodeId>,
        fetches: &mut Vec<PendingFetch>,
    ) -> usize {
        let mut applied = 0;
        for node in surface.select(Selector::AssetDisplay) {
            let path = self.resolver.resolve(surface, node);
            let value = path.get(snapshot);
            if !self.must_apply(Role::AssetDisplay, node, &path, value, fresh) {
                continue;
            }
            // The pipeline addresses the parallel store trees, which need
            // the full path including the binding root.
            let store_path = self.root.join(&path);
            fetches.extend(assets.display(surface, node, &store_path, value));
            applied += 1;
        }
        applied
    }

    fn reconcile_scalars(
        &mut self,
        surface: &dyn Surface,
        snapshot: &Value,
        fresh: &HashSet<NodeId>,
    ) -> usize {
        let mut applied = 0;
        for node in surface.select(Selector::ScalarBound) {
            // File inputs are write-only from the user's side; the engine
            // never programs their displayed value.
            if surface.input_kind(node) == Some(InputKind::File) {
                continue;
            }
            let path = self.resolver.resolve(surface, node);
            let value = path.get(snapshot);
            if !self.must_apply(Role::ScalarInput, node, &path, value, fresh) {
                continue;
            }

            if surface.input_kind(node) == Some(InputKind::Checkbox) {
                let checked = value.and_then(Value::as_f64) == Some(1.0);
                if surface.checked(node) != checked {
                    surface.set_checked(node, checked);
                }
            } else {
                let display = display_string(value);
                // Skip the write when the surface already shows the target
                // value, so an untouched element is never re-touched.
                if surface.value(node).as_deref() != Some(display.as_str()) {
                    surface.set_value(node, &display);
                }
            }
            applied += 1;
        }
        applied
    }

    fn reconcile_conditionals(
        &mut self,
        surface: &dyn Surface,
        snapshot: &Value,
        fresh: &HashSet<NodeId>,
    ) -> usize {
        let mut applied = 0;
        for node in surface.select(Selector::Conditional) {
            let Some(path) = self.resolver.resolve_show(surface, node) else {
                continue;
            };
            let value = path.get(snapshot);
            if !self.must_apply(Role::Conditional, node, &path, value, fresh) {
                continue;
            }
            surface.set_visible(node, truthy(value));
            applied += 1;
        }
        applied
    }

    /// First pass and freshly materialized nodes apply unconditionally;
    /// everything else is fingerprint-diffed.
    fn must_apply(
        &self,
        role: Role,
        node: NodeId,
        path: &Path,
        value: Option<&Value>,
        fresh: &HashSet<NodeId>,
    ) -> bool {
        let Some(previous) = self.previous.as_ref() else {
            return true;
        };
        if fresh.contains(&node) {
            return true;
        }
        changed(role, path.get(previous), value)
    }

    /// Forget the snapshot pair and all per-node side tables (engine stop)
    pub fn reset(&mut self) {
        self.previous = None;
        self.resolver.clear();
        self.expander.clear();
    }

    pub fn resolver_mut(&mut self) -> &mut PathResolver {
        &mut self.resolver
    }
}
