//! Engine lifecycle and event loop (v0.1)
//!
//! The engine owns one binding root and serializes everything that happens
//! to it: store snapshots, user input and deferred asset fetches all go
//! through a single owned queue, processed strictly one message at a time
//! to completion. Nothing here is reentrant; a snapshot arriving while a
//! pass runs waits its turn.
//!
//! Construction reads the root declaration from the surface and fails fast
//! when no path is declared. `start` performs the authentication handshake,
//! seeds the first render from the durable cache and attaches the store
//! subscription; `drain` pumps the queue until it is empty.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::assets::{AssetPipeline, AssetTransform, PendingFetch};
use crate::cache::{data_key, SnapshotCache};
use crate::error::BindError;
use crate::event_log::{EventKind, EventLog};
use crate::path::Path;
use crate::reconcile::Reconciler;
use crate::store::StoreClient;
use crate::surface::{ActionKind, Selector, Surface};
use crate::sync::{ConfirmGate, InputEvent, TwoWaySync};

/// One queued unit of work
#[derive(Debug)]
enum EngineMsg {
    Snapshot(Value),
    Input(InputEvent),
    Fetch(PendingFetch),
}

/// Binds one surface root to one store subtree
pub struct Engine {
    root: Path,
    credential: Option<String>,
    surface: Arc<dyn Surface>,
    store: Arc<dyn StoreClient>,
    cache: Arc<dyn SnapshotCache>,
    sync: TwoWaySync,
    assets: AssetPipeline,
    reconciler: Reconciler,
    events: EventLog,
    subscription: Option<UnboundedReceiver<Value>>,
    queue: VecDeque<EngineMsg>,
    running: bool,
}

impl Engine {
    /// Build an engine from the surface's root declaration
    ///
    /// Fails with a fatal configuration error when the root declares no
    /// path. The declaration is detached afterwards so the root never
    /// contributes a fragment to path resolution.
    pub fn new(
        surface: Arc<dyn Surface>,
        store: Arc<dyn StoreClient>,
        cache: Arc<dyn SnapshotCache>,
        transform: Arc<dyn AssetTransform>,
        confirm: Arc<dyn ConfirmGate>,
    ) -> Result<Self, BindError> {
        let declaration = surface.root_declaration();
        let root = declaration
            .path
            .map(|p| Path::parse(&p))
            .ok_or_else(|| BindError::configuration("no path attribute on the binding root"))?;
        surface.detach_root_declaration();

        let events = EventLog::new();
        let sync = TwoWaySync::new(
            root.clone(),
            Arc::clone(&store),
            confirm,
            events.clone(),
        );
        let assets = AssetPipeline::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            transform,
            events.clone(),
        );
        let reconciler = Reconciler::new(root.clone(), events.clone());

        Ok(Self {
            root,
            credential: declaration.credential,
            surface,
            store,
            cache,
            sync,
            assets,
            reconciler,
            events,
            subscription: None,
            queue: VecDeque::new(),
            running: false,
        })
    }

    /// Start (or restart) the binding
    ///
    /// Forgets any earlier snapshot pair, authenticates when a credential
    /// was declared, renders once from the durable cache and attaches the
    /// store subscription. Authentication failure is fatal; a missing
    /// credential means anonymous access and is merely logged.
    pub async fn start(&mut self) -> Result<(), BindError> {
        if self.running {
            self.detach();
        }
        self.reconciler.reset();
        self.queue.clear();

        match &self.credential {
            Some(token) => self.store.authenticate(token).await?,
            None => warn!(root = %self.root, "no credential declared, binding anonymously"),
        }

        let seeded = self.seeded_snapshot();
        let data_root = self.root.prefixed("data");
        self.subscription = Some(self.store.subscribe(&data_root).await?);
        self.running = true;

        self.reconcile(seeded);
        self.events.emit(EventKind::EngineStarted {
            root: self.root.to_string(),
        });
        info!(root = %self.root, "engine started");
        Ok(())
    }

    /// Detach the subscription and forget all per-run state
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.detach();
        self.queue.clear();
        self.reconciler.reset();
        self.running = false;
        self.events.emit(EventKind::EngineStopped);
        info!(root = %self.root, "engine stopped");
    }

    fn detach(&mut self) {
        self.store.unsubscribe(&self.root.prefixed("data"));
        self.subscription = None;
    }

    /// Queue a user interaction; processed on the next `drain`
    pub fn handle_input(&mut self, event: InputEvent) {
        self.queue.push_back(EngineMsg::Input(event));
    }

    /// Process queued work until nothing is pending
    ///
    /// Pulls snapshots the subscription delivered since the last drain,
    /// then dispatches messages one at a time. Work queued by a message
    /// (asset fetches, follow-up snapshots triggered by writes) is picked
    /// up within the same drain.
    pub async fn drain(&mut self) {
        if !self.running {
            return;
        }
        loop {
            if let Some(rx) = self.subscription.as_mut() {
                while let Ok(snapshot) = rx.try_recv() {
                    self.queue.push_back(EngineMsg::Snapshot(snapshot));
                }
            }
            let Some(msg) = self.queue.pop_front() else {
                break;
            };
            self.dispatch(msg).await;
        }
    }

    async fn dispatch(&mut self, msg: EngineMsg) {
        match msg {
            EngineMsg::Snapshot(snapshot) => {
                self.events.emit(EventKind::SnapshotReceived);
                let snapshot = match snapshot {
                    Value::Null => json!({}),
                    other => other,
                };
                // Persisted before reconciling, so a crash mid-pass still
                // seeds the next start from this snapshot.
                self.persist(&snapshot);
                self.reconcile(snapshot);
            }
            EngineMsg::Input(event) => self.apply_input(event).await,
            EngineMsg::Fetch(fetch) => {
                let surface = Arc::clone(&self.surface);
                self.assets.complete_fetch(surface.as_ref(), fetch).await;
            }
        }
    }

    fn reconcile(&mut self, snapshot: Value) {
        let surface = Arc::clone(&self.surface);
        let assets = self.assets.clone();
        let report = self.reconciler.reconcile(surface.as_ref(), &assets, &snapshot);
        for fetch in report.fetches {
            self.queue.push_back(EngineMsg::Fetch(fetch));
        }
        self.events.emit(EventKind::PassCompleted {
            applied: report.applied,
            duration_ms: report.duration_ms,
        });
    }

    async fn apply_input(&mut self, event: InputEvent) {
        let surface = Arc::clone(&self.surface);
        match event {
            InputEvent::Edited { node, raw } => {
                let Some(kind) = surface.input_kind(node) else {
                    return;
                };
                let path = self.reconciler.resolver_mut().resolve(surface.as_ref(), node);
                self.sync.write_scalar(&path, kind, &raw).await;
            }
            InputEvent::Toggled { node, checked } => {
                let path = self.reconciler.resolver_mut().resolve(surface.as_ref(), node);
                self.sync.toggle(&path, checked).await;
            }
            InputEvent::FileChosen { node, file } => {
                let path = self.reconciler.resolver_mut().resolve(surface.as_ref(), node);
                let store_path = self.root.join(&path);
                let report = self.assets.upload(&store_path, &file).await;
                debug!(path = %store_path, progress = ?report.progress, "upload finished");
            }
            InputEvent::Clicked { node } => {
                let path = self.reconciler.resolver_mut().resolve(surface.as_ref(), node);
                match surface.action(node) {
                    Some(ActionKind::Add) => self.sync.add_entry(&path).await,
                    Some(ActionKind::Remove) => self.sync.remove_entry(&path).await,
                    // A click on a bound image opens the raw asset.
                    None if surface.select(Selector::AssetDisplay).contains(&node) => {
                        let store_path = self.root.join(&path);
                        self.assets.open_raw(surface.as_ref(), &store_path).await;
                    }
                    None => {}
                }
            }
        }
    }

    /// Last persisted snapshot, or an empty mapping
    fn seeded_snapshot(&self) -> Value {
        let key = data_key(&self.root.to_string());
        match self.cache.get_item(&key) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(key, error = %err, "cached snapshot unreadable, starting empty");
                json!({})
            }),
            None => json!({}),
        }
    }

    fn persist(&self, snapshot: &Value) {
        let key = data_key(&self.root.to_string());
        match serde_json::to_string(snapshot) {
            Ok(raw) => self.cache.set_item(&key, &raw),
            Err(err) => warn!(key, error = %err, "snapshot not persisted"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }
}
