//! End-to-end engine scenarios over the in-crate memory implementations.

use std::sync::Arc;

use serde_json::json;

use anyhow::Result;
use pathbind::{
    AutoConfirm, Engine, EventKind, IdentityTransform, InputEvent, MemoryCache, MemoryStore,
    MemorySurface, Path, RawAsset, Selector, StoreClient, Surface,
};

fn engine_over(
    markup: &str,
    store: &MemoryStore,
    cache: &MemoryCache,
    confirm: AutoConfirm,
) -> (Engine, Arc<MemorySurface>) {
    let surface = Arc::new(MemorySurface::from_markup(markup).expect("well-formed markup"));
    let engine = Engine::new(
        Arc::clone(&surface) as Arc<dyn Surface>,
        Arc::new(store.clone()),
        Arc::new(cache.clone()),
        Arc::new(IdentityTransform),
        Arc::new(confirm),
    )
    .expect("root declares a path");
    (engine, surface)
}

const FORM: &str = r#"<form path="/form">
    <input path="a/name" />
    <input type="checkbox" path="a/done" />
    <div show="a/ready">details</div>
</form>"#;

#[tokio::test]
async fn first_snapshot_renders_the_form() -> Result<()> {
    let store = MemoryStore::with_value(json!({
        "data": {"form": {"a": {"name": "x", "done": 1, "ready": 1}}}
    }));
    let cache = MemoryCache::new();
    let (mut engine, surface) = engine_over(FORM, &store, &cache, AutoConfirm::accept());

    engine.start().await?;
    engine.drain().await;

    let name = surface.find_by_attr("path", "a/name").unwrap();
    let done = surface.find_by_attr("path", "a/done").unwrap();
    let details = surface.find_by_attr("show", "a/ready").unwrap();
    assert_eq!(surface.value(name).as_deref(), Some("x"));
    assert!(surface.checked(done));
    assert!(surface.visible(details));
    Ok(())
}

#[tokio::test]
async fn edit_round_trips_without_retouching_the_input() {
    let store = MemoryStore::with_value(json!({
        "data": {"form": {"a": {"name": "x"}}}
    }));
    let cache = MemoryCache::new();
    let (mut engine, surface) = engine_over(FORM, &store, &cache, AutoConfirm::accept());

    engine.start().await.unwrap();
    engine.drain().await;

    // The user types "y"; the surface already displays it when the engine
    // hears about the edit.
    let name = surface.find_by_attr("path", "a/name").unwrap();
    surface.set_value(name, "y");
    let writes_before = surface.value_write_count(name);

    engine.handle_input(InputEvent::Edited {
        node: name,
        raw: "y".into(),
    });
    engine.drain().await;

    assert_eq!(
        store.value_at(&Path::parse("/data/form/a/name")),
        Some(json!("y"))
    );
    // The confirming snapshot matched the displayed value, so the input was
    // never re-touched.
    assert_eq!(surface.value_write_count(name), writes_before);
}

#[tokio::test]
async fn checkbox_round_trips_as_numeric_flag() {
    let store = MemoryStore::with_value(json!({
        "data": {"form": {"a": {"done": 0}}}
    }));
    let cache = MemoryCache::new();
    let (mut engine, surface) = engine_over(FORM, &store, &cache, AutoConfirm::accept());

    engine.start().await.unwrap();
    engine.drain().await;

    let done = surface.find_by_attr("path", "a/done").unwrap();
    assert!(!surface.checked(done));

    surface.set_checked(done, true);
    engine.handle_input(InputEvent::Toggled {
        node: done,
        checked: true,
    });
    engine.drain().await;

    assert_eq!(
        store.value_at(&Path::parse("/data/form/a/done")),
        Some(json!(1))
    );
    assert!(surface.checked(done));
}

#[tokio::test]
async fn empty_edit_deletes_the_entry() {
    let store = MemoryStore::with_value(json!({
        "data": {"form": {"a": {"name": "x", "done": 1}}}
    }));
    let cache = MemoryCache::new();
    let (mut engine, surface) = engine_over(FORM, &store, &cache, AutoConfirm::accept());

    engine.start().await.unwrap();
    engine.drain().await;

    let name = surface.find_by_attr("path", "a/name").unwrap();
    surface.set_value(name, "");
    engine.handle_input(InputEvent::Edited {
        node: name,
        raw: String::new(),
    });
    engine.drain().await;

    assert_eq!(
        store.value_at(&Path::parse("/data/form/a")),
        Some(json!({"done": 1}))
    );
    assert_eq!(surface.value(name).as_deref(), Some(""));
}

const LIST: &str = r#"<form path="/form">
    <div type="collection" path="items">
        <input path="name" />
        <button action="remove" path="." >x</button>
    </div>
    <button action="add" path="items">add</button>
</form>"#;

#[tokio::test]
async fn add_action_grows_the_collection() {
    let store = MemoryStore::new();
    let cache = MemoryCache::new();
    let (mut engine, surface) = engine_over(LIST, &store, &cache, AutoConfirm::accept());

    engine.start().await.unwrap();
    engine.drain().await;

    let add = surface.find_by_attr("action", "add").unwrap();
    engine.handle_input(InputEvent::Clicked { node: add });
    engine.drain().await;

    let items = store.value_at(&Path::parse("/data/form/items")).unwrap();
    let keys: Vec<&String> = items.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 1);

    // One clone per key, with rewritten fragments.
    let key = keys[0].clone();
    assert!(surface
        .find_by_attr("path", &format!("{key}/name"))
        .is_some());
    assert!(surface.find_by_attr("path", &key).is_some());
}

#[tokio::test]
async fn remove_action_shrinks_the_collection_and_asset_tree() {
    let store = MemoryStore::with_value(json!({
        "data": {"form": {"items": {"k1": {"name": "a"}, "k2": {"name": "b"}}}},
        "asset": {"form": {"items": {"k1": {"raw": "bytes"}}}}
    }));
    let cache = MemoryCache::new();
    let (mut engine, surface) = engine_over(LIST, &store, &cache, AutoConfirm::accept());

    engine.start().await.unwrap();
    engine.drain().await;

    let remove = surface.find_by_attr("path", "k1").unwrap();
    engine.handle_input(InputEvent::Clicked { node: remove });
    engine.drain().await;

    assert_eq!(
        store.value_at(&Path::parse("/data/form/items")),
        Some(json!({"k2": {"name": "b"}}))
    );
    assert_eq!(
        store.value_at(&Path::parse("/asset/form/items")),
        Some(json!({}))
    );
    assert!(surface.find_by_attr("path", "k1/name").is_none());
    assert!(surface.find_by_attr("path", "k2/name").is_some());
}

#[tokio::test]
async fn declined_removal_changes_nothing() {
    let store = MemoryStore::with_value(json!({
        "data": {"form": {"items": {"k1": {"name": "a"}}}}
    }));
    let cache = MemoryCache::new();
    let (mut engine, surface) = engine_over(LIST, &store, &cache, AutoConfirm::decline());

    engine.start().await.unwrap();
    engine.drain().await;

    let remove = surface.find_by_attr("path", "k1").unwrap();
    engine.handle_input(InputEvent::Clicked { node: remove });
    engine.drain().await;

    assert_eq!(
        store.value_at(&Path::parse("/data/form/items/k1")),
        Some(json!({"name": "a"}))
    );
    assert!(engine
        .events()
        .events()
        .iter()
        .any(|e| matches!(e.kind, EventKind::ConfirmDeclined { .. })));
}

#[tokio::test]
async fn conditional_follows_store_truthiness() {
    let store = MemoryStore::with_value(json!({
        "data": {"form": {"a": {"ready": 0}}}
    }));
    let cache = MemoryCache::new();
    let (mut engine, surface) = engine_over(FORM, &store, &cache, AutoConfirm::accept());

    engine.start().await.unwrap();
    engine.drain().await;

    let details = surface.find_by_attr("show", "a/ready").unwrap();
    assert!(!surface.visible(details));

    store
        .write(&Path::parse("/data/form/a/ready"), json!(1))
        .await
        .unwrap();
    engine.drain().await;
    assert!(surface.visible(details));
}

const GALLERY: &str = r#"<form path="/form">
    <input type="file" path="photo" />
    <img path="photo" />
</form>"#;

#[tokio::test]
async fn upload_then_display_populates_image_and_cache() {
    let store = MemoryStore::new();
    let cache = MemoryCache::new();
    let (mut engine, surface) = engine_over(GALLERY, &store, &cache, AutoConfirm::accept());

    engine.start().await.unwrap();
    engine.drain().await;

    let img = surface.select(Selector::AssetDisplay)[0];
    assert!(!surface.visible(img));

    let file_input = surface.find_by_attr("type", "file").unwrap();
    engine.handle_input(InputEvent::FileChosen {
        node: file_input,
        file: RawAsset {
            name: "photo.png".into(),
            media_type: "image/png".into(),
            size: 7,
            last_modified: 1_700_000_000_000,
            payload: "PNGDATA".into(),
        },
    });
    engine.drain().await;

    assert!(surface.visible(img));
    assert_eq!(surface.image_source(img).as_deref(), Some("PNGDATA"));

    // A second engine over the same cache displays without a store fetch.
    let (mut second, surface2) = engine_over(GALLERY, &store, &cache, AutoConfirm::accept());
    second.start().await.unwrap();
    second.drain().await;

    let img2 = surface2.select(Selector::AssetDisplay)[0];
    assert_eq!(surface2.image_source(img2).as_deref(), Some("PNGDATA"));
    assert!(!second
        .events()
        .events()
        .iter()
        .any(|e| matches!(e.kind, EventKind::AssetFetchQueued { .. })));
}

#[tokio::test]
async fn clicking_an_image_opens_the_raw_asset() {
    let store = MemoryStore::new();
    let cache = MemoryCache::new();
    let (mut engine, surface) = engine_over(GALLERY, &store, &cache, AutoConfirm::accept());

    engine.start().await.unwrap();
    engine.drain().await;

    let file_input = surface.find_by_attr("type", "file").unwrap();
    engine.handle_input(InputEvent::FileChosen {
        node: file_input,
        file: RawAsset {
            name: "photo.png".into(),
            media_type: "image/png".into(),
            size: 7,
            last_modified: 1_700_000_000_000,
            payload: "PNGDATA".into(),
        },
    });
    engine.drain().await;

    let img = surface.select(Selector::AssetDisplay)[0];
    engine.handle_input(InputEvent::Clicked { node: img });
    engine.drain().await;

    assert_eq!(surface.opened_assets(), vec!["PNGDATA".to_string()]);
    assert!(engine
        .events()
        .events()
        .iter()
        .any(|e| matches!(e.kind, EventKind::AssetOpened { .. })));
}

#[tokio::test]
async fn restart_renders_from_the_cached_snapshot() {
    let store = MemoryStore::with_value(json!({
        "data": {"form": {"a": {"name": "remembered"}}}
    }));
    let cache = MemoryCache::new();
    let (mut engine, _surface) = engine_over(FORM, &store, &cache, AutoConfirm::accept());
    engine.start().await.unwrap();
    engine.drain().await;
    engine.stop();

    // The store is unreachable for reads now; only the cache remains.
    let offline = MemoryStore::new();
    let (mut second, surface2) = engine_over(FORM, &offline, &cache, AutoConfirm::accept());
    second.start().await.unwrap();

    // Seeded render happens during start, before any snapshot arrives.
    let name = surface2.find_by_attr("path", "a/name").unwrap();
    assert_eq!(surface2.value(name).as_deref(), Some("remembered"));
}

#[tokio::test]
async fn snapshots_arriving_mid_drain_are_processed_in_order() {
    let store = MemoryStore::with_value(json!({
        "data": {"form": {"a": {"name": "x"}}}
    }));
    let cache = MemoryCache::new();
    let (mut engine, surface) = engine_over(FORM, &store, &cache, AutoConfirm::accept());

    engine.start().await.unwrap();

    // Two further writes land before the engine drains anything.
    store
        .write(&Path::parse("/data/form/a/name"), json!("y"))
        .await
        .unwrap();
    store
        .write(&Path::parse("/data/form/a/name"), json!("z"))
        .await
        .unwrap();
    engine.drain().await;

    let name = surface.find_by_attr("path", "a/name").unwrap();
    assert_eq!(surface.value(name).as_deref(), Some("z"));

    let snapshots = engine
        .events()
        .events()
        .iter()
        .filter(|e| e.kind == EventKind::SnapshotReceived)
        .count();
    assert_eq!(snapshots, 3);
}

#[tokio::test]
async fn pass_events_record_applied_counts() {
    let store = MemoryStore::with_value(json!({
        "data": {"form": {"a": {"name": "x", "done": 1, "ready": 1}}}
    }));
    let cache = MemoryCache::new();
    let (mut engine, _surface) = engine_over(FORM, &store, &cache, AutoConfirm::accept());

    engine.start().await.unwrap();
    engine.drain().await;

    let passes: Vec<usize> = engine
        .events()
        .events()
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::PassCompleted { applied, .. } => Some(applied),
            _ => None,
        })
        .collect();

    // Seeded pass (empty cache, everything absent) plus the first snapshot.
    assert_eq!(passes.len(), 2);
    assert_eq!(passes[1], 3);
}
