// ブラウザ上でのみ実行（wasm-pack test --headless --chrome core）
#![cfg(target_arch = "wasm32")]

use clearance_core::cache::browser::BrowserCacheStorage;
use clearance_core::cache::CacheBackend;
use clearance_core::storage::indexeddb::IndexedDbOpener;
use clearance_core::storage::{QueueOpener, QueueSchema, QueueStore};
use clearance_core::sync::browser::BrowserSyncPlatform;
use clearance_core::sync::SyncPlatform;
use clearance_core::types::{AssetRequest, AssetResponse, QueuedRequest};
use chrono::Utc;
use serde_json::json;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn schema(name: &str) -> QueueSchema {
    QueueSchema::new(name, 1, "offline-requests")
}

#[wasm_bindgen_test]
async fn test_indexeddb_append_read_clear() {
    let store = IndexedDbOpener.open(&schema("browser-test-queue")).await.unwrap();
    store.clear_all().await.unwrap();

    for plate in ["ABC123", "DEF456"] {
        let item = QueuedRequest::capture(json!({ "plate": plate }), Utc::now()).unwrap();
        store.append(&item).await.unwrap();
    }

    let items = store.read_all().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].payload["plate"], json!("ABC123"));
    assert!(items[0].id.unwrap() < items[1].id.unwrap());

    store.clear_all().await.unwrap();
    store.clear_all().await.unwrap();
    assert!(store.read_all().await.unwrap().is_empty());
}

#[wasm_bindgen_test]
async fn test_second_handle_sees_first_handle_writes() {
    let name = "browser-test-handoff";
    let writer = IndexedDbOpener.open(&schema(name)).await.unwrap();
    writer.clear_all().await.unwrap();
    let item = QueuedRequest::capture(json!({ "plate": "XYZ" }), Utc::now()).unwrap();
    writer.append(&item).await.unwrap();

    let reader = IndexedDbOpener.open(&schema(name)).await.unwrap();
    assert_eq!(reader.read_all().await.unwrap().len(), 1);
    reader.clear_all().await.unwrap();
}

#[wasm_bindgen_test]
fn test_platform_detects_service_worker() {
    let platform = BrowserSyncPlatform::new().unwrap();
    assert!(platform.has_service_worker());
}

#[wasm_bindgen_test]
async fn test_failed_rewrite_keeps_live_entries() {
    let caches = web_sys::window().unwrap().caches().unwrap();
    let storage = BrowserCacheStorage::new(caches);
    let partition = "browser-test-cache-v1";
    storage.delete(partition).await.unwrap();

    let origin = "https://example.github.io/vehicle-clearance-";
    let index = AssetRequest::get(format!("{}/index.html", origin));
    let logo = AssetRequest::get(format!("{}/car_logo.jpg", origin));
    let partial = AssetRequest::get(format!("{}/userguide.html", origin));

    storage.open(partition).await.unwrap();
    storage
        .put_all(partition, vec![(index.clone(), AssetResponse::ok("live"))])
        .await
        .unwrap();

    // Cache.putは206を拒否する
    let result = storage
        .put_all(
            partition,
            vec![
                (index.clone(), AssetResponse::ok("rewritten")),
                (logo.clone(), AssetResponse::ok(vec![0xff, 0xd8])),
                (partial, AssetResponse::with_status(206)),
            ],
        )
        .await;
    assert!(result.is_err());

    let kept = storage.match_request(&index).await.unwrap().unwrap();
    assert_eq!(kept.body, b"live".to_vec());
    assert!(storage.match_request(&logo).await.unwrap().is_none());

    storage.delete(partition).await.unwrap();
}
