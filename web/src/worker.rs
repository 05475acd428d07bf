use std::rc::Rc;

use clearance_core::cache::browser::{network_error, to_js_response, BrowserCacheStorage, BrowserNetwork};
use clearance_core::storage::indexeddb::IndexedDbOpener;
use clearance_core::sync::browser::WorkerNotifier;
use clearance_core::types::{AssetRequest, DrainOutcome};
use clearance_core::{CoreError, OfflineConfig, OfflineWorker, Result};
use js_sys::Promise;
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};
use web_sys::{Request, ServiceWorkerGlobalScope};

type BrowserWorker = OfflineWorker<BrowserCacheStorage, IndexedDbOpener, WorkerNotifier>;

fn service_worker_scope() -> Result<ServiceWorkerGlobalScope> {
    js_sys::global()
        .dyn_into::<ServiceWorkerGlobalScope>()
        .map_err(|_| CoreError::Other("Not running in a service worker".to_string()))
}

/// Service Worker側のランタイム
///
/// リスナーはスクリプト評価時に同期登録する必要があるため、
/// 登録はJS側（sw.js）で行い、各ハンドラからこのメソッドを呼ぶ。
#[wasm_bindgen]
pub struct WorkerRuntime {
    inner: Rc<BrowserWorker>,
}

#[wasm_bindgen]
impl WorkerRuntime {
    #[wasm_bindgen(constructor)]
    pub fn new() -> std::result::Result<WorkerRuntime, JsValue> {
        let config = OfflineConfig::default();
        let scope = service_worker_scope()?;
        let base = Url::parse(&scope.registration().scope()).map_err(CoreError::from)?;

        let worker = OfflineWorker::new(
            &config,
            base,
            BrowserCacheStorage::from_worker_scope()?,
            IndexedDbOpener,
            WorkerNotifier::from_worker_scope()?,
        );

        Ok(WorkerRuntime {
            inner: Rc::new(worker),
        })
    }

    /// `install` の waitUntil に渡す
    pub fn install(&self) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move { install(&inner).await.map_err(JsValue::from) })
    }

    /// `activate` の waitUntil に渡す
    pub fn activate(&self) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move { activate(&inner).await.map_err(JsValue::from) })
    }

    /// `fetch` の respondWith に渡す
    pub fn fetch(&self, request: Request) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move { fetch(&inner, request).await.map_err(JsValue::from) })
    }

    /// `sync` の waitUntil に渡す。失敗は通知済みなので常にresolveする
    pub fn sync(&self, tag: String) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            if let DrainOutcome::Failed { reason } = inner.on_sync(&tag).await {
                log::warn!("Sync for {} ended with failure: {}", tag, reason);
            }
            Ok(JsValue::UNDEFINED)
        })
    }
}

async fn install(worker: &BrowserWorker) -> Result<JsValue> {
    let network = BrowserNetwork::from_worker_scope()?;
    let count = worker.on_install(&network).await?;
    Ok(JsValue::from(count as u32))
}

async fn activate(worker: &BrowserWorker) -> Result<JsValue> {
    let deleted = worker.on_activate().await?;
    Ok(JsValue::from(deleted.len() as u32))
}

/// キャッシュミス時は元のRequestをそのまま転送する（本文やモードを保つため）
async fn fetch(worker: &BrowserWorker, request: Request) -> Result<JsValue> {
    let asset_request = AssetRequest::new(request.method(), request.url());

    match worker.cache().lookup(&asset_request).await {
        Ok(Some(hit)) => return Ok(to_js_response(&hit)?.into()),
        Ok(None) => {}
        Err(e) => log::warn!("Cache lookup failed for {}: {}", asset_request.url, e),
    }

    let scope = service_worker_scope()?;
    JsFuture::from(scope.fetch_with_request(&request))
        .await
        .map_err(network_error)
}
