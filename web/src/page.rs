use std::rc::Rc;

use clearance_core::storage::indexeddb::{IndexedDbOpener, IndexedDbQueueStore};
use clearance_core::sync::browser::BrowserSyncPlatform;
use clearance_core::sync::register_service_worker as register_worker;
use clearance_core::{OfflineConfig, SubmissionCapture, SyncCoordinator};
use js_sys::Promise;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

/// ページ読み込み時にService Workerを登録する
///
/// 失敗してもページ側には返さない（オフライン対応なしで動き続ける）。
#[wasm_bindgen(js_name = registerServiceWorker)]
pub async fn register_service_worker() -> Result<(), JsValue> {
    let config = OfflineConfig::default();

    let platform = match BrowserSyncPlatform::new() {
        Ok(platform) => platform,
        Err(e) => {
            log::error!("Service Worker registration failed: {}", e);
            return Ok(());
        }
    };

    if let Err(e) = register_worker(&platform, &config.worker_script, &config.worker_scope).await {
        log::error!("Service Worker registration failed: {}", e);
    }
    Ok(())
}

/// ページ側の送信キュー
///
/// ページの生存期間中に1回だけ開き、JS側がこのハンドルを保持する。
#[wasm_bindgen]
pub struct OfflineQueue {
    capture: Rc<SubmissionCapture<IndexedDbQueueStore, BrowserSyncPlatform>>,
}

#[wasm_bindgen]
impl OfflineQueue {
    pub async fn open() -> Result<OfflineQueue, JsValue> {
        let config = OfflineConfig::default();
        let platform = BrowserSyncPlatform::new()?;
        let coordinator = SyncCoordinator::new(&config.sync_tag, &config.notification_icon);

        let capture =
            SubmissionCapture::open(&IndexedDbOpener, &config.queue_schema(), platform, coordinator).await?;

        Ok(OfflineQueue {
            capture: Rc::new(capture),
        })
    }

    /// 送信リクエストを保存してBackground Syncを登録する
    ///
    /// 戻り値のPromiseはrejectしない。Sync登録は `navigator.serviceWorker.ready` を待つため、
    /// Workerが登録されていない間は保存後もpendingのままになる。
    #[wasm_bindgen(js_name = saveRequestForSync)]
    pub fn save_request_for_sync(&self, payload: JsValue) -> Promise {
        let capture = self.capture.clone();
        future_to_promise(async move {
            let payload: serde_json::Value = match serde_wasm_bindgen::from_value(payload) {
                Ok(payload) => payload,
                Err(e) => {
                    log::error!("Could not save request for sync: {}", e);
                    return Ok(JsValue::UNDEFINED);
                }
            };

            let outcome = capture.save_request_for_sync(payload).await;
            log::debug!("saveRequestForSync: {:?}", outcome);
            Ok(JsValue::UNDEFINED)
        })
    }
}
