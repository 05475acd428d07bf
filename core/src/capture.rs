use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::storage::{QueueOpener, QueueSchema, QueueStore};
use crate::sync::{SyncCoordinator, SyncPlatform};
use crate::types::{CaptureOutcome, QueuedRequest};

/// ページ側: オフライン時の送信リクエストを保存してSyncを登録する
///
/// ストアはコンテキストごとに1回だけ開き、このハンドルが所有する。
pub struct SubmissionCapture<S: QueueStore, P: SyncPlatform> {
    store: S,
    platform: P,
    coordinator: SyncCoordinator,
}

impl<S: QueueStore, P: SyncPlatform> SubmissionCapture<S, P> {
    pub fn new(store: S, platform: P, coordinator: SyncCoordinator) -> Self {
        Self {
            store,
            platform,
            coordinator,
        }
    }

    /// 開いたストアで初期化
    pub async fn open<O>(opener: &O, schema: &QueueSchema, platform: P, coordinator: SyncCoordinator) -> Result<Self>
    where
        O: QueueOpener<Store = S>,
    {
        let store = opener.open(schema).await?;
        Ok(Self::new(store, platform, coordinator))
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn save_request_for_sync(&self, payload: Value) -> CaptureOutcome {
        self.save_request_for_sync_at(payload, Utc::now()).await
    }

    /// 失敗はログに出すだけで呼び出し側には返さない
    pub async fn save_request_for_sync_at(&self, payload: Value, at: DateTime<Utc>) -> CaptureOutcome {
        let item = match QueuedRequest::capture(payload, at) {
            Ok(item) => item,
            Err(e) => {
                log::error!("Could not save request for sync: {}", e);
                return CaptureOutcome::Dropped;
            }
        };

        if let Err(e) = self.store.append(&item).await {
            log::error!("Could not save request for sync: {}", e);
            return CaptureOutcome::Dropped;
        }
        log::info!("Request saved for background sync.");

        match self.coordinator.register(&self.platform).await {
            Ok(()) => CaptureOutcome::Queued,
            Err(e) => {
                log::error!("Background sync registration failed: {}", e);
                CaptureOutcome::QueuedWithoutSync
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock::{MockDatabases, MockOp};
    use crate::sync::mock::MockSyncPlatform;
    use crate::types::SyncState;
    use chrono::TimeZone;
    use serde_json::json;

    const TAG: &str = "sync-clearance-requests";

    fn schema() -> QueueSchema {
        QueueSchema::new("capture-test-db", 1, "offline-requests")
    }

    async fn capture(
        dbs: &MockDatabases,
        platform: MockSyncPlatform,
    ) -> SubmissionCapture<crate::storage::mock::MockQueueStore, MockSyncPlatform> {
        SubmissionCapture::open(dbs, &schema(), platform, SyncCoordinator::new(TAG, "car_logo.jpg"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_appends_and_registers() {
        let dbs = MockDatabases::new();
        let platform = MockSyncPlatform::supported();
        let capture = capture(&dbs, platform.clone()).await;
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();

        let outcome = capture
            .save_request_for_sync_at(json!({"plate": "ABC123"}), at)
            .await;
        assert_eq!(outcome, CaptureOutcome::Queued);
        assert_eq!(platform.registered_tags(), vec![TAG.to_string()]);
        assert_eq!(capture.coordinator().state(), SyncState::Registered);

        let items = capture.store().read_all().await.unwrap();
        assert_eq!(
            items.iter().map(|i| i.to_json()).collect::<Vec<_>>(),
            vec![json!({"plate": "ABC123", "savedOfflineAt": "2024-05-01T08:30:00.000Z", "id": 1})]
        );

        capture.store().clear_all().await.unwrap();
        assert!(capture.store().read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_failure_is_swallowed_and_skips_registration() {
        let dbs = MockDatabases::new();
        let platform = MockSyncPlatform::supported();
        let capture = capture(&dbs, platform.clone()).await;
        dbs.fail(MockOp::Append);

        let outcome = capture.save_request_for_sync(json!({"plate": "X"})).await;
        assert_eq!(outcome, CaptureOutcome::Dropped);
        assert!(platform.registered_tags().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_sync_still_queues() {
        let dbs = MockDatabases::new();
        let capture = capture(&dbs, MockSyncPlatform::without_background_sync()).await;

        let outcome = capture.save_request_for_sync(json!({"plate": "X"})).await;
        assert_eq!(outcome, CaptureOutcome::QueuedWithoutSync);
        assert_eq!(capture.store().read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_object_payload_is_dropped() {
        let dbs = MockDatabases::new();
        let capture = capture(&dbs, MockSyncPlatform::supported()).await;

        let outcome = capture.save_request_for_sync(json!("ABC123")).await;
        assert_eq!(outcome, CaptureOutcome::Dropped);
        assert!(capture.store().read_all().await.unwrap().is_empty());
    }
}
