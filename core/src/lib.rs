pub mod types;
pub mod config;
pub mod storage;
pub mod cache;
pub mod sync;
pub mod capture;
pub mod error;

use url::Url;

pub use error::{CoreError, Result};
pub use config::OfflineConfig;
pub use capture::SubmissionCapture;
pub use sync::SyncCoordinator;

use crate::cache::{AssetCache, CacheBackend, Network};
use crate::storage::{QueueOpener, QueueSchema};
use crate::sync::Notifier;
use crate::types::{AssetRequest, DrainOutcome, ServedResponse};

/// OfflineWorker: Service Workerのイベントから使用されるメインAPI
///
/// install / activate / fetch / sync の各エントリーポイントはプラットフォームが呼ぶ。
pub struct OfflineWorker<C: CacheBackend, O: QueueOpener, N: Notifier> {
    cache: AssetCache<C>,
    opener: O,
    notifier: N,
    schema: QueueSchema,
    coordinator: SyncCoordinator,
}

impl<C: CacheBackend, O: QueueOpener, N: Notifier> OfflineWorker<C, O, N> {
    /// `base` はWorkerのスコープURL（事前キャッシュの相対パス解決に使う）
    pub fn new(config: &OfflineConfig, base: Url, backend: C, opener: O, notifier: N) -> Self {
        Self {
            cache: AssetCache::new(backend, config.asset_manifest(), base),
            opener,
            notifier,
            schema: config.queue_schema(),
            coordinator: SyncCoordinator::new(&config.sync_tag, &config.notification_icon),
        }
    }

    pub fn cache(&self) -> &AssetCache<C> {
        &self.cache
    }

    /// install: 失敗時はErrを返してinstallフェーズを失敗させる
    pub async fn on_install<Net: Network>(&self, network: &Net) -> Result<usize> {
        self.cache.install(network).await.map_err(|e| {
            log::error!("Failed to cache one or more resources: {}", e);
            e
        })
    }

    pub async fn on_activate(&self) -> Result<Vec<String>> {
        self.cache.activate().await.map_err(|e| {
            log::error!("Failed to clean up old caches: {}", e);
            e
        })
    }

    pub async fn on_fetch<Net: Network>(&self, request: &AssetRequest, network: &Net) -> Result<ServedResponse> {
        self.cache.respond(request, network).await
    }

    pub async fn on_sync(&self, tag: &str) -> DrainOutcome {
        self.coordinator
            .on_sync(tag, &self.opener, &self.schema, &self.notifier)
            .await
    }
}
