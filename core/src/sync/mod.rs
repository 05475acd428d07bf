pub mod browser;
pub mod mock;

use async_trait::async_trait;
use std::cell::Cell;

use crate::error::{CoreError, Result};
use crate::storage::{QueueOpener, QueueSchema, QueueStore};
use crate::types::{DrainOutcome, Notification, SyncState};

/// Service Worker / Background Sync のプラットフォーム機能
#[async_trait(?Send)]
pub trait SyncPlatform {
    fn has_service_worker(&self) -> bool;

    fn has_background_sync(&self) -> bool;

    /// Workerスクリプトを登録し、確定したスコープを返す
    async fn register_worker(&self, script_url: &str, scope: &str) -> Result<String>;

    /// Sync Intentを登録（発火タイミングはプラットフォーム任せ）
    async fn register_sync(&self, tag: &str) -> Result<()>;
}

/// ユーザー通知
#[async_trait(?Send)]
pub trait Notifier {
    async fn show(&self, notification: &Notification) -> Result<()>;
}

/// ページ読み込み時のWorker登録
pub async fn register_service_worker<P: SyncPlatform>(
    platform: &P,
    script_url: &str,
    scope: &str,
) -> Result<String> {
    if !platform.has_service_worker() {
        return Err(CoreError::RegistrationError(
            "Service Worker is not supported".to_string(),
        ));
    }

    let registered = platform
        .register_worker(script_url, scope)
        .await
        .map_err(|e| CoreError::RegistrationError(e.to_string()))?;
    log::info!("Service Worker registered successfully with scope: {}", registered);
    Ok(registered)
}

/// Sync Coordinator
///
/// Idle → Registered（ページ側で登録）→ Draining（Worker側でsync発火）→ Idle。
/// 実行コンテキストごとに1つ持つ。
pub struct SyncCoordinator {
    tag: String,
    icon: String,
    state: Cell<SyncState>,
}

impl SyncCoordinator {
    pub fn new(tag: &str, icon: &str) -> Self {
        Self {
            tag: tag.to_string(),
            icon: icon.to_string(),
            state: Cell::new(SyncState::Idle),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn state(&self) -> SyncState {
        self.state.get()
    }

    /// Sync Intentを登録する
    ///
    /// Service WorkerとSyncManagerの両方がなければ登録しない。
    pub async fn register<P: SyncPlatform>(&self, platform: &P) -> Result<()> {
        if !platform.has_service_worker() || !platform.has_background_sync() {
            log::warn!("Background Sync is not supported.");
            return Err(CoreError::RegistrationError(
                "Background Sync is not supported".to_string(),
            ));
        }

        platform
            .register_sync(&self.tag)
            .await
            .map_err(|e| CoreError::RegistrationError(e.to_string()))?;

        self.state.set(SyncState::Registered);
        log::info!("Background sync registered.");
        Ok(())
    }

    /// syncイベントのエントリーポイント（プラットフォームから呼ばれる）
    ///
    /// エラーは呼び出し元に返さず、失敗通知に変換する。再登録もしない。
    pub async fn on_sync<O, N>(
        &self,
        tag: &str,
        opener: &O,
        schema: &QueueSchema,
        notifier: &N,
    ) -> DrainOutcome
    where
        O: QueueOpener,
        N: Notifier,
    {
        if tag != self.tag {
            log::debug!("Ignoring sync event with tag {}", tag);
            return DrainOutcome::Ignored;
        }

        self.state.set(SyncState::Draining);

        let outcome = match self.drain(opener, schema).await {
            Ok(0) => DrainOutcome::Empty,
            Ok(count) => {
                self.notify(notifier, &Notification::sync_complete(count, &self.icon)).await;
                DrainOutcome::Drained { count }
            }
            Err(e) => {
                log::error!("Sync failed: {}", e);
                self.notify(notifier, &Notification::sync_failed(&self.icon)).await;
                DrainOutcome::Failed { reason: e.to_string() }
            }
        };

        self.state.set(SyncState::Idle);
        outcome
    }

    /// 全件読み出し → 全件削除。途中で失敗したらキューはそのまま
    async fn drain<O: QueueOpener>(&self, opener: &O, schema: &QueueSchema) -> Result<usize> {
        let store = opener.open(schema).await.map_err(drain_error)?;
        let items = store.read_all().await.map_err(drain_error)?;
        if items.is_empty() {
            return Ok(0);
        }

        // TODO: 送信先エンドポイントが決まったら、ここでclear前に送信する
        log::warn!(
            "Discarding {} queued requests: no upload endpoint is configured",
            items.len()
        );
        store.clear_all().await.map_err(drain_error)?;

        Ok(items.len())
    }

    async fn notify<N: Notifier>(&self, notifier: &N, notification: &Notification) {
        if let Err(e) = notifier.show(notification).await {
            log::error!("Failed to show notification {:?}: {}", notification.title, e);
        }
    }
}

fn drain_error(error: CoreError) -> CoreError {
    CoreError::SyncDrainError(error.to_string())
}
