use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::sync::{Notifier, SyncPlatform};
use crate::types::Notification;
use crate::error::{CoreError, Result};

/// テスト用のモックプラットフォーム
#[derive(Clone)]
pub struct MockSyncPlatform {
    service_worker: bool,
    background_sync: bool,
    refuse: Arc<Mutex<bool>>,
    tags: Arc<Mutex<Vec<String>>>,
    workers: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockSyncPlatform {
    fn with_capabilities(service_worker: bool, background_sync: bool) -> Self {
        Self {
            service_worker,
            background_sync,
            refuse: Arc::new(Mutex::new(false)),
            tags: Arc::new(Mutex::new(Vec::new())),
            workers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn supported() -> Self {
        Self::with_capabilities(true, true)
    }

    pub fn without_background_sync() -> Self {
        Self::with_capabilities(true, false)
    }

    pub fn without_service_worker() -> Self {
        Self::with_capabilities(false, true)
    }

    /// 登録要求を拒否させる
    pub fn set_refuse(&self, refuse: bool) {
        *self.refuse.lock().unwrap() = refuse;
    }

    pub fn registered_tags(&self) -> Vec<String> {
        self.tags.lock().unwrap().clone()
    }

    pub fn registered_workers(&self) -> Vec<(String, String)> {
        self.workers.lock().unwrap().clone()
    }
}

#[async_trait(?Send)]
impl SyncPlatform for MockSyncPlatform {
    fn has_service_worker(&self) -> bool {
        self.service_worker
    }

    fn has_background_sync(&self) -> bool {
        self.background_sync
    }

    async fn register_worker(&self, script_url: &str, scope: &str) -> Result<String> {
        if *self.refuse.lock().unwrap() {
            return Err(CoreError::JsError("SecurityError: scope not allowed".to_string()));
        }
        self.workers
            .lock()
            .unwrap()
            .push((script_url.to_string(), scope.to_string()));
        Ok(scope.to_string())
    }

    async fn register_sync(&self, tag: &str) -> Result<()> {
        if *self.refuse.lock().unwrap() {
            return Err(CoreError::JsError("NotAllowedError: permission denied".to_string()));
        }
        let mut tags = self.tags.lock().unwrap();
        // 同じタグの再登録はまとめられる
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
        Ok(())
    }
}

/// テスト用のモック通知
#[derive(Clone, Default)]
pub struct MockNotifier {
    shown: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 通知権限がない状態
    pub fn failing() -> Self {
        Self {
            shown: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait(?Send)]
impl Notifier for MockNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
        if self.fail {
            return Err(CoreError::JsError("TypeError: no notification permission".to_string()));
        }
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
