use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::cache::{CacheBackend, Network};
use crate::types::{AssetRequest, AssetResponse};
use crate::error::{CoreError, Result};

type Partition = BTreeMap<AssetRequest, AssetResponse>;

/// テスト用のモックCache Storage
///
/// パーティションは作成順に保持する（`caches.keys()` と同じ）。
#[derive(Clone, Default)]
pub struct MockCacheStorage {
    partitions: Arc<Mutex<Vec<(String, Partition)>>>,
    fail_puts: Arc<Mutex<bool>>,
}

impl MockCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// put_allを失敗させる（容量超過など）
    pub fn set_fail_puts(&self, fail: bool) {
        *self.fail_puts.lock().unwrap() = fail;
    }

    pub fn entry_count(&self, partition: &str) -> usize {
        self.partitions
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == partition)
            .map(|(_, entries)| entries.len())
            .unwrap_or(0)
    }
}

#[async_trait(?Send)]
impl CacheBackend for MockCacheStorage {
    async fn open(&self, partition: &str) -> Result<()> {
        let mut partitions = self.partitions.lock().unwrap();
        if !partitions.iter().any(|(name, _)| name == partition) {
            partitions.push((partition.to_string(), Partition::new()));
        }
        Ok(())
    }

    async fn put_all(&self, partition: &str, entries: Vec<(AssetRequest, AssetResponse)>) -> Result<()> {
        if *self.fail_puts.lock().unwrap() {
            return Err(CoreError::CacheError("QuotaExceededError".to_string()));
        }

        let mut partitions = self.partitions.lock().unwrap();
        let target = partitions
            .iter_mut()
            .find(|(name, _)| name == partition)
            .ok_or_else(|| CoreError::CacheError(format!("cache {} is not open", partition)))?;
        target.1.extend(entries);
        Ok(())
    }

    async fn match_request(&self, request: &AssetRequest) -> Result<Option<AssetResponse>> {
        let partitions = self.partitions.lock().unwrap();
        Ok(partitions
            .iter()
            .find_map(|(_, entries)| entries.get(request).cloned()))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let partitions = self.partitions.lock().unwrap();
        Ok(partitions.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn delete(&self, partition: &str) -> Result<bool> {
        let mut partitions = self.partitions.lock().unwrap();
        let before = partitions.len();
        partitions.retain(|(name, _)| name != partition);
        Ok(partitions.len() != before)
    }
}

/// テスト用のモックネットワーク
#[derive(Clone)]
pub struct MockNetwork {
    resources: Arc<Mutex<HashMap<String, AssetResponse>>>,
    online: Arc<Mutex<bool>>,
    requests: Arc<Mutex<Vec<AssetRequest>>>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            resources: Arc::new(Mutex::new(HashMap::new())),
            online: Arc::new(Mutex::new(true)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn serve(&self, url: &str, response: AssetResponse) {
        self.resources.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn resource(&self, url: &str) -> Option<AssetResponse> {
        self.resources.lock().unwrap().get(url).cloned()
    }

    pub fn set_online(&self, online: bool) {
        *self.online.lock().unwrap() = online;
    }

    /// 実際にネットワークへ出たリクエスト（オフライン時の失敗も含む）
    pub fn requests(&self) -> Vec<AssetRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait(?Send)]
impl Network for MockNetwork {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
        self.requests.lock().unwrap().push(request.clone());

        if !*self.online.lock().unwrap() {
            return Err(CoreError::NetworkError("Failed to fetch".to_string()));
        }

        Ok(self
            .resource(&request.url)
            .unwrap_or_else(|| AssetResponse::with_status(404)))
    }
}
