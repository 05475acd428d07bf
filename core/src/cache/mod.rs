pub mod browser;
pub mod mock;

use async_trait::async_trait;
use url::Url;

use crate::error::{CoreError, Result};
use crate::types::{AssetRequest, AssetResponse, CacheSource, ServedResponse};

/// キャッシュ世代名と事前キャッシュ対象パスの組
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    generation: String,
    paths: Vec<String>,
}

impl AssetManifest {
    pub fn new(generation: &str, paths: Vec<String>) -> Self {
        Self {
            generation: generation.to_string(),
            paths,
        }
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// 相対パスをWorkerのスコープURL基準で解決
    pub fn resolve(&self, base: &Url) -> Result<Vec<AssetRequest>> {
        self.paths
            .iter()
            .map(|path| -> Result<AssetRequest> { Ok(AssetRequest::get(base.join(path)?.to_string())) })
            .collect()
    }
}

/// Cache Storage抽象trait
///
/// WASM環境ではシングルスレッドのため、Send + Sync要件なし
#[async_trait(?Send)]
pub trait CacheBackend {
    /// パーティションを開く（なければ作成）
    async fn open(&self, partition: &str) -> Result<()>;

    /// まとめて書き込む。途中で失敗した場合は何も残さない
    async fn put_all(&self, partition: &str, entries: Vec<(AssetRequest, AssetResponse)>) -> Result<()>;

    /// 全パーティションから method + URL の完全一致を探す
    async fn match_request(&self, request: &AssetRequest) -> Result<Option<AssetResponse>>;

    /// パーティション名一覧
    async fn keys(&self) -> Result<Vec<String>>;

    async fn delete(&self, partition: &str) -> Result<bool>;
}

/// ネットワーク取得
#[async_trait(?Send)]
pub trait Network {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse>;
}

/// 静的アセットキャッシュ（install / activate / fetch の3フェーズ）
pub struct AssetCache<C: CacheBackend> {
    backend: C,
    manifest: AssetManifest,
    base: Url,
}

impl<C: CacheBackend> AssetCache<C> {
    pub fn new(backend: C, manifest: AssetManifest, base: Url) -> Self {
        Self {
            backend,
            manifest,
            base,
        }
    }

    /// install: 固定リストを全件取得して現世代のパーティションに保存する
    ///
    /// 1件でも失敗すればフェーズ全体が失敗する。
    pub async fn install<N: Network>(&self, network: &N) -> Result<usize> {
        let generation = self.manifest.generation();
        let requests = self
            .manifest
            .resolve(&self.base)
            .map_err(|e| CoreError::CacheInstallError(e.to_string()))?;

        self.backend
            .open(generation)
            .await
            .map_err(|e| CoreError::CacheInstallError(e.to_string()))?;
        log::info!("Opened cache {}", generation);

        let mut entries = Vec::with_capacity(requests.len());
        for request in requests {
            let response = network.fetch(&request).await.map_err(|e| {
                CoreError::CacheInstallError(format!("{}: {}", request.url, e))
            })?;
            if !response.is_ok() {
                return Err(CoreError::CacheInstallError(format!(
                    "{}: HTTP {}",
                    request.url, response.status
                )));
            }
            entries.push((request, response));
        }

        let count = entries.len();
        self.backend
            .put_all(generation, entries)
            .await
            .map_err(|e| CoreError::CacheInstallError(e.to_string()))?;

        log::info!("Cached {} resources into {}", count, generation);
        Ok(count)
    }

    /// activate: 現世代以外のパーティションをすべて削除する
    pub async fn activate(&self) -> Result<Vec<String>> {
        let current = self.manifest.generation();
        let mut deleted = Vec::new();

        for name in self.backend.keys().await? {
            if name != current && self.backend.delete(&name).await? {
                log::info!("Deleted stale cache {}", name);
                deleted.push(name);
            }
        }

        Ok(deleted)
    }

    /// キャッシュのみを照合する（GET以外は常にミス）
    pub async fn lookup(&self, request: &AssetRequest) -> Result<Option<AssetResponse>> {
        if !request.is_get() {
            return Ok(None);
        }
        self.backend.match_request(request).await
    }

    /// fetch: キャッシュヒットならそれを返し、なければネットワークへ
    ///
    /// ネットワーク取得結果はキャッシュに保存しない。
    pub async fn respond<N: Network>(&self, request: &AssetRequest, network: &N) -> Result<ServedResponse> {
        if let Some(response) = self.lookup(request).await? {
            return Ok(ServedResponse {
                response,
                source: CacheSource::Cache,
            });
        }

        let response = network.fetch(request).await?;
        Ok(ServedResponse {
            response,
            source: CacheSource::Network,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::mock::{MockCacheStorage, MockNetwork};

    const BASE: &str = "https://example.github.io/vehicle-clearance-/";

    fn manifest(generation: &str) -> AssetManifest {
        AssetManifest::new(
            generation,
            vec!["./".to_string(), "index.html".to_string(), "car_logo.jpg".to_string()],
        )
    }

    fn network() -> MockNetwork {
        let network = MockNetwork::new();
        network.serve(BASE, AssetResponse::ok("<html>shell</html>"));
        network.serve(
            &format!("{}index.html", BASE),
            AssetResponse::ok("<html>index</html>").with_header("content-type", "text/html"),
        );
        network.serve(&format!("{}car_logo.jpg", BASE), AssetResponse::ok(vec![0xff, 0xd8, 0xff]));
        network
    }

    fn cache(storage: MockCacheStorage, generation: &str) -> AssetCache<MockCacheStorage> {
        AssetCache::new(storage, manifest(generation), Url::parse(BASE).unwrap())
    }

    #[test]
    fn test_manifest_resolves_relative_paths() {
        let requests = manifest("v1").resolve(&Url::parse(BASE).unwrap()).unwrap();
        let urls: Vec<_> = requests.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                BASE,
                "https://example.github.io/vehicle-clearance-/index.html",
                "https://example.github.io/vehicle-clearance-/car_logo.jpg",
            ]
        );
        assert!(requests.iter().all(|r| r.is_get()));
    }

    #[tokio::test]
    async fn test_install_caches_every_path_byte_identical() {
        let network = network();
        let cache = cache(MockCacheStorage::new(), "v1");

        let count = cache.install(&network).await.unwrap();
        assert_eq!(count, 3);

        network.set_online(false);
        for request in manifest("v1").resolve(&Url::parse(BASE).unwrap()).unwrap() {
            let served = cache.respond(&request, &network).await.unwrap();
            assert_eq!(served.source, CacheSource::Cache);
            assert_eq!(served.response, network.resource(&request.url).unwrap());
        }
    }

    #[tokio::test]
    async fn test_install_fails_when_any_path_is_missing() {
        let network = network();
        let storage = MockCacheStorage::new();
        let cache = AssetCache::new(
            storage.clone(),
            AssetManifest::new("v1", vec!["index.html".to_string(), "typo.html".to_string()]),
            Url::parse(BASE).unwrap(),
        );

        let result = cache.install(&network).await;
        assert!(matches!(result, Err(CoreError::CacheInstallError(_))));

        let index = AssetRequest::get(format!("{}index.html", BASE));
        assert_eq!(storage.entry_count("v1"), 0);
        assert!(storage.match_request(&index).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_install_write_failure_leaves_no_entries() {
        let network = network();
        let storage = MockCacheStorage::new();
        storage.set_fail_puts(true);
        let cache = cache(storage.clone(), "v1");

        assert!(matches!(
            cache.install(&network).await,
            Err(CoreError::CacheInstallError(_))
        ));
        assert_eq!(storage.entry_count("v1"), 0);
    }

    #[tokio::test]
    async fn test_install_fails_offline() {
        let network = network();
        network.set_online(false);
        let cache = cache(MockCacheStorage::new(), "v1");

        assert!(matches!(
            cache.install(&network).await,
            Err(CoreError::CacheInstallError(_))
        ));
    }

    #[tokio::test]
    async fn test_activate_removes_previous_generations() {
        let network = network();
        let storage = MockCacheStorage::new();

        cache(storage.clone(), "v1").install(&network).await.unwrap();
        let v2 = cache(storage.clone(), "v2");
        v2.install(&network).await.unwrap();

        let deleted = v2.activate().await.unwrap();
        assert_eq!(deleted, vec!["v1".to_string()]);
        assert_eq!(storage.keys().await.unwrap(), vec!["v2".to_string()]);

        // 2回目は何も消さない
        assert!(v2.activate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_uncached_path_goes_to_network_without_populating() {
        let network = network();
        network.serve(&format!("{}api/status", BASE), AssetResponse::ok("up"));
        let storage = MockCacheStorage::new();
        let cache = cache(storage.clone(), "v1");
        cache.install(&network).await.unwrap();

        let request = AssetRequest::get(format!("{}api/status", BASE));
        let served = cache.respond(&request, &network).await.unwrap();
        assert_eq!(served.source, CacheSource::Network);
        assert_eq!(storage.entry_count("v1"), 3);

        network.set_online(false);
        let result = cache.respond(&request, &network).await;
        assert!(matches!(result, Err(CoreError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_non_get_bypasses_cache() {
        let network = network();
        let cache = cache(MockCacheStorage::new(), "v1");
        cache.install(&network).await.unwrap();

        let request = AssetRequest::new("POST", format!("{}index.html", BASE));
        let served = cache.respond(&request, &network).await.unwrap();
        assert_eq!(served.source, CacheSource::Network);
    }
}
