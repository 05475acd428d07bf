use async_trait::async_trait;
use js_sys::{Array, Object, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Cache, CacheStorage, Headers, RequestInit, Response, ResponseInit, WorkerGlobalScope};

use crate::cache::{CacheBackend, Network};
use crate::types::{AssetRequest, AssetResponse};
use crate::error::{CoreError, Result};

fn worker_scope() -> Result<WorkerGlobalScope> {
    js_sys::global()
        .dyn_into::<WorkerGlobalScope>()
        .map_err(|_| CoreError::Other("Not running in a worker context".to_string()))
}

/// Cache Storage実装（Service Worker内の `caches`）
pub struct BrowserCacheStorage {
    caches: CacheStorage,
}

impl BrowserCacheStorage {
    pub fn new(caches: CacheStorage) -> Self {
        Self { caches }
    }

    pub fn from_worker_scope() -> Result<Self> {
        Ok(Self::new(worker_scope()?.caches()?))
    }

    async fn open_cache(&self, name: &str) -> Result<Cache> {
        let cache = JsFuture::from(self.caches.open(name)).await?;
        Ok(cache.unchecked_into::<Cache>())
    }
}

#[async_trait(?Send)]
impl CacheBackend for BrowserCacheStorage {
    async fn open(&self, partition: &str) -> Result<()> {
        self.open_cache(partition).await?;
        Ok(())
    }

    async fn put_all(&self, partition: &str, entries: Vec<(AssetRequest, AssetResponse)>) -> Result<()> {
        let cache = self.open_cache(partition).await?;

        // 上書き前の内容（なければNone）。失敗時はこれに戻す
        let mut previous: Vec<(String, Option<Response>)> = Vec::with_capacity(entries.len());
        for (request, response) in &entries {
            let before = cached_response(&cache, &request.url).await?;
            if let Err(e) = put_one(&cache, request, response).await {
                restore(&cache, &previous).await;
                return Err(CoreError::CacheError(format!("{}: {}", request.url, e)));
            }
            previous.push((request.url.clone(), before));
        }

        Ok(())
    }

    async fn match_request(&self, request: &AssetRequest) -> Result<Option<AssetResponse>> {
        // Cache APIの既定照合はGETのみ
        if !request.is_get() {
            return Ok(None);
        }

        let found = JsFuture::from(self.caches.match_with_str(&request.url)).await?;
        if found.is_undefined() || found.is_null() {
            return Ok(None);
        }

        let response: Response = found.dyn_into()?;
        Ok(Some(from_js_response(response).await?))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let keys = JsFuture::from(self.caches.keys()).await?;
        let keys = Array::from(&keys);
        Ok(keys.iter().filter_map(|k| k.as_string()).collect())
    }

    async fn delete(&self, partition: &str) -> Result<bool> {
        let deleted = JsFuture::from(self.caches.delete(partition)).await?;
        Ok(deleted.as_bool().unwrap_or(false))
    }
}

async fn put_one(cache: &Cache, request: &AssetRequest, response: &AssetResponse) -> Result<()> {
    let js_response = to_js_response(response)?;
    JsFuture::from(cache.put_with_str(&request.url, &js_response)).await?;
    Ok(())
}

async fn cached_response(cache: &Cache, url: &str) -> Result<Option<Response>> {
    let found = JsFuture::from(cache.match_with_str(url)).await?;
    if found.is_undefined() || found.is_null() {
        return Ok(None);
    }
    Ok(Some(found.dyn_into()?))
}

/// 同じ世代名で再installした場合も、稼働中の内容を残す
async fn restore(cache: &Cache, previous: &[(String, Option<Response>)]) {
    for (url, before) in previous.iter().rev() {
        let promise = match before {
            Some(response) => cache.put_with_str(url, response),
            None => cache.delete_with_str(url),
        };
        if let Err(e) = JsFuture::from(promise).await {
            log::warn!("Failed to roll back cache entry {}: {:?}", url, e);
        }
    }
}

/// Worker globalの `fetch` を使うネットワーク
pub struct BrowserNetwork {
    scope: WorkerGlobalScope,
}

impl BrowserNetwork {
    pub fn from_worker_scope() -> Result<Self> {
        Ok(Self { scope: worker_scope()? })
    }
}

#[async_trait(?Send)]
impl Network for BrowserNetwork {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
        let init = RequestInit::new();
        init.set_method(&request.method);

        let promise = self.scope.fetch_with_str_and_init(&request.url, &init);
        let response = JsFuture::from(promise).await.map_err(network_error)?;
        let response: Response = response.dyn_into()?;

        from_js_response(response).await
    }
}

/// fetchのrejectはTypeError
pub fn network_error(value: JsValue) -> CoreError {
    let message = js_sys::Reflect::get(&value, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", value));
    CoreError::NetworkError(message)
}

/// `web_sys::Response` から本文とヘッダーを読み出す
pub async fn from_js_response(response: Response) -> Result<AssetResponse> {
    let status = response.status();

    let mut headers = Vec::new();
    if let Some(entries) = js_sys::try_iter(&response.headers())? {
        for entry in entries {
            let pair = Array::from(&entry?);
            if let (Some(name), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) {
                headers.push((name, value));
            }
        }
    }

    let buffer = JsFuture::from(response.array_buffer()?).await?;
    let body = Uint8Array::new(&buffer).to_vec();

    Ok(AssetResponse {
        status,
        headers,
        body,
    })
}

/// キャッシュ済みレスポンスを `web_sys::Response` に戻す
pub fn to_js_response(response: &AssetResponse) -> Result<Response> {
    let headers = Headers::new()?;
    for (name, value) in &response.headers {
        headers.append(name, value)?;
    }

    let init = ResponseInit::new();
    init.set_status(response.status);
    init.set_headers(&headers);

    let body = Uint8Array::from(response.body.as_slice());
    let body: &Object = body.as_ref();
    Ok(Response::new_with_opt_buffer_source_and_init(Some(body), &init)?)
}
