use crate::cache::AssetManifest;
use crate::storage::QueueSchema;

pub const DB_NAME: &str = "vehicle-clearance-db";
pub const DB_VERSION: u32 = 1;
pub const STORE_NAME: &str = "offline-requests";

/// ページ側の登録とWorker側のディスパッチで完全一致が必要
pub const SYNC_TAG: &str = "sync-clearance-requests";

/// リリースごとに手動で上げる（旧世代はactivateで削除される）
pub const CACHE_NAME: &str = "vehicle-clearance-cache-v1";

/// 自オリジンのリソースのみ。1つでも取得に失敗するとinstall全体が失敗する
pub const PRECACHE_PATHS: &[&str] = &[
    "./",
    "index.html",
    "sw-register.js",
    "car_logo.jpg",
    "userguide.html",
    // sw-register.jsが読み込むwasmバンドル
    "pkg/clearance_web.js",
    "pkg/clearance_web_bg.wasm",
];

pub const WORKER_SCRIPT: &str = "sw.js";

/// GitHub Project Pageのリポジトリ名と一致させること
pub const WORKER_SCOPE: &str = "/vehicle-clearance-/";

pub const NOTIFICATION_ICON: &str = "car_logo.jpg";

/// 実行コンテキスト共通の設定
#[derive(Debug, Clone)]
pub struct OfflineConfig {
    pub db_name: String,
    pub db_version: u32,
    pub store_name: String,
    pub sync_tag: String,
    pub cache_name: String,
    pub precache_paths: Vec<String>,
    pub worker_script: String,
    pub worker_scope: String,
    pub notification_icon: String,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            db_name: DB_NAME.to_string(),
            db_version: DB_VERSION,
            store_name: STORE_NAME.to_string(),
            sync_tag: SYNC_TAG.to_string(),
            cache_name: CACHE_NAME.to_string(),
            precache_paths: PRECACHE_PATHS.iter().map(|p| p.to_string()).collect(),
            worker_script: WORKER_SCRIPT.to_string(),
            worker_scope: WORKER_SCOPE.to_string(),
            notification_icon: NOTIFICATION_ICON.to_string(),
        }
    }
}

impl OfflineConfig {
    pub fn queue_schema(&self) -> QueueSchema {
        QueueSchema::new(&self.db_name, self.db_version, &self.store_name)
    }

    pub fn asset_manifest(&self) -> AssetManifest {
        AssetManifest::new(&self.cache_name, self.precache_paths.clone())
    }
}
