pub mod indexeddb;
pub mod mock;

use async_trait::async_trait;
use crate::error::Result;
use crate::types::QueuedRequest;

/// 送信キューのデータベース識別子（名前 + バージョン + ストア名）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSchema {
    pub db_name: String,
    pub version: u32,
    pub store_name: String,
}

impl QueueSchema {
    pub fn new(db_name: &str, version: u32, store_name: &str) -> Self {
        Self {
            db_name: db_name.to_string(),
            version,
            store_name: store_name.to_string(),
        }
    }
}

/// 送信キュー抽象trait
///
/// ページとWorkerはメモリを共有できないため、このストアが唯一の受け渡し経路になる。
/// WASM環境ではシングルスレッドのため、Send + Sync要件なし
#[async_trait(?Send)]
pub trait QueueStore {
    /// 末尾に追加（idはストアが採番）
    async fn append(&self, item: &QueuedRequest) -> Result<()>;

    /// 全件を挿入順で取得
    async fn read_all(&self) -> Result<Vec<QueuedRequest>>;

    /// 全件削除（冪等）
    async fn clear_all(&self) -> Result<()>;
}

/// キューを開くためのハンドル
///
/// バージョンが上がっていればアップグレード処理でストアを作成してから返す。
#[async_trait(?Send)]
pub trait QueueOpener {
    type Store: QueueStore;

    async fn open(&self, schema: &QueueSchema) -> Result<Self::Store>;
}
