use async_trait::async_trait;
use rexie::*;
use serde::Serialize;
use serde_wasm_bindgen::Serializer;

use crate::storage::{QueueOpener, QueueSchema, QueueStore};
use crate::types::QueuedRequest;
use crate::error::{CoreError, Result};

/// IndexedDBを開くハンドル
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedDbOpener;

#[async_trait(?Send)]
impl QueueOpener for IndexedDbOpener {
    type Store = IndexedDbQueueStore;

    async fn open(&self, schema: &QueueSchema) -> Result<IndexedDbQueueStore> {
        IndexedDbQueueStore::open(schema).await
    }
}

/// IndexedDB実装
pub struct IndexedDbQueueStore {
    db: Rexie,
    store_name: String,
}

impl IndexedDbQueueStore {
    pub async fn open(schema: &QueueSchema) -> Result<Self> {
        let db = Self::open_db(schema).await?;
        log::debug!("Opened {} v{}", schema.db_name, schema.version);
        Ok(Self {
            db,
            store_name: schema.store_name.clone(),
        })
    }

    /// バージョンが上がっていればupgradeneededでストアを作成
    async fn open_db(schema: &QueueSchema) -> Result<Rexie> {
        let rexie = Rexie::builder(&schema.db_name)
            .version(schema.version)
            .add_object_store(
                ObjectStore::new(&schema.store_name)
                    .key_path("id")
                    .auto_increment(true),
            )
            .build()
            .await?;

        Ok(rexie)
    }
}

#[async_trait(?Send)]
impl QueueStore for IndexedDbQueueStore {
    async fn append(&self, item: &QueuedRequest) -> Result<()> {
        let tx = self.db.transaction(&[self.store_name.as_str()], TransactionMode::ReadWrite)?;
        let store = tx.store(&self.store_name)?;

        // keyPathを効かせるため文字列ではなくプレーンなオブジェクトとして保存
        let js_value = item.serialize(&Serializer::json_compatible())?;

        store.add(&js_value, None).await?;
        tx.done().await?;

        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<QueuedRequest>> {
        let tx = self.db.transaction(&[self.store_name.as_str()], TransactionMode::ReadOnly)?;
        let store = tx.store(&self.store_name)?;

        // キー（自動採番id）昇順 = 挿入順
        let all = store.get_all(None, None).await?;

        let records = all
            .into_iter()
            .map(serde_wasm_bindgen::from_value::<serde_json::Value>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        decode_records(records)
    }

    async fn clear_all(&self) -> Result<()> {
        let tx = self.db.transaction(&[self.store_name.as_str()], TransactionMode::ReadWrite)?;
        let store = tx.store(&self.store_name)?;

        store.clear().await?;
        tx.done().await?;

        Ok(())
    }
}

/// 保存済みレコードを復元する
///
/// 1件でも読めなければエラー（clearで読めない分まで消さないため）。
fn decode_records(records: Vec<serde_json::Value>) -> Result<Vec<QueuedRequest>> {
    records
        .into_iter()
        .map(|record| {
            serde_json::from_value::<QueuedRequest>(record)
                .map_err(|e| CoreError::StoreError(format!("malformed queued request: {}", e)))
        })
        .collect()
}
