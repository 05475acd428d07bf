use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::storage::{QueueOpener, QueueSchema, QueueStore};
use crate::types::QueuedRequest;
use crate::error::{CoreError, Result};

/// 失敗を注入できる操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Open,
    Append,
    ReadAll,
    ClearAll,
}

#[derive(Default)]
struct MockCollection {
    records: BTreeMap<u64, QueuedRequest>,
    // clearしてもリセットされない（IndexedDBのキージェネレータと同じ）
    next_id: u64,
}

#[derive(Default)]
struct MockDatabase {
    version: u32,
    stores: HashMap<String, MockCollection>,
    upgrades: u32,
}

#[derive(Default)]
struct MockState {
    databases: HashMap<String, MockDatabase>,
    failures: HashSet<MockOp>,
}

/// アップグレード中のデータベース
pub struct UpgradeContext {
    old_version: u32,
    existing: HashSet<String>,
    created: Vec<String>,
}

impl UpgradeContext {
    pub fn old_version(&self) -> u32 {
        self.old_version
    }

    pub fn contains_store(&self, name: &str) -> bool {
        self.existing.contains(name) || self.created.iter().any(|n| n == name)
    }

    pub fn create_store(&mut self, name: &str) {
        if !self.contains_store(name) {
            self.created.push(name.to_string());
        }
    }
}

/// テスト用のモック永続ストレージ
///
/// クローンしたハンドル同士は同じデータベース群を共有する（ページとWorkerの関係）。
#[derive(Clone, Default)]
pub struct MockDatabases {
    state: Arc<Mutex<MockState>>,
}

impl MockDatabases {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降の操作を失敗させる
    pub fn fail(&self, op: MockOp) {
        self.state.lock().unwrap().failures.insert(op);
    }

    pub fn recover(&self, op: MockOp) {
        self.state.lock().unwrap().failures.remove(&op);
    }

    pub fn version(&self, db_name: &str) -> Option<u32> {
        self.state.lock().unwrap().databases.get(db_name).map(|db| db.version)
    }

    pub fn upgrade_count(&self, db_name: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .databases
            .get(db_name)
            .map(|db| db.upgrades)
            .unwrap_or(0)
    }

    /// `indexedDB.open(name, version)` 相当
    ///
    /// 要求バージョンが保存済みより高い場合のみ `on_upgrade` を1回呼ぶ。
    pub fn open_with_upgrade(
        &self,
        schema: &QueueSchema,
        on_upgrade: Option<&dyn Fn(&mut UpgradeContext)>,
    ) -> Result<MockQueueStore> {
        let mut state = self.state.lock().unwrap();
        if state.failures.contains(&MockOp::Open) {
            return Err(CoreError::StoreError(format!(
                "access to {} denied",
                schema.db_name
            )));
        }

        let db = state.databases.entry(schema.db_name.clone()).or_default();
        if schema.version < db.version {
            return Err(CoreError::StoreError(format!(
                "VersionError: requested v{} is lower than existing v{}",
                schema.version, db.version
            )));
        }

        if schema.version > db.version {
            let old_version = db.version;
            if let Some(upgrade) = on_upgrade {
                let mut ctx = UpgradeContext {
                    old_version,
                    existing: db.stores.keys().cloned().collect(),
                    created: Vec::new(),
                };
                upgrade(&mut ctx);
                for name in ctx.created {
                    db.stores.insert(
                        name,
                        MockCollection {
                            records: BTreeMap::new(),
                            next_id: 1,
                        },
                    );
                }
            }
            db.version = schema.version;
            db.upgrades += 1;
        }

        Ok(MockQueueStore {
            state: self.state.clone(),
            db_name: schema.db_name.clone(),
            store_name: schema.store_name.clone(),
        })
    }

    fn check(state: &MockState, op: MockOp) -> Result<()> {
        if state.failures.contains(&op) {
            return Err(CoreError::StoreError(format!("{:?} transaction aborted", op)));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl QueueOpener for MockDatabases {
    type Store = MockQueueStore;

    async fn open(&self, schema: &QueueSchema) -> Result<MockQueueStore> {
        let store_name = schema.store_name.clone();
        self.open_with_upgrade(
            schema,
            Some(&move |ctx: &mut UpgradeContext| {
                if !ctx.contains_store(&store_name) {
                    ctx.create_store(&store_name);
                }
            }),
        )
    }
}

/// テスト用のモックキュー
pub struct MockQueueStore {
    state: Arc<Mutex<MockState>>,
    db_name: String,
    store_name: String,
}

impl MockQueueStore {
    fn with_collection<T>(
        &self,
        op: MockOp,
        f: impl FnOnce(&mut MockCollection) -> T,
    ) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        MockDatabases::check(&state, op)?;

        let collection = state
            .databases
            .get_mut(&self.db_name)
            .and_then(|db| db.stores.get_mut(&self.store_name))
            .ok_or_else(|| {
                CoreError::StoreError(format!(
                    "NotFoundError: object store {} does not exist",
                    self.store_name
                ))
            })?;

        Ok(f(collection))
    }
}

#[async_trait(?Send)]
impl QueueStore for MockQueueStore {
    async fn append(&self, item: &QueuedRequest) -> Result<()> {
        self.with_collection(MockOp::Append, |collection| {
            let id = collection.next_id;
            collection.next_id += 1;

            let mut stored = item.clone();
            stored.id = Some(id);
            collection.records.insert(id, stored);
        })
    }

    async fn read_all(&self) -> Result<Vec<QueuedRequest>> {
        self.with_collection(MockOp::ReadAll, |collection| {
            collection.records.values().cloned().collect()
        })
    }

    async fn clear_all(&self) -> Result<()> {
        self.with_collection(MockOp::ClearAll, |collection| {
            collection.records.clear();
        })
    }
}
