// src/engine/table.rs

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::keyspace::{DbId, Keyspace};

/// 进程级的数据库表：编号 -> Keyspace
///
/// 数据库在第一次被引用时创建，0 号库启动即存在，进程退出前不会销毁。
pub struct DatabaseTable {
    dbs: DashMap<DbId, Arc<Keyspace>>,
}

impl DatabaseTable {
    pub fn new() -> Self {
        let dbs = DashMap::new();
        dbs.insert(0, Arc::new(Keyspace::new(0)));
        DatabaseTable { dbs }
    }

    /// 取出指定编号的库，不存在则创建
    pub fn get_or_create(&self, id: DbId) -> Arc<Keyspace> {
        if let Some(ks) = self.dbs.get(&id) {
            return Arc::clone(ks.value());
        }
        let entry = self.dbs.entry(id).or_insert_with(|| {
            info!(db = id, "creating database");
            Arc::new(Keyspace::new(id))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, id: DbId) -> Option<Arc<Keyspace>> {
        self.dbs.get(&id).map(|ks| Arc::clone(ks.value()))
    }

    /// 所有已创建的库，按编号排序
    pub fn keyspaces(&self) -> Vec<Arc<Keyspace>> {
        let mut all: Vec<Arc<Keyspace>> = self.dbs.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by_key(|ks| ks.id());
        all
    }

    pub fn len(&self) -> usize {
        self.dbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dbs.is_empty()
    }
}

impl Default for DatabaseTable {
    fn default() -> Self {
        Self::new()
    }
}
