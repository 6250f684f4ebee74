// src/session.rs

use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::keyspace::DbId;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// 保存单个连接的状态：当前选中的数据库
///
/// 每个调用方各持一份，`select` 只影响自己，不影响其他并发会话。
#[derive(Debug)]
pub struct Session {
    id: u64,
    db: DbId,
}

impl Session {
    pub fn new() -> Self {
        Session {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            db: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn db(&self) -> DbId {
        self.db
    }

    pub fn select(&mut self, db: DbId) {
        self.db = db;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
