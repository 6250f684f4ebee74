// src/engine/mod.rs

//! # 引擎模块
//!
//! `engine` 是整个存储的核心。它：
//! - 持有进程级的 `DatabaseTable`（编号 -> `Keyspace`）。
//! - 通过 `Engine` 对外提供带类型的操作，所有操作都作用于调用方 `Session` 当前选中的库。
//! - 把具体逻辑委托给 `types::{string, list}` 和 `expire` 模块。
//! - `command` 子模块负责把文本命令分发到这些操作上。
//!
//! 每个写操作都在 key 所在分片的锁内完成“过期检查 + 修改”，要么整体生效，要么不生效。
pub mod command;
pub mod keyspace;
pub mod table;

pub use keyspace::{DbId, Entry, Keyspace, Value};
pub use table::DatabaseTable;

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::expire::{self, Expiry, Ttl, now_ms};
use crate::session::Session;
use crate::types::{list, string};

fn check_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        Err(StoreError::invalid("empty key"))
    } else {
        Ok(())
    }
}

/// 命令分发器
pub struct Engine {
    table: DatabaseTable,
}

impl Engine {
    pub fn new() -> Self {
        Engine { table: DatabaseTable::new() }
    }

    pub fn table(&self) -> &DatabaseTable {
        &self.table
    }

    fn keyspace(&self, session: &Session) -> Arc<Keyspace> {
        self.table.get_or_create(session.db())
    }

    /// 切换会话当前的库，库不存在则创建
    pub fn select(&self, session: &mut Session, db: DbId) {
        self.table.get_or_create(db);
        session.select(db);
        debug!(session = session.id(), db, "select");
    }

    // --- 标量 ---

    pub fn get(&self, session: &Session, key: &Bytes) -> Result<Option<Bytes>> {
        check_key(key)?;
        string::get(&self.keyspace(session), key, now_ms())
    }

    pub fn set(&self, session: &Session, key: &Bytes, value: Bytes) -> Result<()> {
        check_key(key)?;
        string::set(&self.keyspace(session), key, value, now_ms());
        Ok(())
    }

    /// 返回删除前 key 是否存在
    pub fn delete(&self, session: &Session, key: &Bytes) -> Result<bool> {
        check_key(key)?;
        Ok(string::del(&self.keyspace(session), key, now_ms()))
    }

    /// 删除多个 key，返回实际删除的个数；任一 key 非法时一个都不删
    pub fn delete_many(&self, session: &Session, keys: &[Bytes]) -> Result<usize> {
        for key in keys {
            check_key(key)?;
        }
        let ks = self.keyspace(session);
        let now = now_ms();
        Ok(keys.iter().filter(|key| string::del(&ks, key, now)).count())
    }

    pub fn exists(&self, session: &Session, key: &Bytes) -> Result<bool> {
        check_key(key)?;
        Ok(string::exists(&self.keyspace(session), key, now_ms()))
    }

    pub fn incr(&self, session: &Session, key: &Bytes) -> Result<i64> {
        check_key(key)?;
        string::incr(&self.keyspace(session), key, now_ms())
    }

    pub fn decr(&self, session: &Session, key: &Bytes) -> Result<i64> {
        check_key(key)?;
        string::decr(&self.keyspace(session), key, now_ms())
    }

    /// 结果与 `keys` 一一对应，不存在的位置为 `None`
    pub fn mget(&self, session: &Session, keys: &[Bytes]) -> Result<Vec<Option<Bytes>>> {
        for key in keys {
            check_key(key)?;
        }
        Ok(string::mget(&self.keyspace(session), keys, now_ms()))
    }

    // --- 列表 ---

    pub fn lpush(&self, session: &Session, key: &Bytes, element: Bytes) -> Result<usize> {
        check_key(key)?;
        list::lpush(&self.keyspace(session), key, element, now_ms())
    }

    pub fn rpush(&self, session: &Session, key: &Bytes, element: Bytes) -> Result<usize> {
        check_key(key)?;
        list::rpush(&self.keyspace(session), key, element, now_ms())
    }

    pub fn lpop(&self, session: &Session, key: &Bytes) -> Result<Option<Bytes>> {
        check_key(key)?;
        list::lpop(&self.keyspace(session), key, now_ms())
    }

    pub fn rpop(&self, session: &Session, key: &Bytes) -> Result<Option<Bytes>> {
        check_key(key)?;
        list::rpop(&self.keyspace(session), key, now_ms())
    }

    pub fn lrange(&self, session: &Session, key: &Bytes, start: i64, stop: i64) -> Result<Vec<Bytes>> {
        check_key(key)?;
        list::lrange(&self.keyspace(session), key, start, stop, now_ms())
    }

    pub fn llen(&self, session: &Session, key: &Bytes) -> Result<usize> {
        check_key(key)?;
        list::llen(&self.keyspace(session), key, now_ms())
    }

    // --- key 空间 ---

    /// 源 key 不存在时返回 `KeyNotFound`；目标已存在则被覆盖
    pub fn rename(&self, session: &Session, from: &Bytes, to: &Bytes) -> Result<()> {
        check_key(from)?;
        check_key(to)?;
        self.keyspace(session).rename(from, to, true, now_ms())?;
        Ok(())
    }

    /// 目标已存在时返回 `false`，两个 key 都保持不变
    pub fn renamenx(&self, session: &Session, from: &Bytes, to: &Bytes) -> Result<bool> {
        check_key(from)?;
        check_key(to)?;
        self.keyspace(session).rename(from, to, false, now_ms())
    }

    pub fn dbsize(&self, session: &Session) -> usize {
        self.keyspace(session).len(now_ms())
    }

    // --- 过期 ---

    /// key 不存在时不做任何事，返回 `false`
    pub fn expire(&self, session: &Session, key: &Bytes, when: Expiry) -> Result<bool> {
        check_key(key)?;
        let now = now_ms();
        let deadline = when.deadline(now)?;
        Ok(expire::expire_at(&self.keyspace(session), key, deadline, now))
    }

    pub fn ttl(&self, session: &Session, key: &Bytes) -> Result<Ttl> {
        check_key(key)?;
        Ok(expire::ttl(&self.keyspace(session), key, now_ms()))
    }

    pub fn persist(&self, session: &Session, key: &Bytes) -> Result<bool> {
        check_key(key)?;
        Ok(expire::persist(&self.keyspace(session), key, now_ms()))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
