// src/expire.rs

//! 过期策略
//!
//! 过期时间一律以绝对 unix 毫秒存放在 key 自己的 `Entry` 中，key 被删除或覆盖时随之消失。
//! - 惰性过期：每次访问都在 key 所在分片的锁内先检查（见 `Keyspace::read/update`）
//! - 主动过期：`start_cleaner` 周期性地按批次清理，批次之间让出调度

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use crate::engine::Engine;
use crate::engine::keyspace::{Entry, Keyspace};
use crate::error::{Result, StoreError};

/// 单个库在一次清理周期内最多连续跑几批
const MAX_ROUNDS: usize = 16;

/// 返回当前的 UNIX 毫秒
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Expiry argument accepted by [`Engine::expire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Relative to the moment the command runs.
    After(Duration),
    /// Absolute unix time in milliseconds.
    At(u64),
}

impl Expiry {
    /// `EXPIRE key seconds`
    pub fn from_secs(secs: i64) -> Result<Self> {
        let secs = u64::try_from(secs).map_err(|_| StoreError::invalid("negative expire time"))?;
        Ok(Expiry::After(Duration::from_secs(secs)))
    }

    /// `EXPIREAT key unix-seconds`
    pub fn at_unix_secs(secs: i64) -> Result<Self> {
        let ms = u64::try_from(secs)
            .ok()
            .and_then(|s| s.checked_mul(1000))
            .ok_or_else(|| StoreError::invalid("invalid unix timestamp"))?;
        Ok(Expiry::At(ms))
    }

    /// `PEXPIREAT key unix-ms`
    pub fn at_unix_millis(ms: i64) -> Result<Self> {
        let ms = u64::try_from(ms).map_err(|_| StoreError::invalid("invalid unix timestamp"))?;
        Ok(Expiry::At(ms))
    }

    /// Absolute deadline in unix milliseconds.
    pub fn deadline(self, now: u64) -> Result<u64> {
        match self {
            Expiry::After(d) => u64::try_from(d.as_millis())
                .ok()
                .and_then(|ms| now.checked_add(ms))
                .ok_or_else(|| StoreError::invalid("expire time out of range")),
            Expiry::At(at) => Ok(at),
        }
    }
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Missing,
    Persistent,
    Remaining(Duration),
}

impl Ttl {
    /// "-2"：key 不存在；"-1"：没有过期时间；否则为向上取整的剩余秒数
    pub fn as_secs(self) -> i64 {
        match self {
            Ttl::Missing => -2,
            Ttl::Persistent => -1,
            Ttl::Remaining(d) => d.as_millis().div_ceil(1000) as i64,
        }
    }
}

/// 为已存在的 key 设置（覆盖）过期时间；key 不存在时什么也不做，返回 false。
/// 截止时间已过的 key 立即删除。
pub fn expire_at(ks: &Keyspace, key: &Bytes, deadline: u64, now: u64) -> bool {
    ks.update(key, now, |slot| {
        let Some(entry) = slot.as_mut() else {
            return false;
        };
        if deadline <= now {
            *slot = None;
            ks.note_evicted(key, 1);
        } else {
            entry.expires_at = Some(deadline);
        }
        true
    })
}

/// 查询 key 的剩余时间
pub fn ttl(ks: &Keyspace, key: &[u8], now: u64) -> Ttl {
    ks.read(key, now, |entry| match entry {
        None => Ttl::Missing,
        Some(Entry { expires_at: None, .. }) => Ttl::Persistent,
        Some(Entry { expires_at: Some(at), .. }) => {
            Ttl::Remaining(Duration::from_millis(at.saturating_sub(now)))
        }
    })
}

/// 移除 key 的过期属性，返回是否真的移除了
pub fn persist(ks: &Keyspace, key: &Bytes, now: u64) -> bool {
    ks.update(key, now, |slot| {
        slot.as_mut()
            .and_then(|entry| entry.expires_at.take())
            .is_some()
    })
}

/// Background sweep settings.
#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    pub interval: Duration,
    /// Upper bound on keys evicted per pass.
    pub batch: usize,
}

/// 对所有库各跑一批清理，返回清理掉的 key 数
pub fn sweep_once(engine: &Engine, batch: usize) -> usize {
    let now = now_ms();
    engine
        .table()
        .keyspaces()
        .iter()
        .map(|ks| ks.sweep(now, batch))
        .sum()
}

/// 后台定时清理任务
///
/// 每个周期内逐库清理；某一批填满说明可能还有残留，让出调度后继续，最多 `MAX_ROUNDS` 批。
pub async fn start_cleaner(engine: Arc<Engine>, cfg: SweepConfig) {
    let batch = cfg.batch.max(1);
    let mut iv = interval(cfg.interval.max(Duration::from_millis(1)));
    iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_ms = cfg.interval.as_millis() as u64, batch, "expiry sweeper started");

    loop {
        iv.tick().await;
        for ks in engine.table().keyspaces() {
            for _ in 0..MAX_ROUNDS {
                let evicted = ks.sweep(now_ms(), batch);
                if evicted < batch {
                    break;
                }
                tokio::task::yield_now().await;
            }
        }
    }
}
