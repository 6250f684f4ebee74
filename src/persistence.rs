// src/persistence.rs

//! 快照持久化：把所有库写入 sled，启动时再读回来
//!
//! 每个库一棵 tree，名称为 `db:<编号>`；value 是 JSON 编码的 `Entry`（含绝对过期时间）。
//! 一次快照对每棵 tree 用一个 `Batch` 原子替换。

use anyhow::{Context, Result};
use bytes::Bytes;
use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
        mpsc::{self, RecvTimeoutError, Sender},
    },
    thread,
    time::Duration,
};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::engine::{DbId, Engine, Entry};
use crate::expire::now_ms;

const TREE_PREFIX: &str = "db:";

fn tree_name(id: DbId) -> String {
    format!("{}{}", TREE_PREFIX, id)
}

fn parse_tree_name(name: &[u8]) -> Option<DbId> {
    std::str::from_utf8(name)
        .ok()?
        .strip_prefix(TREE_PREFIX)?
        .parse()
        .ok()
}

#[derive(Clone)]
struct SnapshotStore {
    db: sled::Db,
    engine: Arc<Engine>,
}

impl SnapshotStore {
    /// 执行一次全量快照，返回写入的 key 数
    fn snapshot(&self) -> Result<usize> {
        let now = now_ms();
        let mut total = 0;

        for ks in self.engine.table().keyspaces() {
            let tree = self.db.open_tree(tree_name(ks.id()))?;
            let live = ks.entries(now);

            let mut batch = sled::Batch::default();
            {
                let keep: HashSet<&[u8]> = live.iter().map(|(k, _)| k.as_ref()).collect();
                for stale in tree.iter().keys() {
                    let stale = stale?;
                    if !keep.contains(&stale[..]) {
                        batch.remove(stale);
                    }
                }
            }
            for (key, entry) in &live {
                let encoded = serde_json::to_vec(entry)
                    .with_context(|| format!("Failed to encode key in db {}", ks.id()))?;
                batch.insert(key.as_ref(), encoded);
            }
            tree.apply_batch(batch)?;
            total += live.len();
        }

        // 确保 sled 数据落盘
        self.db.flush()?;
        Ok(total)
    }

    /// 把快照读回引擎，跳过已经过期的 key
    fn load(&self) -> Result<usize> {
        let now = now_ms();
        let mut total = 0;

        for name in self.db.tree_names() {
            let Some(id) = parse_tree_name(&name) else { continue };
            let tree = self.db.open_tree(&name)?;
            let ks = self.engine.table().get_or_create(id);

            for item in tree.iter() {
                let (k, v) = item?;
                let entry: Entry = serde_json::from_slice(&v)
                    .with_context(|| format!("Corrupt snapshot entry in db {}", id))?;
                if entry.is_expired(now) {
                    continue;
                }
                ks.restore(Bytes::copy_from_slice(&k), entry);
                total += 1;
            }
        }
        Ok(total)
    }
}

/// 持久化器：周期快照 + 写次数阈值触发
pub struct Persistence {
    store: SnapshotStore,
    threshold: u64,
    write_count: AtomicU64,
    trigger: Option<Sender<()>>,
}

impl Persistence {
    /// 打开 `cfg.data_dir` 下的 sled 库，并按配置启动快照线程
    pub fn open(cfg: &Config, engine: Arc<Engine>) -> Result<Arc<Self>> {
        let db = sled::open(&cfg.data_dir)
            .with_context(|| format!("Failed to open snapshot dir {:?}", cfg.data_dir))?;
        let store = SnapshotStore { db, engine };

        let periodic = cfg.snapshot_interval_secs > 0;
        let trigger = if periodic || cfg.snapshot_threshold > 0 {
            let (tx, rx) = mpsc::channel::<()>();
            let worker = store.clone();
            // 只按阈值触发时，用一个很长的超时代替“永不超时”
            let interval = if periodic {
                Duration::from_secs(cfg.snapshot_interval_secs)
            } else {
                Duration::from_secs(24 * 60 * 60)
            };
            thread::Builder::new()
                .name("xkv-snapshot".into())
                .spawn(move || snapshot_loop(worker, rx, interval, periodic))
                .context("Failed to spawn snapshot thread")?;
            Some(tx)
        } else {
            None
        };

        Ok(Arc::new(Persistence {
            store,
            threshold: cfg.snapshot_threshold,
            write_count: AtomicU64::new(0),
            trigger,
        }))
    }

    /// 启动时恢复快照，返回恢复的 key 数
    pub fn load(&self) -> Result<usize> {
        self.store.load()
    }

    /// 立即执行一次快照
    pub fn snapshot(&self) -> Result<usize> {
        self.store.snapshot()
    }

    /// 写命令成功后调用；累计到阈值时通知快照线程
    pub fn record_write(&self) {
        if self.threshold == 0 {
            return;
        }
        let prev = self.write_count.fetch_add(1, Ordering::SeqCst);
        if prev + 1 >= self.threshold {
            self.write_count.store(0, Ordering::SeqCst);
            if let Some(tx) = &self.trigger {
                let _ = tx.send(());
            }
        }
    }

    /// 优雅关闭时调用，写最后一次快照
    pub fn close(&self) -> Result<()> {
        let keys = self.store.snapshot()?;
        info!(keys, "final snapshot written");
        Ok(())
    }
}

fn snapshot_loop(store: SnapshotStore, rx: mpsc::Receiver<()>, interval: Duration, periodic: bool) {
    loop {
        match rx.recv_timeout(interval) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) if periodic => {}
            Err(RecvTimeoutError::Timeout) => continue,
            // Persistence 已经被释放
            Err(RecvTimeoutError::Disconnected) => break,
        }
        match store.snapshot() {
            Ok(keys) => debug!(keys, "snapshot written"),
            Err(e) => error!(error = %e, "snapshot failed"),
        }
    }
}
