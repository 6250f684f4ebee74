// src/engine/keyspace.rs

//! # Keyspace
//!
//! One logical database. Keys live in a fixed number of shards, each a
//! `RwLock<HashMap<Bytes, Entry>>`; every single-key operation runs under the
//! lock of the shard that owns the key, expiry check included.
//!
//! Expired entries are never observable: readers treat them as absent and
//! evict them, writers see an empty slot.

use std::collections::hash_map::RandomState;
use std::collections::{HashMap, VecDeque};
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StoreError};

/// Logical database number.
pub type DbId = u32;

const SHARD_COUNT: usize = 16;

/// A key holds exactly one of these at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Scalar(Bytes),
    List(VecDeque<Bytes>),
}

/// Stored value plus its absolute expiry (unix milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub value: Value,
    pub expires_at: Option<u64>,
}

impl Entry {
    pub fn new(value: Value) -> Self {
        Entry { value, expires_at: None }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

type Shard = HashMap<Bytes, Entry>;

pub struct Keyspace {
    id: DbId,
    shards: Box<[RwLock<Shard>]>,
    hasher: RandomState,
    /// 后台清理从哪个分片继续
    sweep_cursor: AtomicUsize,
    evicted: AtomicU64,
}

impl Keyspace {
    pub fn new(id: DbId) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Keyspace {
            id,
            shards,
            hasher: RandomState::new(),
            sweep_cursor: AtomicUsize::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> DbId {
        self.id
    }

    /// Total number of keys evicted by expiry so far.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    fn shard_index(&self, key: &[u8]) -> usize {
        (self.hasher.hash_one(key) as usize) % SHARD_COUNT
    }

    fn shard(&self, key: &[u8]) -> &RwLock<Shard> {
        &self.shards[self.shard_index(key)]
    }

    /// Counts an expiry eviction of `key`.
    pub(crate) fn note_evicted(&self, key: &[u8], count: u64) {
        self.evicted.fetch_add(count, Ordering::Relaxed);
        debug!(db = self.id, key = %String::from_utf8_lossy(key), "evicted expired key");
    }

    /// Removes `key` from an already locked shard if it has expired.
    fn purge(&self, shard: &mut Shard, key: &[u8], now: u64) {
        if shard.get(key).is_some_and(|e| e.is_expired(now)) {
            shard.remove(key);
            self.note_evicted(key, 1);
        }
    }

    /// Runs `f` against the live entry for `key`, or `None` if the key is
    /// absent or expired. An expired entry found here is evicted before
    /// returning.
    pub fn read<R>(&self, key: &[u8], now: u64, f: impl FnOnce(Option<&Entry>) -> R) -> R {
        {
            let shard = self.shard(key).read();
            match shard.get(key) {
                Some(entry) if entry.is_expired(now) => {}
                live => return f(live),
            }
        }
        // 读锁下发现已过期：升级为写锁后再确认一次
        let mut shard = self.shard(key).write();
        self.purge(&mut shard, key, now);
        f(None)
    }

    /// Runs `f` with exclusive access to the slot for `key`.
    ///
    /// The slot is `None` when the key is absent or has expired. Whatever `f`
    /// leaves in the slot is written back: `Some` stores it, `None` deletes the
    /// key. `f` must validate before mutating so an error leaves the slot as
    /// it found it.
    pub fn update<R>(&self, key: &Bytes, now: u64, f: impl FnOnce(&mut Option<Entry>) -> R) -> R {
        let mut shard = self.shard(key).write();
        let mut slot = shard.remove(key);
        if slot.as_ref().is_some_and(|e| e.is_expired(now)) {
            slot = None;
            self.note_evicted(key, 1);
        }
        let out = f(&mut slot);
        if let Some(entry) = slot {
            shard.insert(key.clone(), entry);
        }
        out
    }

    /// Moves the entry at `from` to `to`, value and expiry together.
    ///
    /// Returns `Ok(false)` without touching anything when `overwrite` is off
    /// and `to` already exists. Both shards are locked in index order.
    pub fn rename(&self, from: &Bytes, to: &Bytes, overwrite: bool, now: u64) -> Result<bool> {
        let (a, b) = (self.shard_index(from), self.shard_index(to));

        if a == b {
            let mut shard = self.shards[a].write();
            self.purge(&mut shard, from, now);
            self.purge(&mut shard, to, now);
            if !shard.contains_key(from) {
                return Err(StoreError::KeyNotFound);
            }
            if from == to {
                return Ok(overwrite);
            }
            if !overwrite && shard.contains_key(to) {
                return Ok(false);
            }
            if let Some(entry) = shard.remove(from) {
                shard.insert(to.clone(), entry);
            }
            return Ok(true);
        }

        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let mut first = self.shards[lo].write();
        let mut second = self.shards[hi].write();
        let (src, dst) = if a < b {
            (&mut *first, &mut *second)
        } else {
            (&mut *second, &mut *first)
        };

        self.purge(src, from, now);
        self.purge(dst, to, now);
        if !src.contains_key(from) {
            return Err(StoreError::KeyNotFound);
        }
        if !overwrite && dst.contains_key(to) {
            return Ok(false);
        }
        if let Some(entry) = src.remove(from) {
            dst.insert(to.clone(), entry);
        }
        Ok(true)
    }

    /// Read guards on every shard, taken in index order like `rename`.
    ///
    /// Holding all of them at once gives a view no in-flight rename can tear.
    fn read_all(&self) -> Vec<RwLockReadGuard<'_, Shard>> {
        self.shards.iter().map(|s| s.read()).collect()
    }

    /// Number of live keys.
    pub fn len(&self, now: u64) -> usize {
        self.read_all()
            .iter()
            .map(|shard| shard.values().filter(|e| !e.is_expired(now)).count())
            .sum()
    }

    pub fn is_empty(&self, now: u64) -> bool {
        self.len(now) == 0
    }

    /// Evicts at most `budget` expired keys, resuming at the shard where the
    /// previous call stopped. Candidates are collected under the read lock and
    /// re-checked under the write lock.
    pub fn sweep(&self, now: u64, budget: usize) -> usize {
        let mut evicted = 0;
        let start = self.sweep_cursor.load(Ordering::Relaxed);

        for step in 0..SHARD_COUNT {
            if evicted >= budget {
                break;
            }
            let idx = (start + step) % SHARD_COUNT;
            let candidates: Vec<Bytes> = self.shards[idx]
                .read()
                .iter()
                .filter(|(_, e)| e.is_expired(now))
                .map(|(k, _)| k.clone())
                .take(budget - evicted)
                .collect();

            if !candidates.is_empty() {
                let mut shard = self.shards[idx].write();
                for key in &candidates {
                    if shard.get(key).is_some_and(|e| e.is_expired(now)) {
                        shard.remove(key);
                        evicted += 1;
                    }
                }
            }

            // 配额用完时停在当前分片，下次从这里继续
            let next = if evicted >= budget { idx } else { idx + 1 };
            self.sweep_cursor.store(next % SHARD_COUNT, Ordering::Relaxed);
        }

        if evicted > 0 {
            self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(db = self.id, evicted, "expiry sweep");
        }
        evicted
    }

    /// Clones every live entry, for snapshots. All shards are locked for the
    /// duration of the copy.
    pub fn entries(&self, now: u64) -> Vec<(Bytes, Entry)> {
        let guards = self.read_all();
        let mut out = Vec::with_capacity(guards.iter().map(|g| g.len()).sum());
        for shard in &guards {
            out.extend(
                shard
                    .iter()
                    .filter(|(_, e)| !e.is_expired(now))
                    .map(|(k, e)| (k.clone(), e.clone())),
            );
        }
        out
    }

    /// Inserts an entry as-is, expiry included. Used when loading snapshots.
    pub fn restore(&self, key: Bytes, entry: Entry) {
        self.shard(&key).write().insert(key, entry);
    }
}
