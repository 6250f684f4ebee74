// src/client.rs

//! In-process client with the classic `get(key, default)` surface.
//!
//! Every call runs exactly once against the shared [`Engine`]; nothing is
//! retried. `set`, `delete` and `expire` are idempotent and safe to repeat.
//! `lpush`, `rpush`, `lpop`, `rpop`, `incr` and `decr` are not: callers that
//! retry them after an ambiguous failure need their own de-duplication.

use std::sync::Arc;

use bytes::Bytes;

use crate::engine::{DbId, Engine};
use crate::error::Result;
use crate::expire::{Expiry, Ttl};
use crate::session::Session;

fn key(k: impl AsRef<[u8]>) -> Bytes {
    Bytes::copy_from_slice(k.as_ref())
}

pub struct Client {
    engine: Arc<Engine>,
    session: Session,
}

impl Client {
    pub fn new(engine: Arc<Engine>) -> Self {
        Client { engine, session: Session::new() }
    }

    pub fn db(&self) -> DbId {
        self.session.db()
    }

    /// Switch this client's database. Other clients are unaffected.
    pub fn select(&mut self, db: DbId) {
        self.engine.select(&mut self.session, db);
    }

    pub fn get(&self, k: impl AsRef<[u8]>) -> Result<Option<Bytes>> {
        self.engine.get(&self.session, &key(k))
    }

    /// `get`, substituting `default` when the key is absent.
    pub fn get_or(&self, k: impl AsRef<[u8]>, default: impl Into<Bytes>) -> Result<Bytes> {
        Ok(self.get(k)?.unwrap_or_else(|| default.into()))
    }

    pub fn set(&self, k: impl AsRef<[u8]>, value: impl Into<Bytes>) -> Result<()> {
        self.engine.set(&self.session, &key(k), value.into())
    }

    pub fn delete(&self, k: impl AsRef<[u8]>) -> Result<()> {
        self.engine.delete(&self.session, &key(k)).map(|_| ())
    }

    pub fn exists(&self, k: impl AsRef<[u8]>) -> Result<bool> {
        self.engine.exists(&self.session, &key(k))
    }

    pub fn incr(&self, k: impl AsRef<[u8]>) -> Result<i64> {
        self.engine.incr(&self.session, &key(k))
    }

    pub fn decr(&self, k: impl AsRef<[u8]>) -> Result<i64> {
        self.engine.decr(&self.session, &key(k))
    }

    /// Returns the new length of the list.
    pub fn lpush(&self, k: impl AsRef<[u8]>, element: impl Into<Bytes>) -> Result<usize> {
        self.engine.lpush(&self.session, &key(k), element.into())
    }

    pub fn rpush(&self, k: impl AsRef<[u8]>, element: impl Into<Bytes>) -> Result<usize> {
        self.engine.rpush(&self.session, &key(k), element.into())
    }

    pub fn lpop(&self, k: impl AsRef<[u8]>) -> Result<Option<Bytes>> {
        self.engine.lpop(&self.session, &key(k))
    }

    pub fn lpop_or(&self, k: impl AsRef<[u8]>, default: impl Into<Bytes>) -> Result<Bytes> {
        Ok(self.lpop(k)?.unwrap_or_else(|| default.into()))
    }

    pub fn rpop(&self, k: impl AsRef<[u8]>) -> Result<Option<Bytes>> {
        self.engine.rpop(&self.session, &key(k))
    }

    pub fn rpop_or(&self, k: impl AsRef<[u8]>, default: impl Into<Bytes>) -> Result<Bytes> {
        Ok(self.rpop(k)?.unwrap_or_else(|| default.into()))
    }

    pub fn lrange(&self, k: impl AsRef<[u8]>, start: i64, stop: i64) -> Result<Vec<Bytes>> {
        self.engine.lrange(&self.session, &key(k), start, stop)
    }

    pub fn rename(&self, from: impl AsRef<[u8]>, to: impl AsRef<[u8]>) -> Result<()> {
        self.engine.rename(&self.session, &key(from), &key(to))
    }

    pub fn renamenx(&self, from: impl AsRef<[u8]>, to: impl AsRef<[u8]>) -> Result<bool> {
        self.engine.renamenx(&self.session, &key(from), &key(to))
    }

    pub fn dbsize(&self) -> usize {
        self.engine.dbsize(&self.session)
    }

    pub fn mget<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<Vec<Option<Bytes>>> {
        let keys: Vec<Bytes> = keys.iter().map(|k| key(k)).collect();
        self.engine.mget(&self.session, &keys)
    }

    /// Returns `false` when the key does not exist.
    pub fn expire(&self, k: impl AsRef<[u8]>, when: Expiry) -> Result<bool> {
        self.engine.expire(&self.session, &key(k), when)
    }

    pub fn ttl(&self, k: impl AsRef<[u8]>) -> Result<Ttl> {
        self.engine.ttl(&self.session, &key(k))
    }

    pub fn persist(&self, k: impl AsRef<[u8]>) -> Result<bool> {
        self.engine.persist(&self.session, &key(k))
    }
}
