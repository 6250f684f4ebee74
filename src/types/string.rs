// src/types/string.rs

//! 标量（字符串）类型的存取操作
//!
//! 所有函数都作用于单个 `Keyspace`，过期检查由 `Keyspace::read/update` 在同一把锁内完成：
//! - SET key value → 覆盖旧值，同时清掉旧的过期时间
//! - GET key → `Some(value)` 或 `None`；列表类型返回 TypeMismatch
//! - DEL key → 是否真的删除了一个 key
//! - INCR/DECR → 按十进制 i64 解析，不存在视为 0

use bytes::Bytes;

use crate::engine::keyspace::{Entry, Keyspace, Value};
use crate::error::{Result, StoreError};

/// 写入标量，已有值（无论类型）会被覆盖。
pub fn set(ks: &Keyspace, key: &Bytes, value: Bytes, now: u64) {
    ks.update(key, now, |slot| *slot = Some(Entry::new(Value::Scalar(value))));
}

/// 读取标量。
///
/// # 错误
/// - key 保存的是列表时返回 `TypeMismatch`
pub fn get(ks: &Keyspace, key: &[u8], now: u64) -> Result<Option<Bytes>> {
    ks.read(key, now, |entry| match entry {
        None => Ok(None),
        Some(Entry { value: Value::Scalar(v), .. }) => Ok(Some(v.clone())),
        Some(_) => Err(StoreError::TypeMismatch),
    })
}

/// 删除任意类型的 key，返回删除前是否存在。
pub fn del(ks: &Keyspace, key: &Bytes, now: u64) -> bool {
    ks.update(key, now, |slot| slot.take().is_some())
}

pub fn exists(ks: &Keyspace, key: &[u8], now: u64) -> bool {
    ks.read(key, now, |entry| entry.is_some())
}

/// 批量读取，结果顺序与输入一致；不存在或非标量的 key 得到 `None`。
pub fn mget(ks: &Keyspace, keys: &[Bytes], now: u64) -> Vec<Option<Bytes>> {
    keys.iter()
        .map(|key| {
            ks.read(key, now, |entry| match entry {
                Some(Entry { value: Value::Scalar(v), .. }) => Some(v.clone()),
                _ => None,
            })
        })
        .collect()
}

fn parse_i64(raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(StoreError::NotAnInteger)
}

/// 原子地加上 `delta` 并返回新值；过期时间保持不变。
pub fn incr_by(ks: &Keyspace, key: &Bytes, delta: i64, now: u64) -> Result<i64> {
    ks.update(key, now, |slot| {
        let current = match slot.as_ref() {
            None => 0,
            Some(Entry { value: Value::Scalar(raw), .. }) => parse_i64(raw)?,
            Some(_) => return Err(StoreError::TypeMismatch),
        };
        let next = current.checked_add(delta).ok_or(StoreError::Overflow)?;

        let encoded = Value::Scalar(Bytes::from(next.to_string()));
        if let Some(entry) = slot.as_mut() {
            entry.value = encoded;
        } else {
            *slot = Some(Entry::new(encoded));
        }
        Ok(next)
    })
}

pub fn incr(ks: &Keyspace, key: &Bytes, now: u64) -> Result<i64> {
    incr_by(ks, key, 1, now)
}

pub fn decr(ks: &Keyspace, key: &Bytes, now: u64) -> Result<i64> {
    incr_by(ks, key, -1, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn k(s: &'static str) -> Bytes {
        Bytes::from(s)
    }

    #[test]
    fn test_set_get_del() -> Result<()> {
        let ks = Keyspace::new(0);

        // 1) set & get
        set(&ks, &k("foo"), k("bar"), 0);
        assert_eq!(get(&ks, b"foo", 0)?, Some(k("bar")));

        // 2) overwrite
        set(&ks, &k("foo"), k("baz"), 0);
        assert_eq!(get(&ks, b"foo", 0)?, Some(k("baz")));

        // 3) del existing
        assert!(del(&ks, &k("foo"), 0));
        assert_eq!(get(&ks, b"foo", 0)?, None);
        assert!(!exists(&ks, b"foo", 0));

        // 4) del again
        assert!(!del(&ks, &k("foo"), 0));
        Ok(())
    }

    #[test]
    fn test_set_clears_expiry() {
        let ks = Keyspace::new(0);
        let mut entry = Entry::new(Value::Scalar(k("old")));
        entry.expires_at = Some(1_000);
        ks.restore(k("key"), entry);

        set(&ks, &k("key"), k("new"), 0);
        assert!(ks.read(b"key", 0, |e| e.is_some_and(|e| e.expires_at.is_none())));
    }

    #[test]
    fn test_get_on_list_is_type_mismatch() {
        let ks = Keyspace::new(0);
        ks.restore(k("L"), Entry::new(Value::List(VecDeque::from(vec![k("a")]))));
        assert_eq!(get(&ks, b"L", 0), Err(StoreError::TypeMismatch));
        // MGET 不报错，只给 None
        assert_eq!(mget(&ks, &[k("L")], 0), vec![None]);
    }

    #[test]
    fn test_mget_preserves_order() {
        let ks = Keyspace::new(0);
        set(&ks, &k("k1"), k("v1"), 0);
        set(&ks, &k("k3"), k("v3"), 0);
        assert_eq!(
            mget(&ks, &[k("k1"), k("k2"), k("k3")], 0),
            vec![Some(k("v1")), None, Some(k("v3"))]
        );
    }

    #[test]
    fn test_incr_and_decr_basic() -> Result<()> {
        let ks = Keyspace::new(0);
        assert_eq!(incr(&ks, &k("counter"), 0)?, 1);
        assert_eq!(incr(&ks, &k("counter"), 0)?, 2);
        assert_eq!(decr(&ks, &k("counter"), 0)?, 1);
        assert_eq!(decr(&ks, &k("counter"), 0)?, 0);
        assert_eq!(decr(&ks, &k("counter"), 0)?, -1);
        assert_eq!(get(&ks, b"counter", 0)?, Some(k("-1")));
        Ok(())
    }

    #[test]
    fn test_incr_keeps_expiry() -> Result<()> {
        let ks = Keyspace::new(0);
        let mut entry = Entry::new(Value::Scalar(k("41")));
        entry.expires_at = Some(9_999);
        ks.restore(k("n"), entry);

        assert_eq!(incr(&ks, &k("n"), 0)?, 42);
        assert!(ks.read(b"n", 0, |e| e.is_some_and(|e| e.expires_at == Some(9_999))));
        Ok(())
    }

    #[test]
    fn test_incr_overflow() {
        let ks = Keyspace::new(0);
        set(&ks, &k("big"), Bytes::from(i64::MAX.to_string()), 0);
        assert_eq!(incr(&ks, &k("big"), 0), Err(StoreError::Overflow));
        // 失败时原值不变
        assert_eq!(get(&ks, b"big", 0), Ok(Some(Bytes::from(i64::MAX.to_string()))));
    }

    #[test]
    fn test_decr_underflow() {
        let ks = Keyspace::new(0);
        set(&ks, &k("small"), Bytes::from(i64::MIN.to_string()), 0);
        assert_eq!(decr(&ks, &k("small"), 0), Err(StoreError::Overflow));
    }

    #[test]
    fn test_incr_not_an_integer() {
        let ks = Keyspace::new(0);
        set(&ks, &k("word"), k("abc"), 0);
        assert_eq!(incr(&ks, &k("word"), 0), Err(StoreError::NotAnInteger));
        assert_eq!(get(&ks, b"word", 0), Ok(Some(k("abc"))));
    }
}
