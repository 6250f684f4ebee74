// src/types/list.rs

//! # List Type Support
//!
//! Double-ended lists stored as `Value::List(VecDeque<Bytes>)` inside a
//! keyspace entry.
//!
//! Supported commands:
//! - `LPUSH` / `RPUSH`
//! - `LPOP` / `RPOP`
//! - `LRANGE`
//! - `LLEN`
//!
//! A list that becomes empty after a pop is deleted, so `EXISTS` and
//! `DBSIZE` never count drained lists.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::engine::keyspace::{Entry, Keyspace, Value};
use crate::error::{Result, StoreError};

#[derive(Clone, Copy)]
enum End {
    Head,
    Tail,
}

fn push(ks: &Keyspace, key: &Bytes, element: Bytes, end: End, now: u64) -> Result<usize> {
    ks.update(key, now, |slot| {
        let entry = slot.get_or_insert_with(|| Entry::new(Value::List(VecDeque::new())));
        let Value::List(items) = &mut entry.value else {
            return Err(StoreError::TypeMismatch);
        };
        match end {
            End::Head => items.push_front(element),
            End::Tail => items.push_back(element),
        }
        Ok(items.len())
    })
}

fn pop(ks: &Keyspace, key: &Bytes, end: End, now: u64) -> Result<Option<Bytes>> {
    ks.update(key, now, |slot| {
        let Some(entry) = slot.as_mut() else {
            return Ok(None);
        };
        let Value::List(items) = &mut entry.value else {
            return Err(StoreError::TypeMismatch);
        };
        let popped = match end {
            End::Head => items.pop_front(),
            End::Tail => items.pop_back(),
        };
        if items.is_empty() {
            *slot = None;
        }
        Ok(popped)
    })
}

/// Execute LPUSH: prepend `element`, creating the list if needed.
///
/// Returns the new length of the list.
///
/// # Errors
///
/// `TypeMismatch` if `key` holds a scalar.
pub fn lpush(ks: &Keyspace, key: &Bytes, element: Bytes, now: u64) -> Result<usize> {
    push(ks, key, element, End::Head, now)
}

/// Execute RPUSH: append `element`, creating the list if needed.
pub fn rpush(ks: &Keyspace, key: &Bytes, element: Bytes, now: u64) -> Result<usize> {
    push(ks, key, element, End::Tail, now)
}

/// Execute LPOP: remove and return the head element, or `None` if the key is
/// absent.
pub fn lpop(ks: &Keyspace, key: &Bytes, now: u64) -> Result<Option<Bytes>> {
    pop(ks, key, End::Head, now)
}

/// Execute RPOP: remove and return the tail element, or `None` if the key is
/// absent.
pub fn rpop(ks: &Keyspace, key: &Bytes, now: u64) -> Result<Option<Bytes>> {
    pop(ks, key, End::Tail, now)
}

/// Execute LRANGE:
/// Return the elements in `[start, stop]`, supporting negative indices
/// (counting from the end). Out-of-range bounds are clamped; an empty range
/// or a missing key yields an empty vector.
pub fn lrange(ks: &Keyspace, key: &[u8], start: i64, stop: i64, now: u64) -> Result<Vec<Bytes>> {
    ks.read(key, now, |entry| {
        let items = match entry {
            None => return Ok(Vec::new()),
            Some(Entry { value: Value::List(items), .. }) => items,
            Some(_) => return Err(StoreError::TypeMismatch),
        };
        let total = items.len() as i64;
        // Normalize negative indices
        let s = if start < 0 { (total + start).max(0) } else { start };
        let e = if stop < 0 { total + stop } else { stop.min(total - 1) };
        if s > e || s >= total {
            return Ok(Vec::new());
        }
        Ok(items
            .iter()
            .skip(s as usize)
            .take((e - s + 1) as usize)
            .cloned()
            .collect())
    })
}

/// Execute LLEN: length of the list, 0 when absent.
pub fn llen(ks: &Keyspace, key: &[u8], now: u64) -> Result<usize> {
    ks.read(key, now, |entry| match entry {
        None => Ok(0),
        Some(Entry { value: Value::List(items), .. }) => Ok(items.len()),
        Some(_) => Err(StoreError::TypeMismatch),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::string;

    fn b(s: &'static str) -> Bytes {
        Bytes::from(s)
    }

    /// Basic tests for List commands: LPUSH, RPUSH, LPOP, RPOP, LRANGE
    #[test]
    fn test_list_basic() -> Result<()> {
        let ks = Keyspace::new(0);
        let l = b("L");

        // LPUSH / RPUSH
        assert_eq!(lpush(&ks, &l, b("a"), 0)?, 1);
        assert_eq!(lpush(&ks, &l, b("b"), 0)?, 2); // b, a
        assert_eq!(rpush(&ks, &l, b("c"), 0)?, 3); // b, a, c

        // LRANGE full and single-element
        assert_eq!(lrange(&ks, b"L", 0, 2, 0)?, vec![b("b"), b("a"), b("c")]);
        assert_eq!(lrange(&ks, b"L", 1, 1, 0)?, vec![b("a")]);
        assert_eq!(lrange(&ks, b"L", -2, -1, 0)?, vec![b("a"), b("c")]);
        assert_eq!(lrange(&ks, b"L", 5, 10, 0)?, Vec::<Bytes>::new());

        // LPOP, RPOP
        assert_eq!(lpop(&ks, &l, 0)?, Some(b("b")));
        assert_eq!(rpop(&ks, &l, 0)?, Some(b("c")));
        assert_eq!(lrange(&ks, b"L", 0, -1, 0)?, vec![b("a")]);
        assert_eq!(llen(&ks, b"L", 0)?, 1);

        // Exhaust and empty pops
        assert_eq!(lpop(&ks, &l, 0)?, Some(b("a")));
        assert_eq!(lpop(&ks, &l, 0)?, None);
        assert_eq!(rpop(&ks, &l, 0)?, None);
        Ok(())
    }

    #[test]
    fn test_push_left_pop_right_is_fifo() -> Result<()> {
        let ks = Keyspace::new(0);
        let q = b("queue");
        lpush(&ks, &q, b("a"), 0)?;
        lpush(&ks, &q, b("b"), 0)?;
        assert_eq!(rpop(&ks, &q, 0)?, Some(b("a")));
        assert_eq!(lpop(&ks, &q, 0)?, Some(b("b")));
        Ok(())
    }

    #[test]
    fn test_drained_list_is_deleted() -> Result<()> {
        let ks = Keyspace::new(0);
        let l = b("L");
        rpush(&ks, &l, b("only"), 0)?;
        assert!(string::exists(&ks, b"L", 0));
        rpop(&ks, &l, 0)?;
        assert!(!string::exists(&ks, b"L", 0));
        assert_eq!(ks.len(0), 0);
        Ok(())
    }

    #[test]
    fn test_list_ops_on_scalar_fail() {
        let ks = Keyspace::new(0);
        let s = b("S");
        string::set(&ks, &s, b("v"), 0);

        assert_eq!(lpush(&ks, &s, b("x"), 0), Err(StoreError::TypeMismatch));
        assert_eq!(rpush(&ks, &s, b("x"), 0), Err(StoreError::TypeMismatch));
        assert_eq!(lpop(&ks, &s, 0), Err(StoreError::TypeMismatch));
        assert_eq!(lrange(&ks, b"S", 0, -1, 0), Err(StoreError::TypeMismatch));
        // 标量本身没有被破坏
        assert_eq!(string::get(&ks, b"S", 0), Ok(Some(b("v"))));
    }
}
