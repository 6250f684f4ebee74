// src/types/mod.rs
//! 各数据类型在单个 Keyspace 上的操作

pub mod list;   // LPUSH / RPUSH / LPOP / RPOP / LRANGE / LLEN
pub mod string; // GET / SET / DEL / EXISTS / MGET / INCR / DECR
