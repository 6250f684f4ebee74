// src/error.rs

//! 引擎层错误类型
//!
//! 读操作的“不存在”不是错误，统一用 `Option` 表达；这里只列出真正的失败。

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// RENAME / RENAMENX 的源 key 不存在
    #[error("no such key")]
    KeyNotFound,

    /// 对标量执行列表操作，或反之
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    TypeMismatch,

    /// 空 key、非法时间戳、非法数据库编号等
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("value is not an integer or out of range")]
    NotAnInteger,

    #[error("increment or decrement would overflow")]
    Overflow,
}

impl StoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        StoreError::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
