// src/lib.rs
//! xkv 库：多数据库的 key / list 存储，支持过期
//!
//! engine / expire / types / session / client / protocol / server / persistence / monitor

pub mod client;      // 进程内客户端，带默认值语义
pub mod config;      // JSON 配置
pub mod engine;      // 数据库表 & 命令分发
pub mod error;       // 引擎错误类型
pub mod expire;      // 过期策略
pub mod monitor;     // 监控 & 诊断
pub mod persistence; // sled 快照
pub mod protocol;    // 协议编解码
pub mod server;      // 网络层
pub mod session;     // 连接状态
pub mod types;       // String / List 数据结构
