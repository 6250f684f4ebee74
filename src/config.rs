use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use anyhow::{Context, Result};
use tracing::info;

use crate::expire::SweepConfig;

/// 进程启动后，从 config.json 中读到的全局配置
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 监听地址
    pub bind: String,
    /// 日志过滤规则，RUST_LOG 优先
    pub log_level: String,
    /// 是否开启快照持久化
    pub persistence: bool,
    /// sled 快照目录
    pub data_dir: PathBuf,
    /// 快照周期（秒），0 表示只按写次数触发
    pub snapshot_interval_secs: u64,
    /// 每固定 N 次写操作触发快照，0 表示关闭
    pub snapshot_threshold: u64,
    /// 后台过期清理周期（毫秒）
    pub sweep_interval_ms: u64,
    /// 每批最多清理的 key 数
    pub sweep_batch: usize,
    // 监控配置
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1:6380".to_string(),
            log_level: "info".to_string(),
            persistence: true,
            data_dir: PathBuf::from("xkv-data"),
            snapshot_interval_secs: 60,
            snapshot_threshold: 1000,
            sweep_interval_ms: 100,
            sweep_batch: 20,
            metrics_enabled: true,
            metrics_port: 9090,
        }
    }
}

impl Config {
    pub fn sweep(&self) -> SweepConfig {
        SweepConfig {
            interval: Duration::from_millis(self.sweep_interval_ms.max(1)),
            batch: self.sweep_batch.max(1),
        }
    }
}

/// 从指定路径读取并反序列化 JSON 配置
///
/// 文件不存在时写出一份默认配置并返回它；缺失的字段取默认值。
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();

    // 如果配置文件不存在，创建默认配置
    if !path_ref.exists() {
        let default_cfg = Config::default();
        let default_json = serde_json::to_string_pretty(&default_cfg)?;
        fs::write(path_ref, default_json)
            .with_context(|| format!("Failed to write default config {:?}", path_ref))?;
        info!(path = %path_ref.display(), "default config created");
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read config file {:?}", path_ref))?;
    let cfg: Config = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse {:?}", path_ref))?;
    info!(path = %path_ref.display(), "config loaded");
    Ok(cfg)
}
