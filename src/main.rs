// src/main.rs
use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use xkv::{
    config,
    engine::Engine,
    expire,
    monitor::{self, Metrics},
    persistence::Persistence,
    server::{self, ServerState},
};

#[derive(Parser, Debug)]
#[command(name = "xkv", version, about = "Multi-database key/list store with expiry")]
struct Args {
    /// 配置文件路径，不存在时自动生成
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// 覆盖配置中的监听地址
    #[arg(long)]
    bind: Option<String>,

    /// 关闭快照持久化
    #[arg(long)]
    no_persistence: bool,

    /// 覆盖配置中的日志级别，RUST_LOG 优先
    #[arg(long)]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut cfg = config::load(&args.config)?;
    if let Some(bind) = args.bind {
        cfg.bind = bind;
    }
    if let Some(level) = args.log {
        cfg.log_level = level;
    }
    if args.no_persistence {
        cfg.persistence = false;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level)),
        )
        .init();
    info!(bind = %cfg.bind, persistence = cfg.persistence, "xkv starting");

    let engine = Arc::new(Engine::new());
    let metrics = Arc::new(Metrics::new());

    // 启动时恢复快照
    let pers = if cfg.persistence {
        let pers = Persistence::open(&cfg, engine.clone())?;
        let restored = pers.load()?;
        info!(keys = restored, dir = %cfg.data_dir.display(), "snapshot restored");
        Some(pers)
    } else {
        None
    };

    tokio::spawn(expire::start_cleaner(engine.clone(), cfg.sweep()));

    if cfg.metrics_enabled {
        tokio::spawn(monitor::serve_metrics(cfg.metrics_port, metrics.clone(), engine.clone()));
    }

    let state = ServerState { engine, pers: pers.clone(), metrics };
    tokio::select! {
        res = server::start(&cfg.bind, state) => res?,
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    if let Some(pers) = pers {
        if let Err(e) = pers.close() {
            error!(error = %e, "final snapshot failed");
        }
    }
    Ok(())
}
