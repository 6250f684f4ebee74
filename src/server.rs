// src/server.rs
//! 网络层：
//! - 监听 TCP 连接，每个连接一个异步任务、一个独立的 `Session`
//! - 解码请求（文本 / RESP）
//! - 调度到 engine 执行
//! - 写命令成功后通知持久化器
//! - 以 RESP 回复
use anyhow::{Context, Result};
use std::sync::Arc;

use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, info, warn};

use crate::{
    engine::{Engine, command},
    monitor::Metrics,
    persistence::Persistence,
    protocol,
    session::Session,
};

/// 所有连接共享的状态
#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub pers: Option<Arc<Persistence>>,
    pub metrics: Arc<Metrics>,
}

/// 绑定地址并进入接受循环
pub async fn start(addr: &str, state: ServerState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr, "xkv server listening");
    serve(listener, state).await
}

/// 核心循环: 不断 accept 新连接，并为每个连接 spawn 一个异步任务
pub async fn serve(listener: TcpListener, state: ServerState) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "accepted connection");

        let state = state.clone();
        tokio::spawn(async move {
            state.metrics.client_connected();
            if let Err(err) = handle_connection(stream, &state).await {
                warn!(%peer, error = %err, "connection error");
            }
            state.metrics.client_disconnected();
        });
    }
}

/// 单个连接的处理逻辑
async fn handle_connection(stream: TcpStream, state: &ServerState) -> Result<()> {
    let peer = stream.peer_addr()?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut session = Session::new();

    loop {
        let Some(parts) = protocol::read_request(&mut reader).await? else {
            debug!(%peer, session = session.id(), "client disconnected");
            break;
        };
        // 如果 client 发了空行，就重新循环
        if parts.is_empty() {
            continue;
        }

        let cmd = command::name(&parts[0]);
        let resp = command::execute(&parts, &state.engine, &mut session);
        state.metrics.record_command(&cmd);
        debug!(session = session.id(), db = session.db(), cmd = %cmd, ok = !resp.is_error(), "command");

        if !resp.is_error() && command::is_write(&cmd) {
            if let Some(pers) = &state.pers {
                pers.record_write();
            }
        }

        writer.write_all(&resp.to_bytes()).await?;

        if cmd == "QUIT" {
            break;
        }
    }

    Ok(())
}
