// src/protocol.rs

//! 协议编解码
//!
//! 请求支持两种格式：
//! - RESP Array + Bulk String：`*2\r\n$3\r\nGET\r\n$1\r\nk\r\n`
//! - 简单文本：`GET k\n`，按空白切分
//!
//! 回复统一编码为 RESP。

use std::io::ErrorKind;

use anyhow::{Result, anyhow, bail};
use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// 单个 bulk 参数的长度上限
const MAX_BULK_LEN: usize = 64 * 1024 * 1024;
/// 长度头与文本请求的单行上限
const MAX_LINE_LEN: usize = 64 * 1024;
/// 读取 bulk 参数时最多预留的容量
const PREALLOC_LIMIT: usize = 16 * 1024;
/// 单个请求的参数个数上限
const MAX_ARGS: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Nil,
    Array(Vec<Reply>),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Reply::Error(msg.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Status(s) => {
                out.push(b'+');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Error(e) => {
                out.push(b'-');
                out.extend_from_slice(e.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Integer(n) => {
                out.extend_from_slice(format!(":{}\r\n", n).as_bytes());
            }
            Reply::Bulk(data) => {
                out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(b"\r\n");
            }
            Reply::Nil => out.extend_from_slice(b"$-1\r\n"),
            Reply::Array(items) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

async fn read_line_capped<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_LINE_LEN as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n as u64 == limit && buf.last() != Some(&b'\n') {
        bail!("request line longer than {} bytes", MAX_LINE_LEN);
    }
    Ok(())
}

fn parse_len(raw: &[u8], what: &str) -> Result<usize> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| anyhow!("invalid {} length: {:?}", what, String::from_utf8_lossy(raw)))
}

/// 读取一条请求并切分成参数列表
///
/// - 返回 `Ok(None)` 表示对端已断开
/// - 空行返回 `Ok(Some(vec![]))`，由调用方忽略
/// - 内存占用随实际收到的字节增长，不按长度头预分配
pub async fn read_request<R>(reader: &mut R) -> Result<Option<Vec<Bytes>>>
where
    R: AsyncBufRead + Unpin,
{
    // 先读一个字节，区分「RESP Array」或「简单文本」协议
    let mut first = [0u8; 1];
    match reader.read_exact(&mut first).await {
        Ok(_) => {}
        // 客户端断开（EOF） or RST
        Err(e) if e.kind() == ErrorKind::UnexpectedEof || e.kind() == ErrorKind::ConnectionReset => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    }

    match first[0] {
        b'*' => {
            let mut line = Vec::new();
            read_line_capped(reader, &mut line).await?;
            let count = parse_len(line.trim_ascii(), "multibulk")?;
            if count > MAX_ARGS {
                bail!("too many arguments in request: {}", count);
            }

            let mut parts = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                line.clear();
                read_line_capped(reader, &mut line).await?;
                let header = line.trim_ascii();
                let Some(digits) = header.strip_prefix(b"$") else {
                    bail!("expected '$', got {:?}", String::from_utf8_lossy(header));
                };
                let len = parse_len(digits, "bulk")?;
                if len > MAX_BULK_LEN {
                    bail!("bulk argument too large: {} bytes", len);
                }

                // payload 加结尾的 "\r\n"
                let want = len as u64 + 2;
                let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT) + 2);
                let got = (&mut *reader).take(want).read_to_end(&mut buf).await?;
                if got as u64 != want {
                    bail!("connection closed inside a bulk argument");
                }
                buf.truncate(len);
                parts.push(Bytes::from(buf));
            }
            Ok(Some(parts))
        }
        // 只有换行的空请求
        b'\n' => Ok(Some(Vec::new())),
        _ => {
            // 已经读了第一个字节，和剩下的一整行拼起来
            let mut line = vec![first[0]];
            read_line_capped(reader, &mut line).await?;
            Ok(Some(
                line.split(|c| c.is_ascii_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(Bytes::copy_from_slice)
                    .collect(),
            ))
        }
    }
}
