// src/engine/command.rs

//! 文本命令分发
//!
//! 接收已经切分好的命令（`&[Bytes]`），调用 `Engine` 上对应的操作，
//! 返回一个 `Reply`，由网络层编码为 RESP。

use bytes::Bytes;

use super::{DbId, Engine};
use crate::error::{Result, StoreError};
use crate::expire::Expiry;
use crate::protocol::Reply;
use crate::session::Session;

/// 命令名，大写
pub fn name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_uppercase()
}

/// 会修改数据的命令，用于触发快照计数
pub fn is_write(cmd: &str) -> bool {
    matches!(
        cmd,
        "SET"
            | "DEL"
            | "INCR"
            | "DECR"
            | "LPUSH"
            | "RPUSH"
            | "LPOP"
            | "RPOP"
            | "RENAME"
            | "RENAMENX"
            | "EXPIRE"
            | "EXPIREAT"
            | "PEXPIREAT"
            | "PERSIST"
    )
}

fn wrong_args(cmd: &str) -> Reply {
    Reply::Error(format!("ERR wrong number of arguments for '{}'", cmd))
}

impl From<StoreError> for Reply {
    fn from(e: StoreError) -> Self {
        match e {
            // WRONGTYPE 自带前缀
            StoreError::TypeMismatch => Reply::Error(e.to_string()),
            other => Reply::Error(format!("ERR {}", other)),
        }
    }
}

fn ok(r: Result<()>) -> Reply {
    match r {
        Ok(()) => Reply::ok(),
        Err(e) => e.into(),
    }
}

fn bulk(r: Result<Option<Bytes>>) -> Reply {
    match r {
        Ok(Some(v)) => Reply::Bulk(v),
        Ok(None) => Reply::Nil,
        Err(e) => e.into(),
    }
}

fn int(r: Result<i64>) -> Reply {
    match r {
        Ok(n) => Reply::Integer(n),
        Err(e) => e.into(),
    }
}

fn flag(r: Result<bool>) -> Reply {
    int(r.map(i64::from))
}

fn len(r: Result<usize>) -> Reply {
    int(r.map(|n| n as i64))
}

fn parse_int(raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(StoreError::NotAnInteger)
}

fn expire_with(
    engine: &Engine,
    session: &Session,
    key: &Bytes,
    raw: &[u8],
    make: fn(i64) -> Result<Expiry>,
) -> Reply {
    let when = match parse_int(raw).and_then(make) {
        Ok(w) => w,
        Err(e) => return e.into(),
    };
    flag(engine.expire(session, key, when))
}

/// 对会话当前的库执行单个客户端命令
///
/// # 参数
///
/// * `parts` - 命令名称及其参数
/// * `engine` - 共享的引擎
/// * `session` - 连接状态，`SELECT` 会修改它
pub fn execute(parts: &[Bytes], engine: &Engine, session: &mut Session) -> Reply {
    // 1. 空白命令检查
    let Some((head, args)) = parts.split_first() else {
        return Reply::error("ERR empty command");
    };
    let cmd = name(head);

    match cmd.as_str() {
        // --- Connection / Control commands ---
        "PING" => match args {
            [] => Reply::Status("PONG".into()),
            [msg] => Reply::Bulk(msg.clone()),
            _ => wrong_args("PING"),
        },
        "QUIT" => {
            // 返回 OK，由 server 层负责断开
            Reply::ok()
        }
        "SELECT" => {
            let [db] = args else { return wrong_args("SELECT") };
            match std::str::from_utf8(db).ok().and_then(|s| s.parse::<DbId>().ok()) {
                Some(id) => {
                    engine.select(session, id);
                    Reply::ok()
                }
                None => Reply::error("ERR invalid DB index"),
            }
        }

        // --- String commands ---
        "SET" => {
            let [key, value] = args else { return wrong_args("SET") };
            ok(engine.set(session, key, value.clone()))
        }
        "GET" => {
            let [key] = args else { return wrong_args("GET") };
            bulk(engine.get(session, key))
        }
        "DEL" => {
            if args.is_empty() {
                return wrong_args("DEL");
            }
            len(engine.delete_many(session, args))
        }
        "EXISTS" => {
            let [key] = args else { return wrong_args("EXISTS") };
            flag(engine.exists(session, key))
        }
        "INCR" => {
            let [key] = args else { return wrong_args("INCR") };
            int(engine.incr(session, key))
        }
        "DECR" => {
            let [key] = args else { return wrong_args("DECR") };
            int(engine.decr(session, key))
        }
        "MGET" => {
            if args.is_empty() {
                return wrong_args("MGET");
            }
            match engine.mget(session, args) {
                Ok(values) => Reply::Array(
                    values
                        .into_iter()
                        .map(|v| v.map_or(Reply::Nil, Reply::Bulk))
                        .collect(),
                ),
                Err(e) => e.into(),
            }
        }

        // --- List commands ---
        "LPUSH" => {
            let [key, element] = args else { return wrong_args("LPUSH") };
            len(engine.lpush(session, key, element.clone()))
        }
        "RPUSH" => {
            let [key, element] = args else { return wrong_args("RPUSH") };
            len(engine.rpush(session, key, element.clone()))
        }
        "LPOP" => {
            let [key] = args else { return wrong_args("LPOP") };
            bulk(engine.lpop(session, key))
        }
        "RPOP" => {
            let [key] = args else { return wrong_args("RPOP") };
            bulk(engine.rpop(session, key))
        }
        "LRANGE" => {
            let [key, start, stop] = args else { return wrong_args("LRANGE") };
            let (Ok(s), Ok(e)) = (parse_int(start), parse_int(stop)) else {
                return Reply::error("ERR invalid start or stop");
            };
            match engine.lrange(session, key, s, e) {
                Ok(items) => Reply::Array(items.into_iter().map(Reply::Bulk).collect()),
                Err(e) => e.into(),
            }
        }
        "LLEN" => {
            let [key] = args else { return wrong_args("LLEN") };
            len(engine.llen(session, key))
        }

        // --- Keyspace commands ---
        "RENAME" => {
            let [from, to] = args else { return wrong_args("RENAME") };
            ok(engine.rename(session, from, to))
        }
        "RENAMENX" => {
            let [from, to] = args else { return wrong_args("RENAMENX") };
            flag(engine.renamenx(session, from, to))
        }
        "DBSIZE" => {
            if !args.is_empty() {
                return wrong_args("DBSIZE");
            }
            Reply::Integer(engine.dbsize(session) as i64)
        }

        // --- Expiration commands ---
        "EXPIRE" => {
            // EXPIRE <key> <seconds>：相对时间
            let [key, secs] = args else { return wrong_args("EXPIRE") };
            expire_with(engine, session, key, secs, Expiry::from_secs)
        }
        "EXPIREAT" => {
            // EXPIREAT <key> <unix-seconds>：绝对时间
            let [key, at] = args else { return wrong_args("EXPIREAT") };
            expire_with(engine, session, key, at, Expiry::at_unix_secs)
        }
        "PEXPIREAT" => {
            let [key, at] = args else { return wrong_args("PEXPIREAT") };
            expire_with(engine, session, key, at, Expiry::at_unix_millis)
        }
        "TTL" => {
            // "-2"、"-1" 或剩余秒数
            let [key] = args else { return wrong_args("TTL") };
            int(engine.ttl(session, key).map(|t| t.as_secs()))
        }
        "PERSIST" => {
            let [key] = args else { return wrong_args("PERSIST") };
            flag(engine.persist(session, key))
        }

        // --- Unknown command ---
        _ => Reply::Error(format!(
            "ERR unknown command '{}'",
            String::from_utf8_lossy(head)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 辅助：把 &str 切片数组转成命令
    fn cmd(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|s| Bytes::copy_from_slice(s.as_bytes())).collect()
    }

    fn run(engine: &Engine, session: &mut Session, parts: &[&str]) -> Reply {
        execute(&cmd(parts), engine, session)
    }

    fn bulk_of(s: &str) -> Reply {
        Reply::Bulk(Bytes::copy_from_slice(s.as_bytes()))
    }

    // 字符串命令测试
    #[test]
    fn test_string_commands() {
        let engine = Engine::new();
        let mut s = Session::new();

        assert_eq!(run(&engine, &mut s, &["SET", "key1", "value1"]), Reply::ok());
        assert_eq!(run(&engine, &mut s, &["GET", "key1"]), bulk_of("value1"));
        assert_eq!(run(&engine, &mut s, &["GET", "nonexistence"]), Reply::Nil);
        assert_eq!(run(&engine, &mut s, &["EXISTS", "key1"]), Reply::Integer(1));

        run(&engine, &mut s, &["SET", "counter", "10"]);
        assert_eq!(run(&engine, &mut s, &["INCR", "counter"]), Reply::Integer(11));
        assert_eq!(run(&engine, &mut s, &["DECR", "counter"]), Reply::Integer(10));

        assert_eq!(run(&engine, &mut s, &["DEL", "key1", "missing"]), Reply::Integer(1));
        assert_eq!(run(&engine, &mut s, &["EXISTS", "key1"]), Reply::Integer(0));

        assert_eq!(
            run(&engine, &mut s, &["INCR", "key2"]),
            Reply::Integer(1)
        );
        run(&engine, &mut s, &["SET", "word", "abc"]);
        assert_eq!(
            run(&engine, &mut s, &["INCR", "word"]),
            Reply::error("ERR value is not an integer or out of range")
        );
    }

    #[test]
    fn test_del_with_invalid_key_deletes_nothing() {
        let engine = Engine::new();
        let mut s = Session::new();
        run(&engine, &mut s, &["SET", "a", "1"]);

        let r = run(&engine, &mut s, &["DEL", "a", ""]);
        assert_eq!(r, Reply::error("ERR invalid argument: empty key"));
        assert_eq!(run(&engine, &mut s, &["EXISTS", "a"]), Reply::Integer(1));
        assert_eq!(run(&engine, &mut s, &["DEL", "a", "a"]), Reply::Integer(1));
    }

    #[test]
    fn test_mget_command() {
        let engine = Engine::new();
        let mut s = Session::new();
        run(&engine, &mut s, &["SET", "k1", "v1"]);
        run(&engine, &mut s, &["SET", "k3", "v3"]);
        assert_eq!(
            run(&engine, &mut s, &["MGET", "k1", "k2", "k3"]),
            Reply::Array(vec![bulk_of("v1"), Reply::Nil, bulk_of("v3")])
        );
    }

    // 列表命令测试
    #[test]
    fn test_list_commands() {
        let engine = Engine::new();
        let mut s = Session::new();

        assert_eq!(run(&engine, &mut s, &["LPUSH", "mylist", "item1"]), Reply::Integer(1));
        assert_eq!(run(&engine, &mut s, &["RPUSH", "mylist", "item2"]), Reply::Integer(2));
        assert_eq!(run(&engine, &mut s, &["LLEN", "mylist"]), Reply::Integer(2));
        assert_eq!(run(&engine, &mut s, &["LPOP", "mylist"]), bulk_of("item1"));
        assert_eq!(
            run(&engine, &mut s, &["LRANGE", "mylist", "0", "-1"]),
            Reply::Array(vec![bulk_of("item2")])
        );
        assert_eq!(run(&engine, &mut s, &["RPOP", "mylist"]), bulk_of("item2"));
        assert_eq!(run(&engine, &mut s, &["RPOP", "mylist"]), Reply::Nil);

        run(&engine, &mut s, &["SET", "plain", "v"]);
        let r = run(&engine, &mut s, &["LPUSH", "plain", "x"]);
        assert!(matches!(r, Reply::Error(ref m) if m.starts_with("WRONGTYPE")));
    }

    #[test]
    fn test_rename_commands() {
        let engine = Engine::new();
        let mut s = Session::new();

        assert_eq!(
            run(&engine, &mut s, &["RENAME", "nope", "x"]),
            Reply::error("ERR no such key")
        );
        run(&engine, &mut s, &["SET", "a", "1"]);
        run(&engine, &mut s, &["SET", "b", "2"]);
        assert_eq!(run(&engine, &mut s, &["RENAMENX", "a", "b"]), Reply::Integer(0));
        assert_eq!(run(&engine, &mut s, &["RENAME", "a", "b"]), Reply::ok());
        assert_eq!(run(&engine, &mut s, &["GET", "b"]), bulk_of("1"));
        assert_eq!(run(&engine, &mut s, &["DBSIZE"]), Reply::Integer(1));
    }

    #[test]
    fn test_select_command() {
        let engine = Engine::new();
        let mut s = Session::new();
        run(&engine, &mut s, &["SET", "k", "zero"]);
        assert_eq!(run(&engine, &mut s, &["SELECT", "2"]), Reply::ok());
        assert_eq!(s.db(), 2);
        assert_eq!(run(&engine, &mut s, &["GET", "k"]), Reply::Nil);
        assert_eq!(run(&engine, &mut s, &["DBSIZE"]), Reply::Integer(0));
        assert_eq!(
            run(&engine, &mut s, &["SELECT", "-1"]),
            Reply::error("ERR invalid DB index")
        );
        assert_eq!(s.db(), 2);
    }

    // 过期命令测试
    #[test]
    fn test_expire_commands() {
        let engine = Engine::new();
        let mut s = Session::new();

        run(&engine, &mut s, &["SET", "temp_key", "value"]);
        assert_eq!(run(&engine, &mut s, &["TTL", "temp_key"]), Reply::Integer(-1));
        assert_eq!(run(&engine, &mut s, &["EXPIRE", "temp_key", "60"]), Reply::Integer(1));
        match run(&engine, &mut s, &["TTL", "temp_key"]) {
            Reply::Integer(n) => assert!(n > 0 && n <= 60),
            other => panic!("unexpected TTL reply {:?}", other),
        }
        assert_eq!(run(&engine, &mut s, &["PERSIST", "temp_key"]), Reply::Integer(1));
        assert_eq!(run(&engine, &mut s, &["EXPIRE", "missing", "60"]), Reply::Integer(0));

        // 绝对时间在过去：立即删除
        assert_eq!(run(&engine, &mut s, &["EXPIREAT", "temp_key", "1"]), Reply::Integer(1));
        assert_eq!(run(&engine, &mut s, &["GET", "temp_key"]), Reply::Nil);
        assert_eq!(run(&engine, &mut s, &["TTL", "temp_key"]), Reply::Integer(-2));

        run(&engine, &mut s, &["SET", "k", "v"]);
        assert_eq!(run(&engine, &mut s, &["PEXPIREAT", "k", "1000"]), Reply::Integer(1));
        assert_eq!(run(&engine, &mut s, &["EXISTS", "k"]), Reply::Integer(0));
    }

    #[test]
    fn test_expire_argument_errors() {
        let engine = Engine::new();
        let mut s = Session::new();
        run(&engine, &mut s, &["SET", "k", "v"]);
        assert_eq!(
            run(&engine, &mut s, &["EXPIRE", "k", "soon"]),
            Reply::error("ERR value is not an integer or out of range")
        );
        assert!(run(&engine, &mut s, &["EXPIRE", "k", "-5"]).is_error());
        assert!(run(&engine, &mut s, &["EXPIREAT", "k", "-5"]).is_error());
        // 参数错误时 key 不受影响
        assert_eq!(run(&engine, &mut s, &["TTL", "k"]), Reply::Integer(-1));
    }

    // 控制命令测试
    #[test]
    fn test_control_commands() {
        let engine = Engine::new();
        let mut s = Session::new();
        assert_eq!(run(&engine, &mut s, &["PING"]), Reply::Status("PONG".into()));
        assert_eq!(run(&engine, &mut s, &["ping", "hi"]), bulk_of("hi"));
        assert_eq!(run(&engine, &mut s, &["QUIT"]), Reply::ok());
        assert_eq!(execute(&[], &engine, &mut s), Reply::error("ERR empty command"));
        assert_eq!(
            run(&engine, &mut s, &["FLY"]),
            Reply::error("ERR unknown command 'FLY'")
        );
    }

    // 错误参数测试
    #[test]
    fn test_argument_errors() {
        let engine = Engine::new();
        let mut s = Session::new();

        // SET 参数不足
        assert_eq!(
            run(&engine, &mut s, &["SET", "Key"]),
            Reply::error("ERR wrong number of arguments for 'SET'")
        );
        // GET 多余参数
        assert_eq!(
            run(&engine, &mut s, &["GET", "key", "extra"]),
            Reply::error("ERR wrong number of arguments for 'GET'")
        );
        // INCR 多余参数
        assert_eq!(
            run(&engine, &mut s, &["INCR", "counter", "extra"]),
            Reply::error("ERR wrong number of arguments for 'INCR'")
        );
        assert_eq!(
            run(&engine, &mut s, &["MGET"]),
            Reply::error("ERR wrong number of arguments for 'MGET'")
        );
    }

    #[test]
    fn test_is_write() {
        assert!(is_write("SET"));
        assert!(is_write("RPOP"));
        assert!(!is_write("GET"));
        assert!(!is_write("SELECT"));
    }
}
