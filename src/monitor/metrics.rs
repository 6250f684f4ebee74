// src/monitor/metrics.rs

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::engine::Engine;
use crate::expire::now_ms;

#[derive(Default)]
pub struct Metrics {
    pub connected_clients: AtomicU64,
    pub total_connections: AtomicU64,
    pub command_count: AtomicU64,
    pub command_stats: DashMap<String, u64>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn record_command(&self, command: &str) {
        self.command_count.fetch_add(1, Ordering::Relaxed);
        self.command_stats
            .entry(command.to_string())
            .and_modify(|c| *c += 1)
            .or_insert(1);
    }

    pub fn client_connected(&self) {
        self.connected_clients.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_disconnected(&self) {
        self.connected_clients.fetch_sub(1, Ordering::Relaxed);
    }

    /// Prometheus 文本格式
    pub fn to_prometheus(&self, engine: &Engine) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "# HELP xkv_connected_clients Current number of client connections");
        let _ = writeln!(output, "# TYPE xkv_connected_clients gauge");
        let _ = writeln!(output, "xkv_connected_clients {}", self.connected_clients.load(Ordering::Relaxed));

        let _ = writeln!(output, "# HELP xkv_total_connections Total connections since startup");
        let _ = writeln!(output, "# TYPE xkv_total_connections counter");
        let _ = writeln!(output, "xkv_total_connections {}", self.total_connections.load(Ordering::Relaxed));

        let _ = writeln!(output, "# HELP xkv_command_count Total commands processed");
        let _ = writeln!(output, "# TYPE xkv_command_count counter");
        let _ = writeln!(output, "xkv_command_count {}", self.command_count.load(Ordering::Relaxed));

        let _ = writeln!(output, "# HELP xkv_command_stats Command statistics");
        let _ = writeln!(output, "# TYPE xkv_command_stats counter");
        let mut stats: Vec<(String, u64)> = self
            .command_stats
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        stats.sort();
        for (cmd, count) in stats {
            let _ = writeln!(output, "xkv_command_stats{{command=\"{}\"}} {}", cmd, count);
        }

        let now = now_ms();
        let keyspaces = engine.table().keyspaces();
        let _ = writeln!(output, "# HELP xkv_keys Live keys per database");
        let _ = writeln!(output, "# TYPE xkv_keys gauge");
        for ks in &keyspaces {
            let _ = writeln!(output, "xkv_keys{{db=\"{}\"}} {}", ks.id(), ks.len(now));
        }
        let _ = writeln!(output, "# HELP xkv_expired_keys Keys evicted by expiry per database");
        let _ = writeln!(output, "# TYPE xkv_expired_keys counter");
        for ks in &keyspaces {
            let _ = writeln!(output, "xkv_expired_keys{{db=\"{}\"}} {}", ks.id(), ks.evicted());
        }

        output
    }
}
