// src/monitor/mod.rs
//! 监控与诊断模块
mod metrics;

use std::sync::Arc;

use tracing::info;
use warp::Filter;

use crate::engine::Engine;

pub use metrics::Metrics;

/// 通过 HTTP `GET /metrics` 暴露 Prometheus 指标
pub async fn serve_metrics(port: u16, metrics: Arc<Metrics>, engine: Arc<Engine>) {
    let route = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .map(move || {
            warp::reply::with_header(
                metrics.to_prometheus(&engine),
                "content-type",
                "text/plain; version=0.0.4",
            )
        });

    info!(port, "metrics endpoint listening");
    warp::serve(route).run(([0, 0, 0, 0], port)).await;
}
