//! 追踪初始化、会话 ID 生成与运行计数。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, EnvFilter};

/// 运行计数快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub updates_delivered: u64,
    pub writes_outbound: u64,
    pub extraction_failures: u64,
    pub range_violations: u64,
    pub buffer_overflows: u64,
    pub connect_retries: u64,
    pub sessions_started: u64,
    pub sessions_stopped: u64,
    pub sessions_failed: u64,
}

/// 运行计数。
pub struct TelemetryMetrics {
    updates_delivered: AtomicU64,
    writes_outbound: AtomicU64,
    extraction_failures: AtomicU64,
    range_violations: AtomicU64,
    buffer_overflows: AtomicU64,
    connect_retries: AtomicU64,
    sessions_started: AtomicU64,
    sessions_stopped: AtomicU64,
    sessions_failed: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            updates_delivered: AtomicU64::new(0),
            writes_outbound: AtomicU64::new(0),
            extraction_failures: AtomicU64::new(0),
            range_violations: AtomicU64::new(0),
            buffer_overflows: AtomicU64::new(0),
            connect_retries: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            sessions_stopped: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates_delivered: self.updates_delivered.load(Ordering::Relaxed),
            writes_outbound: self.writes_outbound.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            range_violations: self.range_violations.load(Ordering::Relaxed),
            buffer_overflows: self.buffer_overflows.load(Ordering::Relaxed),
            connect_retries: self.connect_retries.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_stopped: self.sessions_stopped.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成会话 ID（日志关联用）。
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录一次属性更新投递。
pub fn record_update_delivered() {
    metrics().updates_delivered.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次出站写。
pub fn record_write_outbound() {
    metrics().writes_outbound.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次取值失败（抽取/类型约束）。
pub fn record_extraction_failure() {
    metrics().extraction_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次越界标记。
pub fn record_range_violation() {
    metrics().range_violations.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次流缓冲丢弃。
pub fn record_buffer_overflow() {
    metrics().buffer_overflows.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次连接重试。
pub fn record_connect_retry() {
    metrics().connect_retries.fetch_add(1, Ordering::Relaxed);
}

/// 记录会话启动。
pub fn record_session_started() {
    metrics().sessions_started.fetch_add(1, Ordering::Relaxed);
}

/// 记录会话停止。
pub fn record_session_stopped() {
    metrics().sessions_stopped.fetch_add(1, Ordering::Relaxed);
}

/// 记录会话最终失败。
pub fn record_session_failed() {
    metrics().sessions_failed.fetch_add(1, Ordering::Relaxed);
}
