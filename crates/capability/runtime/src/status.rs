//! 跨会话共享的状态看板。

use domain::{BindingKey, BindingStatus, ErrorInfo, SessionState, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 所有绑定的状态快照表。会话任务写入，监控方读取。
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<HashMap<BindingKey, BindingStatus>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn init(&self, key: BindingKey) {
        let mut map = self.inner.write().await;
        map.entry(key.clone()).or_insert_with(|| BindingStatus::new(key));
    }

    pub async fn remove(&self, key: &BindingKey) {
        self.inner.write().await.remove(key);
    }

    pub async fn set_state(&self, key: &BindingKey, state: SessionState) {
        let mut map = self.inner.write().await;
        let status = map
            .entry(key.clone())
            .or_insert_with(|| BindingStatus::new(key.clone()));
        status.state = state;
    }

    /// 记录一次失败：连续失败计数 +1，保留最近错误。
    pub async fn record_error(&self, key: &BindingKey, kind: &str, message: &str) {
        let mut map = self.inner.write().await;
        let status = map
            .entry(key.clone())
            .or_insert_with(|| BindingStatus::new(key.clone()));
        status.last_error = Some(ErrorInfo::new(kind, message));
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
    }

    /// 记录一次成功投递：连续失败清零。
    pub async fn record_delivery(
        &self,
        key: &BindingKey,
        value: Value,
        timestamp_ms: i64,
        range_violation: bool,
    ) {
        let mut map = self.inner.write().await;
        let status = map
            .entry(key.clone())
            .or_insert_with(|| BindingStatus::new(key.clone()));
        status.last_value = Some(value);
        status.last_update_ms = Some(timestamp_ms);
        status.consecutive_failures = 0;
        status.delivered += 1;
        if range_violation {
            status.range_violations += 1;
        }
    }

    pub async fn get(&self, key: &BindingKey) -> Option<BindingStatus> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn snapshot(&self) -> Vec<BindingStatus> {
        self.inner.read().await.values().cloned().collect()
    }
}
