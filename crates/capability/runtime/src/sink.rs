//! 更新投递出口。
//!
//! 场景图归宿主所有，运行时只通过 [`UpdateSink`] 把解析好的值
//! 推出去。实现必须允许不同 (节点, 属性) 的并发写入。

use async_trait::async_trait;
use domain::{BindingKey, Value};
use tracing::info;

/// 一次属性更新。
#[derive(Debug, Clone)]
pub struct AttributeUpdate {
    pub key: BindingKey,
    pub value: Value,
    pub unit: Option<String>,
    /// 越界描述；有值时宿主可据此提示，值本身仍然投递。
    pub range_violation: Option<String>,
    pub timestamp_ms: i64,
    pub session_id: String,
}

#[async_trait]
pub trait UpdateSink: Send + Sync {
    async fn apply(&self, update: AttributeUpdate) -> Result<(), String>;
}

/// 把更新打到日志的 sink，宿主未接场景图时使用。
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl UpdateSink for TracingSink {
    async fn apply(&self, update: AttributeUpdate) -> Result<(), String> {
        info!(
            target: "sgbind.sink",
            node = %update.key.node_path,
            attribute = %update.key.attribute,
            value = %update.value,
            unit = ?update.unit,
            range_violation = ?update.range_violation,
            timestamp_ms = update.timestamp_ms,
            session_id = %update.session_id,
            "attribute_update"
        );
        Ok(())
    }
}
