//! 协议客户端统一接口。

use crate::buffer::StreamHandle;
use crate::error::ProtocolError;
use crate::types::Payload;
use async_trait::async_trait;
use domain::{Operation, Protocol};
use std::future::Future;
use std::time::Duration;

/// 协议客户端。一个实例服务一条绑定会话，不跨会话共享。
///
/// `read`/`write`/`start_stream` 带默认实现返回 Unsupported，
/// 各协议只实现自己支持矩阵内的操作。
#[async_trait]
pub trait ProtocolClient: Send {
    fn protocol(&self) -> Protocol;

    async fn connect(&mut self) -> Result<(), ProtocolError>;

    async fn disconnect(&mut self);

    /// 单次读取：返回原始载荷。
    async fn read(&mut self) -> Result<Payload, ProtocolError> {
        Err(ProtocolError::Unsupported {
            protocol: self.protocol(),
            operation: Operation::Read,
        })
    }

    /// 单次写出。
    async fn write(&mut self, _payload: &[u8]) -> Result<(), ProtocolError> {
        Err(ProtocolError::Unsupported {
            protocol: self.protocol(),
            operation: Operation::Write,
        })
    }

    /// 启动原生流订阅。仅 mqtt/websocket 实现；其余协议由调度器
    /// 以轮询模拟流。
    async fn start_stream(&mut self) -> Result<StreamHandle, ProtocolError> {
        Err(ProtocolError::Unsupported {
            protocol: self.protocol(),
            operation: Operation::Stream,
        })
    }
}

/// 统一的超时包装：到期时间换成 Timeout 错误。
pub(crate) async fn with_timeout<T, F>(timeout_ms: u64, fut: F) -> Result<T, ProtocolError>
where
    F: Future<Output = Result<T, ProtocolError>> + Send,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout(timeout_ms)),
    }
}
