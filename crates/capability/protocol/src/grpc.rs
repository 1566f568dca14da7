//! gRPC 客户端。
//!
//! 服务 stub 由宿主注入（`GrpcInvoker`），本层只负责把绑定会话的
//! 读写翻译成一次 unary 调用：topic 是完整方法名，body 是请求报文。

use crate::client::{with_timeout, ProtocolClient};
use crate::error::ProtocolError;
use crate::types::{Payload, ResolvedRequest};
use async_trait::async_trait;
use domain::Protocol;
use std::sync::Arc;

/// 宿主提供的 unary 调用入口。
#[async_trait]
pub trait GrpcInvoker: Send + Sync {
    /// 调用 `method`（如 `plant.Telemetry/GetValue`），返回响应报文。
    async fn invoke(
        &self,
        endpoint: &str,
        method: &str,
        request: &[u8],
    ) -> Result<Vec<u8>, ProtocolError>;
}

pub struct GrpcClient {
    request: ResolvedRequest,
    invoker: Arc<dyn GrpcInvoker>,
}

impl GrpcClient {
    pub fn new(request: ResolvedRequest, invoker: Arc<dyn GrpcInvoker>) -> Self {
        Self { request, invoker }
    }
}

#[async_trait]
impl ProtocolClient for GrpcClient {
    fn protocol(&self) -> Protocol {
        Protocol::Grpc
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.request.topic.is_empty() {
            return Err(ProtocolError::ConfigParse(
                "grpc binding requires a method name".to_string(),
            ));
        }
        Ok(())
    }

    async fn disconnect(&mut self) {}

    async fn read(&mut self) -> Result<Payload, ProtocolError> {
        let request = self.request.body.as_deref().unwrap_or("").as_bytes().to_vec();
        let response = with_timeout(
            self.request.timeout_ms,
            self.invoker
                .invoke(&self.request.uri, &self.request.topic, &request),
        )
        .await?;
        Ok(Payload::now(response))
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        with_timeout(
            self.request.timeout_ms,
            self.invoker
                .invoke(&self.request.uri, &self.request.topic, payload),
        )
        .await
        .map(|_| ())
    }
}
