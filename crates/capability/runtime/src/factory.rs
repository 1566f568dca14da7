//! 客户端工厂：调度器通过它为每条会话建独占客户端，测试时注入桩。

use domain::Protocol;
use sgbind_protocol::{
    build_client, Credentials, GrpcInvoker, ProtocolClient, ProtocolError, ResolvedRequest,
};
use std::sync::Arc;

pub trait ClientFactory: Send + Sync {
    fn build(
        &self,
        protocol: Protocol,
        request: ResolvedRequest,
        credentials: Credentials,
    ) -> Result<Box<dyn ProtocolClient>, ProtocolError>;
}

/// 按协议走真实客户端实现的工厂。
pub struct DefaultClientFactory {
    pub stream_capacity: usize,
    pub grpc_invoker: Option<Arc<dyn GrpcInvoker>>,
}

impl ClientFactory for DefaultClientFactory {
    fn build(
        &self,
        protocol: Protocol,
        request: ResolvedRequest,
        credentials: Credentials,
    ) -> Result<Box<dyn ProtocolClient>, ProtocolError> {
        build_client(
            protocol,
            request,
            credentials,
            self.stream_capacity,
            self.grpc_invoker.clone(),
        )
    }
}
