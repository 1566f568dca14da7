//! # 协议客户端能力模块
//!
//! 为每条绑定会话提供一个独占的协议客户端，统一走 [`ProtocolClient`]
//! 接口：
//! - **mqtt / websocket**：原生流订阅（`start_stream`）与单次读写
//! - **rest / sql / file / modbus / grpc**：单次读写，流由调度器以轮询模拟
//!
//! 描述符中的地址与载荷在进入本层之前已完成变量替换
//! （[`ResolvedRequest`]）；认证材料由 auth 层解析后注入。

mod buffer;
mod client;
mod error;
mod file;
mod grpc;
mod modbus;
mod mqtt;
mod rest;
mod sql;
mod types;
mod websocket;

pub use buffer::{stream_channel, StreamHandle, StreamSender};
pub use client::ProtocolClient;
pub use error::ProtocolError;
pub use file::FileClient;
pub use grpc::{GrpcClient, GrpcInvoker};
pub use modbus::{AddressSpec, ModbusClient, RegisterTable};
pub use mqtt::{matches_filter, MqttClient};
pub use rest::RestClient;
pub use sql::SqlClient;
pub use types::{Credentials, Payload, ResolvedRequest};
pub use websocket::WebsocketClient;

use domain::Protocol;
use std::sync::Arc;

/// 按协议构造客户端。
///
/// gRPC 需要宿主注入 [`GrpcInvoker`]；opcua 在发现阶段即被拒绝，
/// 走到这里属于配置错误。
pub fn build_client(
    protocol: Protocol,
    request: ResolvedRequest,
    credentials: Credentials,
    stream_capacity: usize,
    grpc_invoker: Option<Arc<dyn GrpcInvoker>>,
) -> Result<Box<dyn ProtocolClient>, ProtocolError> {
    match protocol {
        Protocol::Mqtt => Ok(Box::new(MqttClient::new(
            request,
            credentials,
            stream_capacity,
        ))),
        Protocol::Rest => Ok(Box::new(RestClient::new(request, credentials))),
        Protocol::Sql => Ok(Box::new(SqlClient::new(request, credentials))),
        Protocol::Websocket => Ok(Box::new(WebsocketClient::new(
            request,
            credentials,
            stream_capacity,
        ))),
        Protocol::File => Ok(Box::new(FileClient::new(request))),
        Protocol::Modbus => Ok(Box::new(ModbusClient::new(request))),
        Protocol::Grpc => match grpc_invoker {
            Some(invoker) => Ok(Box::new(GrpcClient::new(request, invoker))),
            None => Err(ProtocolError::ConfigParse(
                "grpc invoker not configured".to_string(),
            )),
        },
        Protocol::OpcUa => Err(ProtocolError::ConfigParse(
            "no client implementation for opcua".to_string(),
        )),
    }
}
