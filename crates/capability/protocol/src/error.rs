//! 协议错误类型定义

use domain::{Operation, Protocol};

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 读取错误
    #[error("read error: {0}")]
    Read(String),

    /// 写入错误
    #[error("write error: {0}")]
    Write(String),

    /// 协议不支持该操作
    #[error("operation {operation:?} not supported by protocol {protocol:?}")]
    Unsupported {
        protocol: Protocol,
        operation: Operation,
    },

    /// 连接串/地址表达式解析错误
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// 数据解析错误
    #[error("data parse error: {0}")]
    DataParse(String),

    /// 超时错误
    #[error("timeout after {0} ms")]
    Timeout(u64),

    /// 流已关闭
    #[error("stream closed")]
    StreamClosed,
}
