//! 核心领域模型。
//!
//! 所有能力模块共享的类型：绑定描述符、协议/操作枚举与支持矩阵、
//! 值与语义类型、会话状态与绑定状态快照。本 crate 不做 I/O。

pub mod descriptor;
pub mod status;
pub mod value;

pub use descriptor::{
    supports, AuthMethod, BindingDescriptor, BindingKey, ContentKind, Operation, Protocol,
    RefreshPolicy,
};
pub use status::{BindingStatus, ErrorInfo, SessionState};
pub use value::{now_epoch_ms, Value, ValueType};
