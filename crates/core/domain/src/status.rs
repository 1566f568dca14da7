//! 会话状态与对外状态快照。

use crate::descriptor::BindingKey;
use crate::value::Value;
use serde::Serialize;
use std::fmt;

/// 会话状态机的状态集合。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Resolving,
    Connecting,
    Streaming,
    Polling,
    ReadOnce,
    Retrying,
    Failed,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Resolving => "resolving",
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Polling => "polling",
            SessionState::ReadOnce => "read_once",
            SessionState::Retrying => "retrying",
            SessionState::Failed => "failed",
            SessionState::Stopped => "stopped",
        }
    }

    /// 终态：不再有连接活动。
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Stopped)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 最近一次错误的种类与描述。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// 单条绑定的可观测状态（供外部监控 UI 轮询）。
#[derive(Debug, Clone, Serialize)]
pub struct BindingStatus {
    pub key: BindingKey,
    pub state: SessionState,
    pub last_value: Option<Value>,
    pub last_update_ms: Option<i64>,
    pub last_error: Option<ErrorInfo>,
    pub consecutive_failures: u32,
    /// 本会话累计投递的更新数。
    pub delivered: u64,
    /// 越界（advisory）标记次数。
    pub range_violations: u64,
}

impl BindingStatus {
    pub fn new(key: BindingKey) -> Self {
        Self {
            key,
            state: SessionState::Idle,
            last_value: None,
            last_update_ms: None,
            last_error: None,
            consecutive_failures: 0,
            delivered: 0,
            range_violations: 0,
        }
    }
}
