//! 运行时错误与错误类别映射。

use domain::BindingKey;
use sgbind_auth::AuthError;
use sgbind_expr::ExprError;
use sgbind_extract::ExtractError;
use sgbind_protocol::ProtocolError;

/// 运行时错误。
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("binding not found: {0}")]
    NotFound(BindingKey),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("sink error: {0}")]
    Sink(String),
}

/// 状态看板里 `last_error.kind` 使用的类别名。
pub fn error_kind(error: &RuntimeError) -> &'static str {
    match error {
        RuntimeError::NotFound(_) => "NotFound",
        RuntimeError::Validation(_) => "ValidationError",
        RuntimeError::Expr(_) => "UnresolvedVariable",
        RuntimeError::Auth(AuthError::ProfileNotFound { .. }) => "ProfileNotFound",
        RuntimeError::Auth(AuthError::SchemeMismatch { .. }) => "SchemeMismatch",
        RuntimeError::Auth(AuthError::Provider(_)) => "ProfileNotFound",
        RuntimeError::Protocol(e) => protocol_error_kind(e),
        RuntimeError::Extract(_) => "ExtractionError",
        RuntimeError::Sink(_) => "WriteError",
    }
}

pub fn protocol_error_kind(error: &ProtocolError) -> &'static str {
    match error {
        ProtocolError::Connection(_) | ProtocolError::Io(_) => "ConnectError",
        ProtocolError::Timeout(_) => "TimeoutError",
        ProtocolError::Read(_) | ProtocolError::DataParse(_) | ProtocolError::StreamClosed => {
            "ReadError"
        }
        ProtocolError::Write(_) => "WriteError",
        ProtocolError::Unsupported { .. } => "OperationUnsupported",
        ProtocolError::ConfigParse(_) => "ValidationError",
    }
}
