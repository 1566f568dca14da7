//! # 会话调度能力模块
//!
//! 把发现层产出的绑定描述符落地为并发会话：每条启用的绑定一个
//! 任务，独立做连接、重试退避、流消费或定时轮询，值经抽取与类型
//! 约束后交给宿主注入的 [`UpdateSink`]。
//!
//! ## 架构
//!
//! ```text
//! AttributeRecord 遍历
//!       │
//!       ▼
//! BindingRuntime::apply_discovery
//!       │ (diff: added/updated/unchanged/removed/rejected)
//!       ▼
//! Session 任务 ── ClientFactory ──> ProtocolClient
//!       │
//!       ▼
//! extract -> coerce -> bounds -> UpdateSink::apply
//! ```

mod error;
mod factory;
mod runtime;
mod session;
mod sink;
mod status;

pub use error::{error_kind, RuntimeError};
pub use factory::{ClientFactory, DefaultClientFactory};
pub use runtime::BindingRuntime;
pub use session::SessionConfig;
pub use sink::{AttributeUpdate, TracingSink, UpdateSink};
pub use status::StatusBoard;
