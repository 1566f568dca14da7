//! 单条绑定的会话状态机。
//!
//! `Idle -> Resolving -> Connecting -> {Streaming | Polling | ReadOnce}
//!  -> Retrying -> (回 Connecting) | Failed | Stopped`
//!
//! 解析失败（变量缺失、凭据缺失）不重试，直接 Failed，等下一次
//! 发现重建。连接失败走指数退避，最多 `retry_count` 次 Retrying，
//! 之后 Failed 终结；一次性读取的读失败占用同一份重试预算。单条
//! 消息的抽取失败只记日志与计数，不离开流/轮询状态；连续失败到
//! 阈值才回到重连。
//!
//! 所有挂起点（握手、轮询定时器、下一条流消息、退避睡眠）都同时
//! 监听停止信号，收到后在下一个挂起点直接进入 Stopped。

use crate::error::{error_kind, protocol_error_kind, RuntimeError};
use crate::factory::ClientFactory;
use crate::sink::{AttributeUpdate, UpdateSink};
use crate::status::StatusBoard;
use domain::{
    BindingDescriptor, BindingKey, ContentKind, Operation, RefreshPolicy, SessionState, Value,
};
use sgbind_auth::AuthResolver;
use sgbind_discovery::DiscoveredBinding;
use sgbind_expr::{resolve, resolve_lenient, ExprError, Scope};
use sgbind_extract::{bounds_violation, coerce, extract};
use sgbind_protocol::{Credentials, Payload, ProtocolClient, ProtocolError, ResolvedRequest};
use sgbind_telemetry::{
    record_buffer_overflow, record_connect_retry, record_extraction_failure,
    record_range_violation, record_session_failed, record_session_started,
    record_session_stopped, record_update_delivered,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// 会话层运行参数（描述符未指定时的默认值与全局阈值）。
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub default_timeout_ms: u64,
    pub default_retry_count: u32,
    pub default_poll_interval_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub failure_threshold: u32,
    pub strict_variables: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000,
            default_retry_count: 3,
            default_poll_interval_ms: 5_000,
            backoff_base_ms: 500,
            backoff_cap_ms: 30_000,
            failure_threshold: 5,
            strict_variables: true,
        }
    }
}

pub(crate) struct SessionContext {
    pub session_id: String,
    pub binding: DiscoveredBinding,
    pub config: SessionConfig,
    pub factory: Arc<dyn ClientFactory>,
    pub auth: AuthResolver,
    pub sink: Arc<dyn UpdateSink>,
    pub statuses: StatusBoard,
    pub stop: watch::Receiver<bool>,
    pub refresh: mpsc::Receiver<()>,
}

/// 活动状态退出后的去向。
enum Outcome {
    Stopped,
    Done,
    Failed,
    Reconnect,
}

/// 会话运行形态，由 operation 与 refresh 策略共同决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    NativeStream,
    Poll { interval_ms: u64, on_change: bool },
    ManualPoll,
    ReadOnce,
}

fn session_mode(descriptor: &BindingDescriptor, config: &SessionConfig) -> Mode {
    let poll_mode = |refresh: &RefreshPolicy| match refresh {
        RefreshPolicy::IntervalMs(ms) => Mode::Poll {
            interval_ms: *ms,
            on_change: false,
        },
        RefreshPolicy::OnChange => Mode::Poll {
            interval_ms: config.default_poll_interval_ms,
            on_change: true,
        },
        RefreshPolicy::Manual => Mode::ManualPoll,
        RefreshPolicy::OnCreate => Mode::ReadOnce,
    };

    match descriptor.operation {
        // read 单发单收，刷新策略不改变其一次性语义
        Operation::Read => Mode::ReadOnce,
        Operation::Poll => poll_mode(&descriptor.refresh),
        Operation::Stream | Operation::Subscribe => {
            if descriptor.protocol.streams_natively() {
                Mode::NativeStream
            } else {
                poll_mode(&descriptor.refresh)
            }
        }
        // write 绑定不起后台会话，由宿主按需调用
        Operation::Write => Mode::ReadOnce,
    }
}

pub(crate) async fn run_session(mut ctx: SessionContext) {
    let key = ctx.binding.descriptor.key.clone();
    record_session_started();
    info!(
        target: "sgbind.session",
        session_id = %ctx.session_id,
        node = %key.node_path,
        attribute = %key.attribute,
        protocol = ?ctx.binding.descriptor.protocol,
        operation = ?ctx.binding.descriptor.operation,
        "session_started"
    );

    // Resolving：变量与凭据；失败不重试
    ctx.statuses.set_state(&key, SessionState::Resolving).await;
    let request = match resolve_request(
        &ctx.binding.descriptor,
        &ctx.binding.scope,
        &ctx.config,
        ctx.config.strict_variables,
    ) {
        Ok(request) => request,
        Err(error) => {
            fail_session(&ctx, &key, &RuntimeError::Expr(error)).await;
            return;
        }
    };
    let credentials = match ctx
        .auth
        .resolve(
            ctx.binding.descriptor.auth_method,
            ctx.binding.descriptor.auth_profile.as_deref(),
        )
        .await
    {
        Ok(material) => Credentials::from(material),
        Err(error) => {
            fail_session(&ctx, &key, &RuntimeError::Auth(error)).await;
            return;
        }
    };

    let mode = session_mode(&ctx.binding.descriptor, &ctx.config);
    let retry_count = ctx
        .binding
        .descriptor
        .retry_count
        .unwrap_or(ctx.config.default_retry_count);
    // 一次性读取没有流/轮询的常驻语义，重连次数受 retry_count 约束
    let mut read_retries: u32 = 0;

    loop {
        // Connecting（带退避重试）
        let mut client =
            match connect_with_retry(&mut ctx, &key, &request, &credentials, retry_count).await {
                ConnectResult::Connected(client) => client,
                ConnectResult::Stopped => {
                    finish_stopped(&ctx, &key).await;
                    return;
                }
                ConnectResult::Failed => {
                    finish_failed(&ctx, &key).await;
                    return;
                }
            };

        let outcome = match mode {
            Mode::NativeStream => run_stream(&mut ctx, &key, client.as_mut()).await,
            Mode::Poll {
                interval_ms,
                on_change,
            } => run_poll(&mut ctx, &key, client.as_mut(), Some(interval_ms), on_change).await,
            Mode::ManualPoll => run_poll(&mut ctx, &key, client.as_mut(), None, false).await,
            Mode::ReadOnce => run_read_once(&mut ctx, &key, client.as_mut()).await,
        };

        client.disconnect().await;

        match outcome {
            Outcome::Stopped | Outcome::Done => {
                finish_stopped(&ctx, &key).await;
                return;
            }
            Outcome::Failed => {
                finish_failed(&ctx, &key).await;
                return;
            }
            Outcome::Reconnect => {
                let backoff = if mode == Mode::ReadOnce {
                    read_retries += 1;
                    if read_retries > retry_count {
                        finish_failed(&ctx, &key).await;
                        return;
                    }
                    backoff_ms(
                        ctx.config.backoff_base_ms,
                        ctx.config.backoff_cap_ms,
                        read_retries,
                    )
                } else {
                    ctx.config.backoff_base_ms
                };
                ctx.statuses.set_state(&key, SessionState::Retrying).await;
                record_connect_retry();
                if !cancellable_sleep(&mut ctx.stop, backoff).await {
                    finish_stopped(&ctx, &key).await;
                    return;
                }
            }
        }
    }
}

enum ConnectResult {
    Connected(Box<dyn ProtocolClient>),
    Stopped,
    Failed,
}

/// 连接阶段：失败 n 次（n <= retry_count）转 Retrying 退避后重连，
/// 第 retry_count + 1 次失败终结为 Failed。
async fn connect_with_retry(
    ctx: &mut SessionContext,
    key: &BindingKey,
    request: &ResolvedRequest,
    credentials: &Credentials,
    retry_count: u32,
) -> ConnectResult {
    let mut failures: u32 = 0;
    loop {
        ctx.statuses.set_state(key, SessionState::Connecting).await;
        let mut client = match ctx.factory.build(
            ctx.binding.descriptor.protocol,
            request.clone(),
            credentials.clone(),
        ) {
            Ok(client) => client,
            Err(error) => {
                // 工厂失败属于配置问题，不重试
                ctx.statuses
                    .record_error(key, protocol_error_kind(&error), &error.to_string())
                    .await;
                return ConnectResult::Failed;
            }
        };

        match client.connect().await {
            Ok(()) => return ConnectResult::Connected(client),
            Err(error) => {
                failures += 1;
                ctx.statuses
                    .record_error(key, protocol_error_kind(&error), &error.to_string())
                    .await;
                if failures > retry_count {
                    warn!(
                        target: "sgbind.session",
                        session_id = %ctx.session_id,
                        node = %key.node_path,
                        attribute = %key.attribute,
                        attempts = failures,
                        error = %error,
                        "session_connect_exhausted"
                    );
                    return ConnectResult::Failed;
                }

                ctx.statuses.set_state(key, SessionState::Retrying).await;
                record_connect_retry();
                let backoff = backoff_ms(
                    ctx.config.backoff_base_ms,
                    ctx.config.backoff_cap_ms,
                    failures,
                );
                debug!(
                    target: "sgbind.session",
                    session_id = %ctx.session_id,
                    attempt = failures,
                    backoff_ms = backoff,
                    "session_retrying"
                );
                if !cancellable_sleep(&mut ctx.stop, backoff).await {
                    return ConnectResult::Stopped;
                }
            }
        }
    }
}

/// 指数退避：base * 2^(attempt-1)，封顶 cap。
fn backoff_ms(base: u64, cap: u64, attempt: u32) -> u64 {
    let shift = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u64 << shift).min(cap.max(base))
}

async fn run_stream(
    ctx: &mut SessionContext,
    key: &BindingKey,
    client: &mut dyn ProtocolClient,
) -> Outcome {
    let mut handle = match client.start_stream().await {
        Ok(handle) => handle,
        Err(error @ ProtocolError::Unsupported { .. }) => {
            // 能力缺口对该描述符是致命的，报告一次即终结
            ctx.statuses
                .record_error(key, protocol_error_kind(&error), &error.to_string())
                .await;
            return Outcome::Failed;
        }
        Err(error) => {
            ctx.statuses
                .record_error(key, protocol_error_kind(&error), &error.to_string())
                .await;
            return Outcome::Reconnect;
        }
    };

    ctx.statuses.set_state(key, SessionState::Streaming).await;
    let mut extraction_failures: u32 = 0;
    let mut seen_overflow: u64 = 0;

    loop {
        let message = tokio::select! {
            _ = ctx.stop.changed() => {
                handle.stop();
                return Outcome::Stopped;
            }
            message = handle.next() => message,
        };

        let payload = match message {
            Some(payload) => payload,
            // 流结束：回到重连
            None => return Outcome::Reconnect,
        };

        let overflow = handle.overflow_count();
        while seen_overflow < overflow {
            record_buffer_overflow();
            seen_overflow += 1;
        }

        match deliver(ctx, key, payload).await {
            Ok(()) => extraction_failures = 0,
            Err(fatal) => {
                if fatal {
                    return Outcome::Failed;
                }
                extraction_failures += 1;
                if extraction_failures >= ctx.config.failure_threshold {
                    return Outcome::Reconnect;
                }
            }
        }
    }
}

async fn run_poll(
    ctx: &mut SessionContext,
    key: &BindingKey,
    client: &mut dyn ProtocolClient,
    interval_ms: Option<u64>,
    on_change: bool,
) -> Outcome {
    ctx.statuses.set_state(key, SessionState::Polling).await;
    let mut consecutive_failures: u32 = 0;
    let mut last_delivered: Option<Value> = None;

    // 手动刷新会话先挂起等触发，定时会话立刻读第一轮
    let mut wait_first = interval_ms.is_none();

    loop {
        if wait_first {
            wait_first = false;
        } else {
            match client.read().await {
                Ok(payload) => match deliver_deduped(ctx, key, payload, on_change, &mut last_delivered)
                    .await
                {
                    Ok(()) => consecutive_failures = 0,
                    Err(fatal) => {
                        if fatal {
                            return Outcome::Failed;
                        }
                        consecutive_failures += 1;
                    }
                },
                Err(error) => {
                    consecutive_failures += 1;
                    ctx.statuses
                        .record_error(key, protocol_error_kind(&error), &error.to_string())
                        .await;
                    warn!(
                        target: "sgbind.session",
                        session_id = %ctx.session_id,
                        node = %key.node_path,
                        attribute = %key.attribute,
                        failures = consecutive_failures,
                        error = %error,
                        "session_poll_read_failed"
                    );
                }
            }
            if consecutive_failures >= ctx.config.failure_threshold {
                return Outcome::Reconnect;
            }
        }

        match interval_ms {
            Some(interval) => {
                tokio::select! {
                    _ = ctx.stop.changed() => return Outcome::Stopped,
                    _ = tokio::time::sleep(Duration::from_millis(interval)) => {}
                    // 手动触发插队，立即读一轮
                    Some(_) = ctx.refresh.recv() => {}
                }
            }
            None => {
                tokio::select! {
                    _ = ctx.stop.changed() => return Outcome::Stopped,
                    trigger = ctx.refresh.recv() => {
                        if trigger.is_none() {
                            return Outcome::Stopped;
                        }
                    }
                }
            }
        }
    }
}

async fn run_read_once(
    ctx: &mut SessionContext,
    key: &BindingKey,
    client: &mut dyn ProtocolClient,
) -> Outcome {
    ctx.statuses.set_state(key, SessionState::ReadOnce).await;
    match client.read().await {
        Ok(payload) => match deliver(ctx, key, payload).await {
            Ok(()) => Outcome::Done,
            // 单发读取没有下一条消息可等，抽取失败即失败
            Err(_) => Outcome::Failed,
        },
        Err(error) => {
            ctx.statuses
                .record_error(key, protocol_error_kind(&error), &error.to_string())
                .await;
            Outcome::Reconnect
        }
    }
}

/// 抽取、约束、投递一条载荷。
///
/// `Err(true)` 表示致命错误（sink 拒绝），`Err(false)` 为可跳过的
/// 单条失败。
async fn deliver(ctx: &SessionContext, key: &BindingKey, payload: Payload) -> Result<(), bool> {
    deliver_deduped(ctx, key, payload, false, &mut None).await
}

async fn deliver_deduped(
    ctx: &SessionContext,
    key: &BindingKey,
    payload: Payload,
    on_change: bool,
    last_delivered: &mut Option<Value>,
) -> Result<(), bool> {
    let descriptor = &ctx.binding.descriptor;
    let kind = descriptor.effective_content_kind();
    let path = match kind {
        ContentKind::Json => descriptor.json_path.as_deref(),
        ContentKind::Xml => descriptor.xpath.as_deref(),
        ContentKind::Plain => None,
    };

    let value = extract(&payload.bytes, kind, path)
        .and_then(|raw| coerce(raw, descriptor.value_type, kind != ContentKind::Json));
    let value = match value {
        Ok(value) => value,
        Err(error) => {
            record_extraction_failure();
            ctx.statuses
                .record_error(key, "ExtractionError", &error.to_string())
                .await;
            warn!(
                target: "sgbind.session",
                session_id = %ctx.session_id,
                node = %key.node_path,
                attribute = %key.attribute,
                error = %error,
                "extraction_failed"
            );
            return Err(false);
        }
    };

    if on_change {
        if last_delivered.as_ref() == Some(&value) {
            return Ok(());
        }
        *last_delivered = Some(value.clone());
    }

    // 越界只标记不拦截
    let violation = bounds_violation(&value, descriptor.min_value, descriptor.max_value);
    if let Some(description) = &violation {
        record_range_violation();
        warn!(
            target: "sgbind.session",
            session_id = %ctx.session_id,
            node = %key.node_path,
            attribute = %key.attribute,
            violation = %description,
            "range_violation"
        );
    }

    let update = AttributeUpdate {
        key: key.clone(),
        value: value.clone(),
        unit: descriptor.unit.clone(),
        range_violation: violation.clone(),
        timestamp_ms: payload.received_at_ms,
        session_id: ctx.session_id.clone(),
    };
    if let Err(message) = ctx.sink.apply(update).await {
        ctx.statuses.record_error(key, "WriteError", &message).await;
        warn!(
            target: "sgbind.session",
            session_id = %ctx.session_id,
            node = %key.node_path,
            attribute = %key.attribute,
            error = %message,
            "sink_apply_failed"
        );
        return Err(true);
    }

    record_update_delivered();
    ctx.statuses
        .record_delivery(key, value, payload.received_at_ms, violation.is_some())
        .await;
    Ok(())
}

async fn fail_session(ctx: &SessionContext, key: &BindingKey, error: &RuntimeError) {
    warn!(
        target: "sgbind.session",
        session_id = %ctx.session_id,
        node = %key.node_path,
        attribute = %key.attribute,
        kind = error_kind(error),
        error = %error,
        "session_failed"
    );
    ctx.statuses
        .record_error(key, error_kind(error), &error.to_string())
        .await;
    ctx.statuses.set_state(key, SessionState::Failed).await;
    record_session_failed();
}

async fn finish_failed(ctx: &SessionContext, key: &BindingKey) {
    ctx.statuses.set_state(key, SessionState::Failed).await;
    record_session_failed();
    warn!(
        target: "sgbind.session",
        session_id = %ctx.session_id,
        node = %key.node_path,
        attribute = %key.attribute,
        "session_failed"
    );
}

async fn finish_stopped(ctx: &SessionContext, key: &BindingKey) {
    ctx.statuses.set_state(key, SessionState::Stopped).await;
    record_session_stopped();
    info!(
        target: "sgbind.session",
        session_id = %ctx.session_id,
        node = %key.node_path,
        attribute = %key.attribute,
        "session_stopped"
    );
}

/// 可取消的睡眠；返回 false 表示停止信号已触发。
async fn cancellable_sleep(stop: &mut watch::Receiver<bool>, ms: u64) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => true,
        _ = stop.changed() => false,
    }
}

/// 把描述符中带 `${var}` 的字段按作用域链落成字面请求。
pub(crate) fn resolve_request(
    descriptor: &BindingDescriptor,
    scope: &Scope,
    config: &SessionConfig,
    strict: bool,
) -> Result<ResolvedRequest, ExprError> {
    let resolve_field = |template: &str| -> Result<String, ExprError> {
        if strict {
            resolve(template, scope)
        } else {
            let (text, missing) = resolve_lenient(template, scope);
            for name in missing {
                warn!(target: "sgbind.session", variable = %name, template = %template, "unresolved_variable_blanked");
            }
            Ok(text)
        }
    };

    let mut headers = Vec::with_capacity(descriptor.http_headers.len());
    for (name, value) in &descriptor.http_headers {
        headers.push((name.clone(), resolve_field(value)?));
    }

    Ok(ResolvedRequest {
        uri: resolve_field(&descriptor.uri)?,
        topic: resolve_field(&descriptor.topic)?,
        body: descriptor
            .body
            .as_deref()
            .map(resolve_field)
            .transpose()?,
        http_method: descriptor.http_method.clone(),
        headers,
        qos: descriptor.qos,
        retain: descriptor.retain,
        timeout_ms: descriptor.timeout_ms.unwrap_or(config.default_timeout_ms),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_ms(500, 30_000, 1), 500);
        assert_eq!(backoff_ms(500, 30_000, 2), 1_000);
        assert_eq!(backoff_ms(500, 30_000, 3), 2_000);
        assert_eq!(backoff_ms(500, 30_000, 10), 30_000);
    }

    #[test]
    fn read_operation_is_one_shot() {
        let mut descriptor = BindingDescriptor {
            key: BindingKey::new("/a", "v"),
            protocol: domain::Protocol::Rest,
            operation: Operation::Read,
            refresh: RefreshPolicy::IntervalMs(1000),
            ..test_descriptor()
        };
        assert_eq!(session_mode(&descriptor, &SessionConfig::default()), Mode::ReadOnce);

        descriptor.operation = Operation::Poll;
        assert_eq!(
            session_mode(&descriptor, &SessionConfig::default()),
            Mode::Poll {
                interval_ms: 1000,
                on_change: false
            }
        );
    }

    #[test]
    fn stream_falls_back_to_poll_for_non_native_protocols() {
        let descriptor = BindingDescriptor {
            key: BindingKey::new("/a", "v"),
            protocol: domain::Protocol::Rest,
            operation: Operation::Stream,
            refresh: RefreshPolicy::IntervalMs(2_500),
            ..test_descriptor()
        };
        assert_eq!(
            session_mode(&descriptor, &SessionConfig::default()),
            Mode::Poll {
                interval_ms: 2_500,
                on_change: false
            }
        );

        let descriptor = BindingDescriptor {
            protocol: domain::Protocol::Mqtt,
            ..descriptor
        };
        assert_eq!(
            session_mode(&descriptor, &SessionConfig::default()),
            Mode::NativeStream
        );
    }

    fn test_descriptor() -> BindingDescriptor {
        BindingDescriptor {
            key: BindingKey::new("/a", "v"),
            protocol: domain::Protocol::Rest,
            operation: Operation::Read,
            uri: "https://example/v".to_string(),
            topic: String::new(),
            body: None,
            json_path: None,
            xpath: None,
            content_kind: None,
            value_type: domain::ValueType::Any,
            min_value: None,
            max_value: None,
            unit: None,
            description: None,
            refresh: RefreshPolicy::IntervalMs(5_000),
            qos: 0,
            retain: false,
            http_method: None,
            http_headers: Vec::new(),
            auth_method: domain::AuthMethod::None,
            auth_profile: None,
            timeout_ms: None,
            retry_count: None,
            enabled: true,
        }
    }
}
