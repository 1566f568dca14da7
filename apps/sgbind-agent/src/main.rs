//! 绑定代理进程：加载场景导出，对发现到的绑定起会话，
//! 直到收到 Ctrl-C 后停机。

mod input;

use sgbind_auth::{AuthResolver, StaticCredentialProvider};
use sgbind_config::AppConfig;
use sgbind_runtime::{BindingRuntime, DefaultClientFactory, SessionConfig, TracingSink};
use sgbind_telemetry::init_tracing;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let (records, mut globals) = input::load_scene(&config.scene_file)?;
    // 环境里的全局变量覆盖场景文件里的同名项
    for (name, value) in &config.global_vars {
        globals.insert(name.clone(), value.clone());
    }

    let provider = match &config.profiles_file {
        Some(path) => input::load_profiles(path)?,
        None => StaticCredentialProvider::new(),
    };

    let session_config = SessionConfig {
        default_timeout_ms: config.default_timeout_ms,
        default_retry_count: config.default_retry_count,
        default_poll_interval_ms: config.default_poll_interval_ms,
        backoff_base_ms: config.backoff_base_ms,
        backoff_cap_ms: config.backoff_cap_ms,
        failure_threshold: config.failure_threshold,
        strict_variables: config.strict_variables,
    };
    let factory = Arc::new(DefaultClientFactory {
        stream_capacity: config.stream_buffer_capacity,
        grpc_invoker: None,
    });
    let runtime = BindingRuntime::new(
        session_config,
        factory,
        AuthResolver::new(Arc::new(provider)),
        Arc::new(TracingSink),
    );

    let report = runtime.apply_discovery(&records, &globals).await;
    info!(
        target: "sgbind.agent",
        scene = %config.scene_file,
        added = report.added.len(),
        rejected = report.rejected.len(),
        "agent_started"
    );
    for rejected in &report.rejected {
        warn!(
            target: "sgbind.agent",
            node = %rejected.key.node_path,
            attribute = %rejected.key.attribute,
            reason = %rejected.reason,
            "binding_rejected"
        );
    }

    tokio::signal::ctrl_c().await?;
    info!(target: "sgbind.agent", "shutdown_signal");
    runtime.shutdown().await;
    Ok(())
}
