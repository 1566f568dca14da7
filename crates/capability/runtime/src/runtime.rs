//! 绑定运行时：发现结果落地为会话集合，对宿主暴露
//! 状态查询、手动刷新、出站写与停机。

use crate::error::RuntimeError;
use crate::factory::ClientFactory;
use crate::session::{resolve_request, run_session, SessionConfig, SessionContext};
use crate::sink::UpdateSink;
use crate::status::StatusBoard;
use domain::{supports, BindingKey, BindingStatus, Operation, SessionState, Value};
use sgbind_auth::AuthResolver;
use sgbind_discovery::{discover, AttributeRecord, DescriptorStore, DiscoveredBinding, DiscoveryReport};
use sgbind_protocol::Credentials;
use sgbind_telemetry::{new_session_id, record_write_outbound};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

struct SessionEntry {
    stop: watch::Sender<bool>,
    refresh: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

pub struct BindingRuntime {
    config: SessionConfig,
    factory: Arc<dyn ClientFactory>,
    auth: AuthResolver,
    sink: Arc<dyn UpdateSink>,
    statuses: StatusBoard,
    store: Mutex<DescriptorStore>,
    sessions: Mutex<HashMap<BindingKey, SessionEntry>>,
}

impl BindingRuntime {
    pub fn new(
        config: SessionConfig,
        factory: Arc<dyn ClientFactory>,
        auth: AuthResolver,
        sink: Arc<dyn UpdateSink>,
    ) -> Self {
        Self {
            config,
            factory,
            auth,
            sink,
            statuses: StatusBoard::new(),
            store: Mutex::new(DescriptorStore::empty()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 对一次完整遍历做发现并调和会话集合。
    ///
    /// removed/updated 的会话先停掉；added/updated 起新会话；
    /// unchanged 的会话原样保留，不打扰正在跑的连接。
    pub async fn apply_discovery(
        &self,
        records: &[AttributeRecord],
        global_vars: &HashMap<String, String>,
    ) -> DiscoveryReport {
        let previous = self.store.lock().await.clone();
        let (next, report) = discover(records, global_vars, &previous);
        info!(
            target: "sgbind.runtime",
            added = report.added.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            removed = report.removed.len(),
            rejected = report.rejected.len(),
            "discovery_applied"
        );

        for key in &report.removed {
            self.stop_session(key).await;
            self.statuses.remove(key).await;
        }
        for key in &report.updated {
            self.stop_session(key).await;
        }
        for rejected in &report.rejected {
            self.statuses.init(rejected.key.clone()).await;
            self.statuses
                .record_error(&rejected.key, "ValidationError", &rejected.reason)
                .await;
            self.statuses
                .set_state(&rejected.key, SessionState::Failed)
                .await;
        }
        for key in report.added.iter().chain(report.updated.iter()) {
            if let Some(binding) = next.get(key) {
                self.start_session(key.clone(), binding.clone()).await;
            }
        }

        *self.store.lock().await = next;
        report
    }

    async fn start_session(&self, key: BindingKey, binding: DiscoveredBinding) {
        self.statuses.init(key.clone()).await;
        let descriptor = &binding.descriptor;
        // 未启用与 write 绑定不起后台会话
        if !descriptor.enabled || descriptor.operation == Operation::Write {
            self.statuses.set_state(&key, SessionState::Idle).await;
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (refresh_tx, refresh_rx) = mpsc::channel(4);
        let ctx = SessionContext {
            session_id: new_session_id(),
            binding,
            config: self.config.clone(),
            factory: Arc::clone(&self.factory),
            auth: self.auth.clone(),
            sink: Arc::clone(&self.sink),
            statuses: self.statuses.clone(),
            stop: stop_rx,
            refresh: refresh_rx,
        };
        let task = tokio::spawn(run_session(ctx));
        self.sessions.lock().await.insert(
            key,
            SessionEntry {
                stop: stop_tx,
                refresh: refresh_tx,
                task,
            },
        );
    }

    async fn stop_session(&self, key: &BindingKey) {
        let entry = self.sessions.lock().await.remove(key);
        if let Some(entry) = entry {
            let _ = entry.stop.send(true);
            let _ = entry.task.await;
        }
    }

    /// 手动触发一次读取（manual 刷新策略的入口；定时会话也可借此插队）。
    pub async fn refresh(&self, key: &BindingKey) -> Result<(), RuntimeError> {
        let sessions = self.sessions.lock().await;
        let entry = sessions
            .get(key)
            .ok_or_else(|| RuntimeError::NotFound(key.clone()))?;
        entry
            .refresh
            .send(())
            .await
            .map_err(|_| RuntimeError::NotFound(key.clone()))
    }

    /// 宿主驱动的一次出站写：建连接、写出、断开。
    pub async fn write_value(&self, key: &BindingKey, value: &Value) -> Result<(), RuntimeError> {
        let binding = {
            let store = self.store.lock().await;
            store
                .get(key)
                .cloned()
                .ok_or_else(|| RuntimeError::NotFound(key.clone()))?
        };
        let descriptor = &binding.descriptor;
        if !supports(descriptor.protocol, Operation::Write) {
            return Err(RuntimeError::Validation(format!(
                "protocol {:?} does not support write",
                descriptor.protocol
            )));
        }

        let request = resolve_request(
            descriptor,
            &binding.scope,
            &self.config,
            self.config.strict_variables,
        )?;
        let material = self
            .auth
            .resolve(descriptor.auth_method, descriptor.auth_profile.as_deref())
            .await?;
        let mut client =
            self.factory
                .build(descriptor.protocol, request, Credentials::from(material))?;

        client.connect().await?;
        let result = client.write(&serialize_value(value)).await;
        client.disconnect().await;
        result?;

        record_write_outbound();
        info!(
            target: "sgbind.runtime",
            node = %key.node_path,
            attribute = %key.attribute,
            value = %value,
            "value_written"
        );
        Ok(())
    }

    pub async fn status(&self, key: &BindingKey) -> Option<BindingStatus> {
        self.statuses.get(key).await
    }

    pub async fn statuses(&self) -> Vec<BindingStatus> {
        self.statuses.snapshot().await
    }

    /// 停掉全部会话。每个会话在下一个挂起点收敛到 Stopped。
    pub async fn shutdown(&self) {
        let entries: Vec<(BindingKey, SessionEntry)> =
            self.sessions.lock().await.drain().collect();
        for (_, entry) in &entries {
            let _ = entry.stop.send(true);
        }
        for (_, entry) in entries {
            let _ = entry.task.await;
        }
        info!(target: "sgbind.runtime", "runtime_shutdown");
    }
}

/// 出站值序列化：文本原样，结构化走 JSON，标量用显示形式。
fn serialize_value(value: &Value) -> Vec<u8> {
    match value {
        Value::Text(text) => text.clone().into_bytes(),
        Value::Structured(json) => serde_json::to_vec(json).unwrap_or_default(),
        other => other.to_string().into_bytes(),
    }
}
