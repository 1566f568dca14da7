//! 绑定声明发现。
//!
//! 输入是外部场景图遍历产出的 (节点路径, 属性名, 原始元数据) 序列；
//! 输出是新一代描述符表和一份差量报告。发现可重入：变更通知到达时
//! 以快照整体重建（copy-on-discovery），相同元数据重建出的描述符
//! 值相等，不会惊扰已运行的会话。
//!
//! 校验失败的声明被拒绝并带上节点/属性与原因上报，不会静默丢弃；
//! 指向同一 (节点, 属性) 的重复声明全部拒绝，保证一个投递目标至多
//! 一个会话属主。

mod parse;

pub use parse::parse_metadata;

use domain::{BindingDescriptor, BindingKey};
use serde_json::{Map, Value as Json};
use sgbind_expr::Scope;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// 遍历产出的一条属性记录。
#[derive(Debug, Clone)]
pub struct AttributeRecord {
    pub node_path: String,
    pub attribute: String,
    /// 属性上的原始元数据字典。
    pub metadata: Map<String, Json>,
    /// 宿主属性的原生类型名（如 "double"、"string"），可缺省。
    pub value_type: Option<String>,
}

/// 被拒绝的绑定声明。
#[derive(Debug, Clone)]
pub struct RejectedBinding {
    pub key: BindingKey,
    pub reason: String,
}

/// 一条已发现的绑定：描述符 + 该节点的变量作用域链。
#[derive(Clone)]
pub struct DiscoveredBinding {
    pub descriptor: BindingDescriptor,
    pub scope: Arc<Scope>,
}

impl DiscoveredBinding {
    /// 连接参数等值比较：描述符值相等且作用域展平后相等。
    ///
    /// 仅当该比较为假时调度器才会重启会话。
    pub fn same_parameters(&self, other: &DiscoveredBinding) -> bool {
        self.descriptor == other.descriptor && self.scope.flatten() == other.scope.flatten()
    }
}

/// 描述符表的一代快照。
#[derive(Default, Clone)]
pub struct DescriptorStore {
    bindings: HashMap<BindingKey, DiscoveredBinding>,
}

impl DescriptorStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &BindingKey) -> Option<&DiscoveredBinding> {
        self.bindings.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BindingKey, &DiscoveredBinding)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// 一次发现的差量报告。
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub added: Vec<BindingKey>,
    pub updated: Vec<BindingKey>,
    pub unchanged: Vec<BindingKey>,
    pub removed: Vec<BindingKey>,
    pub rejected: Vec<RejectedBinding>,
}

/// 对一次完整遍历做发现，产出新描述符表与相对 `previous` 的差量。
pub fn discover(
    records: &[AttributeRecord],
    global_vars: &HashMap<String, String>,
    previous: &DescriptorStore,
) -> (DescriptorStore, DiscoveryReport) {
    let mut report = DiscoveryReport::default();

    // 第一遍：收集各节点的 context 变量
    let mut contexts: HashMap<String, HashMap<String, String>> = HashMap::new();
    for record in records {
        if let Some(Json::Object(vars)) = record.metadata.get("context") {
            let entry = contexts.entry(record.node_path.clone()).or_default();
            for (name, value) in vars {
                if let Json::String(text) = value {
                    entry.insert(name.clone(), text.clone());
                }
            }
        }
    }

    let global = Scope::root(global_vars.clone());
    let mut scope_cache: HashMap<String, Arc<Scope>> = HashMap::new();

    // 第二遍：解析绑定声明
    let mut parsed: HashMap<BindingKey, DiscoveredBinding> = HashMap::new();
    let mut duplicates: HashSet<BindingKey> = HashSet::new();
    for record in records {
        let key = BindingKey::new(record.node_path.clone(), record.attribute.clone());
        let result = match parse_metadata(&key, &record.metadata, record.value_type.as_deref()) {
            Some(result) => result,
            None => continue,
        };

        let descriptor = match result {
            Ok(descriptor) => descriptor,
            Err(reasons) => {
                let reason = reasons.join("; ");
                warn!(node = %key.node_path, attribute = %key.attribute, %reason, "binding rejected");
                report.rejected.push(RejectedBinding { key, reason });
                continue;
            }
        };

        if parsed.contains_key(&key) {
            duplicates.insert(key.clone());
            continue;
        }

        let scope = scope_cache
            .entry(record.node_path.clone())
            .or_insert_with(|| scope_for(&record.node_path, &contexts, &global))
            .clone();
        parsed.insert(key, DiscoveredBinding { descriptor, scope });
    }

    // 重复目标：全部拒绝，绝不允许两个会话抢同一个 sink 目标
    for key in duplicates {
        parsed.remove(&key);
        warn!(node = %key.node_path, attribute = %key.attribute, "duplicate binding target rejected");
        report.rejected.push(RejectedBinding {
            key,
            reason: "duplicate binding target".to_string(),
        });
    }

    // 差量
    for (key, binding) in &parsed {
        match previous.get(key) {
            None => report.added.push(key.clone()),
            Some(existing) if existing.same_parameters(binding) => {
                report.unchanged.push(key.clone())
            }
            Some(_) => report.updated.push(key.clone()),
        }
    }
    for (key, _) in previous.iter() {
        if !parsed.contains_key(key) {
            report.removed.push(key.clone());
        }
    }

    (DescriptorStore { bindings: parsed }, report)
}

/// 组装节点的作用域链：全局 -> 祖先（自根向下）-> 节点本地。
fn scope_for(
    node_path: &str,
    contexts: &HashMap<String, HashMap<String, String>>,
    global: &Arc<Scope>,
) -> Arc<Scope> {
    let mut scope = Arc::clone(global);
    let mut prefix = String::new();
    for segment in node_path.split('/').filter(|s| !s.is_empty()) {
        prefix.push('/');
        prefix.push_str(segment);
        if let Some(vars) = contexts.get(&prefix) {
            scope = Scope::child(&scope, vars.clone());
        }
    }
    scope
}
