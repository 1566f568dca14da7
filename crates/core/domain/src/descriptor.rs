//! 绑定描述符与协议/操作枚举。

use crate::value::ValueType;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// 绑定目标：场景图节点路径 + 属性名。
///
/// 同一目标最多允许一个启用的绑定（发现阶段去重）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BindingKey {
    pub node_path: String,
    pub attribute: String,
}

impl BindingKey {
    pub fn new(node_path: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            node_path: node_path.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node_path, self.attribute)
    }
}

/// 支持的协议集合（封闭枚举）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Mqtt,
    Rest,
    Sql,
    Grpc,
    Websocket,
    File,
    Modbus,
    OpcUa,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Mqtt => "mqtt",
            Protocol::Rest => "rest",
            Protocol::Sql => "sql",
            Protocol::Grpc => "grpc",
            Protocol::Websocket => "websocket",
            Protocol::File => "file",
            Protocol::Modbus => "modbus",
            Protocol::OpcUa => "opcua",
        }
    }

    /// 原生支持连续推送的协议；其余协议的 stream 由调度器以轮询模拟。
    pub fn streams_natively(&self) -> bool {
        matches!(self, Protocol::Mqtt | Protocol::Websocket)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mqtt" => Ok(Protocol::Mqtt),
            "rest" | "http" => Ok(Protocol::Rest),
            "sql" => Ok(Protocol::Sql),
            "grpc" => Ok(Protocol::Grpc),
            "websocket" | "ws" => Ok(Protocol::Websocket),
            "file" => Ok(Protocol::File),
            "modbus" => Ok(Protocol::Modbus),
            "opcua" => Ok(Protocol::OpcUa),
            other => Err(format!("unknown protocol: {}", other)),
        }
    }
}

/// 绑定操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Write,
    Stream,
    Subscribe,
    Poll,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Stream => "stream",
            Operation::Subscribe => "subscribe",
            Operation::Poll => "poll",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Operation::Read),
            "write" => Ok(Operation::Write),
            "stream" => Ok(Operation::Stream),
            "subscribe" => Ok(Operation::Subscribe),
            "poll" => Ok(Operation::Poll),
            other => Err(format!("unknown operation: {}", other)),
        }
    }
}

/// 协议 × 操作支持矩阵。
///
/// opcua 为声明保留项：本构建不含驱动，任何组合都不支持，
/// 发现阶段据此显式拒绝而非静默忽略。
pub fn supports(protocol: Protocol, operation: Operation) -> bool {
    use Operation::*;
    match protocol {
        Protocol::Mqtt | Protocol::Websocket => {
            matches!(operation, Read | Write | Stream | Subscribe)
        }
        Protocol::Rest | Protocol::Sql | Protocol::Grpc | Protocol::File | Protocol::Modbus => {
            matches!(operation, Read | Write | Poll | Stream)
        }
        Protocol::OpcUa => false,
    }
}

/// 刷新策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// 按固定间隔（毫秒）重新拉取。
    IntervalMs(u64),
    /// 按间隔拉取，但仅在值变化时投递。
    OnChange,
    /// 仅在宿主显式触发时拉取。
    Manual,
    /// 会话创建时拉取一次。
    OnCreate,
}

/// 认证方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    Basic,
    Bearer,
    ApiKey,
    OAuth2,
    Mtls,
    Cert,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::Basic => "basic",
            AuthMethod::Bearer => "bearer",
            AuthMethod::ApiKey => "apikey",
            AuthMethod::OAuth2 => "oauth2",
            AuthMethod::Mtls => "mtls",
            AuthMethod::Cert => "cert",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(AuthMethod::None),
            "basic" => Ok(AuthMethod::Basic),
            "bearer" => Ok(AuthMethod::Bearer),
            "apikey" | "api_key" => Ok(AuthMethod::ApiKey),
            "oauth2" => Ok(AuthMethod::OAuth2),
            "mtls" => Ok(AuthMethod::Mtls),
            "cert" => Ok(AuthMethod::Cert),
            other => Err(format!("unknown auth method: {}", other)),
        }
    }
}

/// payload 内容格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Json,
    Xml,
    Plain,
}

/// 一条属性到外部数据源的绑定声明。
///
/// `uri`/`topic`/`body` 可含 `${var}` 引用，会话解析阶段用作用域链
/// 替换；连接发起前必须完成全部替换。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingDescriptor {
    pub key: BindingKey,
    pub protocol: Protocol,
    pub operation: Operation,
    /// 连接 URI 模板（broker 地址、HTTP 端点、连接串、文件路径等）。
    pub uri: String,
    /// 主题/查询/地址表达式（按协议解释：MQTT 主题、SQL 查询、
    /// gRPC 方法、Modbus 地址表达式）。
    pub topic: String,
    /// 出方向请求体模板（write / grpc 请求）。
    pub body: Option<String>,
    /// JSON 抽取路径（`$.a.b[0]` 形态）。
    pub json_path: Option<String>,
    /// XML 抽取路径（`/a/b/@attr` 形态）。
    pub xpath: Option<String>,
    /// 显式指定 payload 内容格式；缺省按路径字段推断。
    pub content_kind: Option<ContentKind>,
    /// 宿主属性声明的语义类型。
    pub value_type: ValueType,
    /// 声明边界（仅诊断用途，越界仍投递）。
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub refresh: RefreshPolicy,
    pub qos: u8,
    pub retain: bool,
    pub http_method: Option<String>,
    pub http_headers: Vec<(String, String)>,
    pub auth_method: AuthMethod,
    pub auth_profile: Option<String>,
    pub timeout_ms: Option<u64>,
    pub retry_count: Option<u32>,
    pub enabled: bool,
}

impl BindingDescriptor {
    /// 抽取用的内容格式：显式声明优先，其次按路径字段推断。
    pub fn effective_content_kind(&self) -> ContentKind {
        if let Some(kind) = self.content_kind {
            return kind;
        }
        if self.json_path.is_some() {
            ContentKind::Json
        } else if self.xpath.is_some() {
            ContentKind::Xml
        } else {
            ContentKind::Plain
        }
    }

    /// 校验描述符不变量，返回全部违规项。
    ///
    /// 空列表即合法；发现阶段把非空结果整体上报为拒绝原因。
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !supports(self.protocol, self.operation) {
            errors.push(format!(
                "unsupported protocol/operation combination: {}/{}",
                self.protocol, self.operation
            ));
        }
        if self.uri.trim().is_empty() {
            errors.push("missing required field: uri".to_string());
        }
        match self.protocol {
            Protocol::Mqtt | Protocol::Websocket
                if matches!(self.operation, Operation::Stream | Operation::Subscribe)
                    && self.protocol == Protocol::Mqtt
                    && self.topic.trim().is_empty() =>
            {
                errors.push("mqtt streaming requires a topic".to_string());
            }
            Protocol::Sql | Protocol::Grpc if self.topic.trim().is_empty() => {
                errors.push(format!("{} binding requires a query/method", self.protocol));
            }
            _ => {}
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                errors.push(format!("invalid bounds: min {} > max {}", min, max));
            }
        }
        if self.auth_method != AuthMethod::None && self.auth_profile.is_none() {
            errors.push(format!(
                "auth method {} requires an auth profile",
                self.auth_method
            ));
        }

        errors
    }
}
