//! 绑定元数据解析：三种形态，严格优先级，不跨形态补字段。
//!
//! 形态 1：`binding` 键下的完整字段字典。
//! 形态 2：以协议名为键的精简字典（如 `mqtt`），protocol 取键名。
//! 形态 3：遗留扁平命名空间 `binding_<field>`。
//!
//! 同一属性上多形态并存时 1 > 2 > 3，胜出形态未设置的字段一律取
//! 默认值而不是从低优先级形态回填，避免拼出意料之外的混合配置。

use domain::{
    AuthMethod, BindingDescriptor, BindingKey, ContentKind, Operation, Protocol, RefreshPolicy,
    ValueType,
};
use serde_json::{Map, Value as Json};
use std::str::FromStr;

/// 形态 2 可识别的协议键（固定顺序保证解析确定性）。
const PROTOCOL_KEYS: [&str; 8] = [
    "mqtt",
    "rest",
    "sql",
    "grpc",
    "websocket",
    "file",
    "modbus",
    "opcua",
];

const LEGACY_PREFIX: &str = "binding_";

/// 解析一条属性的元数据。
///
/// 返回 `None` 表示该属性不含任何绑定声明；`Some(Err(...))` 表示
/// 含声明但解析/校验失败（调用方上报拒绝原因）。
pub fn parse_metadata(
    key: &BindingKey,
    metadata: &Map<String, Json>,
    value_type: Option<&str>,
) -> Option<Result<BindingDescriptor, Vec<String>>> {
    // 形态 1
    if let Some(Json::Object(fields)) = metadata.get("binding") {
        return Some(build_descriptor(key, fields, None, value_type));
    }

    // 形态 2
    for protocol_key in PROTOCOL_KEYS {
        if let Some(Json::Object(fields)) = metadata.get(protocol_key) {
            return Some(build_descriptor(key, fields, Some(protocol_key), value_type));
        }
    }

    // 形态 3
    let mut legacy = Map::new();
    for (name, value) in metadata {
        if let Some(field) = name.strip_prefix(LEGACY_PREFIX) {
            legacy.insert(field.to_string(), value.clone());
        }
    }
    if !legacy.is_empty() {
        return Some(build_descriptor(key, &legacy, None, value_type));
    }

    None
}

fn build_descriptor(
    key: &BindingKey,
    fields: &Map<String, Json>,
    default_protocol: Option<&str>,
    value_type: Option<&str>,
) -> Result<BindingDescriptor, Vec<String>> {
    let mut errors = Vec::new();

    let protocol_name = get_str(fields, "protocol")
        .or_else(|| default_protocol.map(str::to_string))
        .unwrap_or_default();
    let protocol = match Protocol::from_str(&protocol_name) {
        Ok(p) => p,
        Err(e) => {
            errors.push(if protocol_name.is_empty() {
                "missing required field: protocol".to_string()
            } else {
                e
            });
            Protocol::Rest
        }
    };

    // 精简 mqtt 形态默认 stream，其余默认 read
    let default_operation = if default_protocol == Some("mqtt") {
        Operation::Stream
    } else {
        Operation::Read
    };
    let operation = match get_str(fields, "operation") {
        Some(name) => match Operation::from_str(&name) {
            Ok(op) => op,
            Err(e) => {
                errors.push(e);
                default_operation
            }
        },
        None => default_operation,
    };

    // 精简 mqtt 形态用 broker 表示连接地址
    let uri = get_str(fields, "uri")
        .or_else(|| get_str(fields, "broker").map(normalize_broker))
        .unwrap_or_default();

    let auth_method = match get_str(fields, "authMethod") {
        Some(name) => match AuthMethod::from_str(&name) {
            Ok(m) => m,
            Err(e) => {
                errors.push(e);
                AuthMethod::None
            }
        },
        None => AuthMethod::None,
    };

    let value_type = value_type
        .and_then(|t| ValueType::from_str(t).ok())
        .unwrap_or_default();

    let content_kind = match get_str(fields, "contentKind").as_deref() {
        Some("json") => Some(ContentKind::Json),
        Some("xml") => Some(ContentKind::Xml),
        Some("plain") | Some("text") => Some(ContentKind::Plain),
        Some(other) => {
            errors.push(format!("unknown content kind: {}", other));
            None
        }
        None => None,
    };

    let descriptor = BindingDescriptor {
        key: key.clone(),
        protocol,
        operation,
        uri,
        topic: get_str(fields, "topic")
            .or_else(|| get_str(fields, "query"))
            .unwrap_or_default(),
        body: get_str(fields, "body"),
        json_path: get_str(fields, "jsonPath").filter(|p| !p.is_empty()),
        xpath: get_str(fields, "xpath").filter(|p| !p.is_empty()),
        content_kind,
        value_type,
        min_value: get_f64(fields, "minValue", &mut errors),
        max_value: get_f64(fields, "maxValue", &mut errors),
        unit: get_str(fields, "unit").filter(|u| !u.is_empty()),
        description: get_str(fields, "description").filter(|d| !d.is_empty()),
        refresh: parse_refresh(fields, &mut errors),
        qos: get_u64(fields, "qos", &mut errors).map(|v| v.min(2) as u8).unwrap_or(0),
        retain: get_bool(fields, "retain").unwrap_or(false),
        http_method: get_str(fields, "httpMethod").filter(|m| !m.is_empty()),
        http_headers: parse_headers(fields, &mut errors),
        auth_method,
        auth_profile: get_str(fields, "authProfile").filter(|p| !p.is_empty()),
        timeout_ms: get_u64(fields, "timeout", &mut errors),
        retry_count: get_u64(fields, "retryCount", &mut errors).map(|v| v as u32),
        enabled: get_bool(fields, "enabled").unwrap_or(true),
    };

    errors.extend(descriptor.validate());
    if errors.is_empty() {
        Ok(descriptor)
    } else {
        Err(errors)
    }
}

fn parse_refresh(fields: &Map<String, Json>, errors: &mut Vec<String>) -> RefreshPolicy {
    let interval = get_u64(fields, "refreshInterval", errors);
    match get_str(fields, "refreshPolicy").as_deref() {
        Some("interval") | None => RefreshPolicy::IntervalMs(interval.unwrap_or(5000)),
        Some("on_change") | Some("onChange") => RefreshPolicy::OnChange,
        Some("manual") => RefreshPolicy::Manual,
        Some("on_create") | Some("onCreate") => RefreshPolicy::OnCreate,
        Some(other) => {
            errors.push(format!("unknown refresh policy: {}", other));
            RefreshPolicy::IntervalMs(interval.unwrap_or(5000))
        }
    }
}

fn parse_headers(fields: &Map<String, Json>, errors: &mut Vec<String>) -> Vec<(String, String)> {
    match fields.get("httpHeaders") {
        None => Vec::new(),
        Some(Json::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| scalar_to_string(v).map(|v| (k.clone(), v)))
            .collect(),
        Some(_) => {
            errors.push("httpHeaders must be an object".to_string());
            Vec::new()
        }
    }
}

/// `host:port` 形态的 broker 地址补全为 mqtt URI。
fn normalize_broker(broker: String) -> String {
    if broker.contains("://") {
        broker
    } else {
        format!("mqtt://{}", broker)
    }
}

fn get_str(fields: &Map<String, Json>, name: &str) -> Option<String> {
    fields.get(name).and_then(scalar_to_string)
}

fn scalar_to_string(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn get_bool(fields: &Map<String, Json>, name: &str) -> Option<bool> {
    match fields.get(name)? {
        Json::Bool(b) => Some(*b),
        Json::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        Json::Number(n) => Some(n.as_i64().unwrap_or(0) != 0),
        _ => None,
    }
}

fn get_u64(fields: &Map<String, Json>, name: &str, errors: &mut Vec<String>) -> Option<u64> {
    match fields.get(name)? {
        Json::Number(n) => match n.as_u64() {
            Some(v) => Some(v),
            None => {
                errors.push(format!("field {} must be a non-negative integer", name));
                None
            }
        },
        Json::String(s) => match s.parse::<u64>() {
            Ok(v) => Some(v),
            Err(_) => {
                errors.push(format!("field {} must be a non-negative integer", name));
                None
            }
        },
        _ => {
            errors.push(format!("field {} must be a non-negative integer", name));
            None
        }
    }
}

fn get_f64(fields: &Map<String, Json>, name: &str, errors: &mut Vec<String>) -> Option<f64> {
    match fields.get(name)? {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => match s.parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                errors.push(format!("field {} must be numeric", name));
                None
            }
        },
        _ => {
            errors.push(format!("field {} must be numeric", name));
            None
        }
    }
}
