//! payload 取值：路径抽取与语义类型约束。
//!
//! JSON 叶子保留 payload 中的原始类型，声明类型不符即
//! `TypeMismatch`（字符串不会被悄悄解析成数字）。XML 与 PLAIN 的
//! 叶子天然是文本，把文本解析进声明类型就是所需的最小强制转换，
//! 解析失败同样报 `TypeMismatch`。
//!
//! 声明边界（min/max）只做诊断：越界值照常投递，调用方负责把
//! `bounds_violation` 的结果作为 RangeViolation 上报。

mod json;
mod xml;

use domain::{ContentKind, Value, ValueType};

pub use json::extract_json;
pub use xml::extract_xml;

/// 抽取错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// payload 无法按声明格式解码。
    #[error("payload decode error: {0}")]
    Decode(String),

    /// 路径表达式本身不合法。
    #[error("invalid path expression `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    /// 路径中第一个无法解析的段。
    #[error("path not found: segment `{segment}` in `{path}`")]
    PathNotFound { path: String, segment: String },

    /// 叶子类型与声明的语义类型不符。
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
}

/// 按内容格式与路径表达式从 payload 中抽取一个值。
///
/// PLAIN 忽略路径，整个 payload 去除首尾空白后即为值。
pub fn extract(
    payload: &[u8],
    kind: ContentKind,
    path: Option<&str>,
) -> Result<Value, ExtractError> {
    match kind {
        ContentKind::Json => extract_json(payload, path),
        ContentKind::Xml => extract_xml(payload, path),
        ContentKind::Plain => {
            let text = std::str::from_utf8(payload)
                .map_err(|e| ExtractError::Decode(e.to_string()))?;
            Ok(Value::Text(text.trim().to_string()))
        }
    }
}

/// 把抽取值约束到声明的语义类型。
///
/// `textual_source` 为 true（XML/PLAIN）时允许把文本解析为
/// 数值/布尔；JSON 来源不允许。
pub fn coerce(
    value: Value,
    expected: ValueType,
    textual_source: bool,
) -> Result<Value, ExtractError> {
    let found = value.type_name();
    match expected {
        ValueType::Any => Ok(value),
        ValueType::Number => match value {
            Value::F64(v) => Ok(Value::F64(v)),
            Value::I64(v) => Ok(Value::F64(v as f64)),
            Value::Text(text) if textual_source => text
                .trim()
                .parse::<f64>()
                .map(Value::F64)
                .map_err(|_| ExtractError::TypeMismatch {
                    expected: "number",
                    found: format!("text `{}`", text),
                }),
            _ => Err(ExtractError::TypeMismatch {
                expected: "number",
                found: found.to_string(),
            }),
        },
        ValueType::Integer => match value {
            Value::I64(v) => Ok(Value::I64(v)),
            Value::F64(v) if v.fract() == 0.0 => Ok(Value::I64(v as i64)),
            Value::Text(text) if textual_source => text
                .trim()
                .parse::<i64>()
                .map(Value::I64)
                .map_err(|_| ExtractError::TypeMismatch {
                    expected: "integer",
                    found: format!("text `{}`", text),
                }),
            _ => Err(ExtractError::TypeMismatch {
                expected: "integer",
                found: found.to_string(),
            }),
        },
        ValueType::Boolean => match value {
            Value::Bool(v) => Ok(Value::Bool(v)),
            Value::Text(text) if textual_source => parse_bool(&text)
                .map(Value::Bool)
                .ok_or_else(|| ExtractError::TypeMismatch {
                    expected: "boolean",
                    found: format!("text `{}`", text),
                }),
            _ => Err(ExtractError::TypeMismatch {
                expected: "boolean",
                found: found.to_string(),
            }),
        },
        ValueType::Text => match value {
            Value::Text(v) => Ok(Value::Text(v)),
            Value::Null => Err(ExtractError::TypeMismatch {
                expected: "text",
                found: "null".to_string(),
            }),
            other => Ok(Value::Text(other.to_string())),
        },
    }
}

/// 声明边界检查：越界返回描述字符串，调用方作为 advisory 上报。
pub fn bounds_violation(value: &Value, min: Option<f64>, max: Option<f64>) -> Option<String> {
    let numeric = value.as_f64()?;
    if let Some(min) = min {
        if numeric < min {
            return Some(format!("value {} below declared minimum {}", numeric, min));
        }
    }
    if let Some(max) = max {
        if numeric > max {
            return Some(format!("value {} above declared maximum {}", numeric, max));
        }
    }
    None
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
