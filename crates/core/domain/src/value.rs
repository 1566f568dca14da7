//! 抽取结果的值与语义类型。

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// 从 payload 中抽取出的值。
///
/// 标量保持 payload 中的原始类型；非标量叶子（对象/数组）以
/// `Structured` 承载，由宿主决定如何落地。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
    Structured(serde_json::Value),
}

impl Value {
    /// 值的类型名（用于错误信息与日志）。
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "integer",
            Value::F64(_) => "number",
            Value::Text(_) => "text",
            Value::Structured(_) => "structured",
        }
    }

    /// 数值视图（整数提升为浮点），非数值返回 None。
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Structured(v) => write!(f, "{}", v),
        }
    }
}

/// 宿主属性声明的语义类型。
///
/// 抽取后的值需要匹配该类型（见 extract crate 的 coerce）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Number,
    Integer,
    Boolean,
    Text,
    Any,
}

impl Default for ValueType {
    fn default() -> Self {
        Self::Any
    }
}

impl FromStr for ValueType {
    type Err = String;

    /// 兼容宿主侧常见的类型名写法（double/float/int/bool/string 等）。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "number" | "double" | "float" | "f32" | "f64" => Ok(Self::Number),
            "integer" | "int" | "i32" | "i64" | "uint" | "long" => Ok(Self::Integer),
            "boolean" | "bool" => Ok(Self::Boolean),
            "text" | "string" | "str" | "token" => Ok(Self::Text),
            "any" | "" => Ok(Self::Any),
            other => Err(format!("unknown value type: {}", other)),
        }
    }
}

/// 获取当前时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
