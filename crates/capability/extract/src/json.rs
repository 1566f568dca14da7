//! JSON 路径抽取（`$.a.b[0]` 形态）。

use crate::ExtractError;
use domain::Value;

enum Segment {
    Key(String),
    Index(usize),
}

/// 解码 JSON payload 并沿路径取叶子值。
///
/// 路径为空时整个文档即为值；缺失的中间键或越界下标报
/// `PathNotFound` 并指明第一个坏段。
pub fn extract_json(payload: &[u8], path: Option<&str>) -> Result<Value, ExtractError> {
    let document: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| ExtractError::Decode(e.to_string()))?;

    let path = match path {
        Some(p) if !p.trim().is_empty() => p,
        _ => return Ok(to_value(&document)),
    };

    let mut current = &document;
    for segment in parse_path(path)? {
        match segment {
            Segment::Key(key) => {
                current = current.get(&key).ok_or_else(|| ExtractError::PathNotFound {
                    path: path.to_string(),
                    segment: key.clone(),
                })?;
            }
            Segment::Index(index) => {
                current = current
                    .get(index)
                    .ok_or_else(|| ExtractError::PathNotFound {
                        path: path.to_string(),
                        segment: format!("[{}]", index),
                    })?;
            }
        }
    }
    Ok(to_value(current))
}

fn to_value(node: &serde_json::Value) -> Value {
    match node {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(v) => Value::Bool(*v),
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Value::I64(v)
            } else {
                Value::F64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(v) => Value::Text(v.clone()),
        structured => Value::Structured(structured.clone()),
    }
}

fn parse_path(path: &str) -> Result<Vec<Segment>, ExtractError> {
    let invalid = |reason: &str| ExtractError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let body = path.trim();
    let body = body.strip_prefix('$').unwrap_or(body);
    let mut segments = Vec::new();

    for part in body.split('.').filter(|p| !p.is_empty()) {
        // `arr[0]` / `arr[0][1]`：先键后若干下标
        let mut rest = part;
        if let Some(bracket) = rest.find('[') {
            let key = &rest[..bracket];
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            rest = &rest[bracket..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped.find(']').ok_or_else(|| invalid("unterminated index"))?;
                let index = stripped[..end]
                    .parse::<usize>()
                    .map_err(|_| invalid("non-numeric index"))?;
                segments.push(Segment::Index(index));
                rest = &stripped[end + 1..];
            }
            if !rest.is_empty() {
                return Err(invalid("trailing characters after index"));
            }
        } else {
            segments.push(Segment::Key(rest.to_string()));
        }
    }

    if segments.is_empty() {
        return Err(invalid("empty path"));
    }
    Ok(segments)
}
