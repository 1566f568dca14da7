//! XML 路径抽取（`/root/child[0]/@attr` 形态）。

use crate::ExtractError;
use domain::Value;

/// 解码 XML payload 并沿元素/属性路径取值。
///
/// 首段匹配根元素名；`name[n]` 取同名子元素中的第 n 个（0 起）；
/// 末段 `@attr` 取属性，否则取元素文本（去除首尾空白）。
/// XML 的叶子一律以文本返回，类型解析交给 coerce。
pub fn extract_xml(payload: &[u8], path: Option<&str>) -> Result<Value, ExtractError> {
    let text = std::str::from_utf8(payload).map_err(|e| ExtractError::Decode(e.to_string()))?;
    let document = roxmltree::Document::parse(text).map_err(|e| ExtractError::Decode(e.to_string()))?;
    let root = document.root_element();

    let path_str = match path {
        Some(p) if !p.trim().is_empty() => p,
        _ => return Ok(Value::Text(element_text(&root))),
    };

    let segments: Vec<&str> = path_str.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(ExtractError::InvalidPath {
            path: path_str.to_string(),
            reason: "empty path".to_string(),
        });
    }

    let not_found = |segment: &str| ExtractError::PathNotFound {
        path: path_str.to_string(),
        segment: segment.to_string(),
    };

    // 首段即根元素名
    let (first_name, first_index) = split_index(segments[0], path_str)?;
    if root.tag_name().name() != first_name || first_index.unwrap_or(0) != 0 {
        return Err(not_found(segments[0]));
    }

    let mut current = root;
    let rest = &segments[1..];
    for (position, segment) in rest.iter().enumerate() {
        if let Some(attr_name) = segment.strip_prefix('@') {
            // 属性段只能是末段
            if position + 1 != rest.len() {
                return Err(ExtractError::InvalidPath {
                    path: path_str.to_string(),
                    reason: "attribute segment must be last".to_string(),
                });
            }
            return current
                .attribute(attr_name)
                .map(|v| Value::Text(v.to_string()))
                .ok_or_else(|| not_found(segment));
        }

        let (name, index) = split_index(segment, path_str)?;
        let mut matches = current
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == name);
        current = matches
            .nth(index.unwrap_or(0))
            .ok_or_else(|| not_found(segment))?;
    }

    Ok(Value::Text(element_text(&current)))
}

fn element_text(node: &roxmltree::Node<'_, '_>) -> String {
    node.text().unwrap_or("").trim().to_string()
}

fn split_index<'a>(segment: &'a str, path: &str) -> Result<(&'a str, Option<usize>), ExtractError> {
    match segment.find('[') {
        None => Ok((segment, None)),
        Some(start) => {
            let name = &segment[..start];
            let rest = &segment[start + 1..];
            let end = rest.find(']').ok_or_else(|| ExtractError::InvalidPath {
                path: path.to_string(),
                reason: "unterminated index".to_string(),
            })?;
            let index = rest[..end]
                .parse::<usize>()
                .map_err(|_| ExtractError::InvalidPath {
                    path: path.to_string(),
                    reason: "non-numeric index".to_string(),
                })?;
            Ok((name, Some(index)))
        }
    }
}
