//! `${var}` 变量替换。
//!
//! 作用域是不可变的链式字典：节点本地 -> 祖先 -> 全局，子作用域
//! 在重名时遮蔽祖先。替换单遍、从左到右、不递归：替换出的文本
//! 不会再次扫描 `${}`，以避免注入循环。纯函数，无 I/O。

use std::collections::HashMap;
use std::sync::Arc;

/// 变量替换错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    /// 模板引用了作用域链中不存在的变量。
    #[error("unresolved variable `{name}` in template `{template}`")]
    UnresolvedVariable { name: String, template: String },
}

/// 一级变量作用域，持有可选的父级引用。
///
/// 构造后只读；节点层级变化时整链重建而不是原地修改。
#[derive(Debug)]
pub struct Scope {
    vars: HashMap<String, String>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    /// 根作用域（全局变量）。
    pub fn root(vars: HashMap<String, String>) -> Arc<Self> {
        Arc::new(Self { vars, parent: None })
    }

    /// 在 `parent` 之下派生子作用域；子级遮蔽父级同名变量。
    pub fn child(parent: &Arc<Scope>, vars: HashMap<String, String>) -> Arc<Self> {
        Arc::new(Self {
            vars,
            parent: Some(Arc::clone(parent)),
        })
    }

    /// 沿链查找最近作用域中的变量值。
    pub fn lookup(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.vars.get(name) {
            return Some(value.as_str());
        }
        self.parent.as_deref().and_then(|p| p.lookup(name))
    }

    /// 展平整条链（子级优先），用于等值比较与调试输出。
    pub fn flatten(&self) -> HashMap<String, String> {
        let mut flat = match self.parent.as_deref() {
            Some(parent) => parent.flatten(),
            None => HashMap::new(),
        };
        for (key, value) in &self.vars {
            flat.insert(key.clone(), value.clone());
        }
        flat
    }
}

/// 严格替换：任何未解析的变量都返回 `UnresolvedVariable`。
pub fn resolve(template: &str, scope: &Scope) -> Result<String, ExprError> {
    substitute(template, scope, true).map(|(text, _)| text)
}

/// 宽松替换：未解析的变量替换为空串，返回缺失的变量名列表。
pub fn resolve_lenient(template: &str, scope: &Scope) -> (String, Vec<String>) {
    match substitute(template, scope, false) {
        Ok((text, missing)) => (text, missing),
        // strict=false 时 substitute 不会失败
        Err(_) => (template.to_string(), Vec::new()),
    }
}

fn substitute(
    template: &str,
    scope: &Scope,
    strict: bool,
) -> Result<(String, Vec<String>), ExprError> {
    let mut output = String::with_capacity(template.len());
    let mut missing = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match scope.lookup(name) {
                    Some(value) => output.push_str(value),
                    None if strict => {
                        return Err(ExprError::UnresolvedVariable {
                            name: name.to_string(),
                            template: template.to_string(),
                        });
                    }
                    None => missing.push(name.to_string()),
                }
                rest = &after[end + 1..];
            }
            // 未闭合的 `${` 按字面量保留
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    Ok((output, missing))
}
