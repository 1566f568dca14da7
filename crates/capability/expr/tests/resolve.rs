use sgbind_expr::{resolve, resolve_lenient, ExprError, Scope};
use std::collections::HashMap;

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn substitutes_from_nearest_scope() {
    let scope = Scope::root(vars(&[("deviceId", "sensor123")]));
    let resolved = resolve("/devices/${deviceId}/temp", &scope).expect("resolve");
    assert_eq!(resolved, "/devices/sensor123/temp");
}

#[test]
fn child_scope_shadows_parent() {
    let root = Scope::root(vars(&[("site", "global"), ("region", "eu")]));
    let child = Scope::child(&root, vars(&[("site", "plant-7")]));
    let resolved = resolve("${site}/${region}", &child).expect("resolve");
    assert_eq!(resolved, "plant-7/eu");
}

#[test]
fn unresolved_variable_names_the_offender() {
    let scope = Scope::root(vars(&[("a", "1")]));
    let err = resolve("${a}/${missing}", &scope).expect_err("must fail");
    assert_eq!(
        err,
        ExprError::UnresolvedVariable {
            name: "missing".to_string(),
            template: "${a}/${missing}".to_string(),
        }
    );
}

#[test]
fn substitution_is_not_recursive() {
    // 替换出的 ${b} 不会再被扫描
    let scope = Scope::root(vars(&[("a", "${b}"), ("b", "boom")]));
    let resolved = resolve("value=${a}", &scope).expect("resolve");
    assert_eq!(resolved, "value=${b}");
}

#[test]
fn lenient_mode_substitutes_empty_and_reports() {
    let scope = Scope::root(vars(&[("host", "broker")]));
    let (text, missing) = resolve_lenient("mqtt://${host}:${port}", &scope);
    assert_eq!(text, "mqtt://broker:");
    assert_eq!(missing, vec!["port".to_string()]);
}

#[test]
fn unterminated_reference_kept_literal() {
    let scope = Scope::root(vars(&[("a", "1")]));
    let resolved = resolve("${a} and ${broken", &scope).expect("resolve");
    assert_eq!(resolved, "1 and ${broken");
}

#[test]
fn flatten_prefers_child_values() {
    let root = Scope::root(vars(&[("x", "root"), ("y", "root")]));
    let child = Scope::child(&root, vars(&[("x", "child")]));
    let flat = child.flatten();
    assert_eq!(flat.get("x").map(String::as_str), Some("child"));
    assert_eq!(flat.get("y").map(String::as_str), Some("root"));
}
