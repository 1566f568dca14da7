use domain::{BindingKey, Operation, Protocol, RefreshPolicy};
use serde_json::{json, Map, Value as Json};
use sgbind_discovery::{discover, AttributeRecord, DescriptorStore};
use std::collections::HashMap;

fn obj(value: Json) -> Map<String, Json> {
    match value {
        Json::Object(map) => map,
        other => panic!("expected object, got {other:?}"),
    }
}

fn record(node: &str, attribute: &str, metadata: Json) -> AttributeRecord {
    AttributeRecord {
        node_path: node.to_string(),
        attribute: attribute.to_string(),
        metadata: obj(metadata),
        value_type: Some("double".to_string()),
    }
}

fn no_globals() -> HashMap<String, String> {
    HashMap::new()
}

#[test]
fn binding_dict_beats_legacy_flat_keys() {
    let records = vec![record(
        "/factory/pump",
        "pressure",
        json!({
            "binding": {
                "protocol": "rest",
                "uri": "https://plant.example/api/pressure",
                "jsonPath": "$.value"
            },
            "binding_protocol": "mqtt",
            "binding_uri": "mqtt://old-broker:1883",
            "binding_topic": "legacy/topic"
        }),
    )];

    let (store, report) = discover(&records, &no_globals(), &DescriptorStore::empty());
    assert_eq!(report.added.len(), 1);
    assert!(report.rejected.is_empty());

    let key = BindingKey::new("/factory/pump", "pressure");
    let binding = store.get(&key).expect("binding present");
    assert_eq!(binding.descriptor.protocol, Protocol::Rest);
    assert_eq!(binding.descriptor.uri, "https://plant.example/api/pressure");
    // 败方形态的字段不得回填
    assert_eq!(binding.descriptor.topic, "");
}

#[test]
fn mqtt_shorthand_defaults_stream_and_broker_uri() {
    let records = vec![record(
        "/factory/sensor",
        "temperature",
        json!({
            "mqtt": {
                "broker": "broker.example:1883",
                "topic": "plant/temperature"
            }
        }),
    )];

    let (store, report) = discover(&records, &no_globals(), &DescriptorStore::empty());
    assert!(report.rejected.is_empty(), "{:?}", report.rejected);

    let key = BindingKey::new("/factory/sensor", "temperature");
    let binding = store.get(&key).expect("binding present");
    assert_eq!(binding.descriptor.protocol, Protocol::Mqtt);
    assert_eq!(binding.descriptor.operation, Operation::Stream);
    assert_eq!(binding.descriptor.uri, "mqtt://broker.example:1883");
}

#[test]
fn legacy_flat_keys_still_parse() {
    let records = vec![record(
        "/site/meter",
        "power",
        json!({
            "binding_protocol": "modbus",
            "binding_uri": "tcp://10.0.0.5:502",
            "binding_topic": "holding:40001",
            "binding_refreshInterval": 1000
        }),
    )];

    let (store, report) = discover(&records, &no_globals(), &DescriptorStore::empty());
    assert!(report.rejected.is_empty(), "{:?}", report.rejected);

    let key = BindingKey::new("/site/meter", "power");
    let binding = store.get(&key).expect("binding present");
    assert_eq!(binding.descriptor.protocol, Protocol::Modbus);
    assert_eq!(binding.descriptor.refresh, RefreshPolicy::IntervalMs(1000));
}

#[test]
fn attribute_without_binding_metadata_is_skipped() {
    let records = vec![record("/site/node", "plain", json!({"displayName": "x"}))];
    let (store, report) = discover(&records, &no_globals(), &DescriptorStore::empty());
    assert!(store.is_empty());
    assert!(report.added.is_empty());
    assert!(report.rejected.is_empty());
}

#[test]
fn invalid_declaration_is_rejected_with_reason() {
    // stream 操作的 mqtt 绑定缺 topic
    let records = vec![record(
        "/site/node",
        "level",
        json!({
            "binding": {
                "protocol": "mqtt",
                "operation": "stream",
                "uri": "mqtt://broker:1883"
            }
        }),
    )];

    let (store, report) = discover(&records, &no_globals(), &DescriptorStore::empty());
    assert!(store.is_empty());
    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].reason.contains("topic"));
}

#[test]
fn opcua_declaration_is_rejected() {
    let records = vec![record(
        "/site/node",
        "state",
        json!({
            "binding": {
                "protocol": "opcua",
                "uri": "opc.tcp://server:4840"
            }
        }),
    )];

    let (_, report) = discover(&records, &no_globals(), &DescriptorStore::empty());
    assert_eq!(report.rejected.len(), 1);
}

#[test]
fn duplicate_targets_reject_all_claimants() {
    let records = vec![
        record(
            "/site/node",
            "value",
            json!({"binding": {"protocol": "rest", "uri": "https://a.example/v"}}),
        ),
        record(
            "/site/node",
            "value",
            json!({"binding": {"protocol": "rest", "uri": "https://b.example/v"}}),
        ),
    ];

    let (store, report) = discover(&records, &no_globals(), &DescriptorStore::empty());
    assert!(store.is_empty());
    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].reason.contains("duplicate"));
}

#[test]
fn rediscovery_diff_is_idempotent() {
    let records = vec![
        record(
            "/site/a",
            "v",
            json!({"binding": {"protocol": "rest", "uri": "https://a.example/v"}}),
        ),
        record(
            "/site/b",
            "v",
            json!({"binding": {"protocol": "rest", "uri": "https://b.example/v"}}),
        ),
    ];

    let (first, report) = discover(&records, &no_globals(), &DescriptorStore::empty());
    assert_eq!(report.added.len(), 2);

    // 同样的遍历再来一次：全部 unchanged
    let (_, report) = discover(&records, &no_globals(), &first);
    assert!(report.added.is_empty());
    assert!(report.updated.is_empty());
    assert_eq!(report.unchanged.len(), 2);
    assert!(report.removed.is_empty());
}

#[test]
fn changed_uri_reports_updated_and_missing_reports_removed() {
    let before = vec![
        record(
            "/site/a",
            "v",
            json!({"binding": {"protocol": "rest", "uri": "https://a.example/v"}}),
        ),
        record(
            "/site/b",
            "v",
            json!({"binding": {"protocol": "rest", "uri": "https://b.example/v"}}),
        ),
    ];
    let (first, _) = discover(&before, &no_globals(), &DescriptorStore::empty());

    let after = vec![record(
        "/site/a",
        "v",
        json!({"binding": {"protocol": "rest", "uri": "https://a.example/v2"}}),
    )];
    let (_, report) = discover(&after, &no_globals(), &first);
    assert_eq!(report.updated, vec![BindingKey::new("/site/a", "v")]);
    assert_eq!(report.removed, vec![BindingKey::new("/site/b", "v")]);
}

#[test]
fn context_scope_inherits_from_ancestors_and_shadows() {
    let records = vec![
        record("/plant", "marker", json!({"context": {"host": "global.example", "site": "plant-7"}})),
        record(
            "/plant/line",
            "marker",
            json!({"context": {"host": "line.example"}}),
        ),
        record(
            "/plant/line/sensor",
            "value",
            json!({"binding": {"protocol": "rest", "uri": "https://${host}/${site}/v"}}),
        ),
    ];

    let mut globals = HashMap::new();
    globals.insert("host".to_string(), "default.example".to_string());

    let (store, report) = discover(&records, &globals, &DescriptorStore::empty());
    assert!(report.rejected.is_empty(), "{:?}", report.rejected);

    let key = BindingKey::new("/plant/line/sensor", "value");
    let scope = &store.get(&key).expect("binding present").scope;
    // 最近祖先遮蔽更远的定义
    assert_eq!(scope.lookup("host"), Some("line.example"));
    assert_eq!(scope.lookup("site"), Some("plant-7"));
}

#[test]
fn context_change_alone_marks_binding_updated() {
    let base = |host: &str| {
        vec![
            record("/plant", "marker", json!({"context": {"host": host}})),
            record(
                "/plant/sensor",
                "value",
                json!({"binding": {"protocol": "rest", "uri": "https://${host}/v"}}),
            ),
        ]
    };

    let (first, _) = discover(&base("a.example"), &no_globals(), &DescriptorStore::empty());
    let (_, report) = discover(&base("b.example"), &no_globals(), &first);
    assert_eq!(report.updated, vec![BindingKey::new("/plant/sensor", "value")]);
}
