use domain::{
    supports, AuthMethod, BindingDescriptor, BindingKey, Operation, Protocol, RefreshPolicy,
    ValueType,
};
use std::str::FromStr;

fn sample_descriptor() -> BindingDescriptor {
    BindingDescriptor {
        key: BindingKey::new("/Factory/Sensor", "temperature"),
        protocol: Protocol::Mqtt,
        operation: Operation::Stream,
        uri: "mqtt://broker:1883".to_string(),
        topic: "factory/sensor/temp".to_string(),
        body: None,
        json_path: Some("$.value".to_string()),
        xpath: None,
        content_kind: None,
        value_type: ValueType::Number,
        min_value: None,
        max_value: None,
        unit: Some("celsius".to_string()),
        description: None,
        refresh: RefreshPolicy::IntervalMs(1000),
        qos: 0,
        retain: false,
        http_method: None,
        http_headers: Vec::new(),
        auth_method: AuthMethod::None,
        auth_profile: None,
        timeout_ms: Some(5000),
        retry_count: Some(3),
        enabled: true,
    }
}

#[test]
fn support_matrix_membership() {
    assert!(supports(Protocol::Mqtt, Operation::Stream));
    assert!(supports(Protocol::Websocket, Operation::Subscribe));
    assert!(supports(Protocol::Rest, Operation::Poll));
    assert!(supports(Protocol::File, Operation::Write));
    assert!(supports(Protocol::Modbus, Operation::Read));
    // mqtt 不是轮询型协议
    assert!(!supports(Protocol::Mqtt, Operation::Poll));
    // opcua 声明保留，任何组合都不支持
    assert!(!supports(Protocol::OpcUa, Operation::Read));
    assert!(!supports(Protocol::OpcUa, Operation::Stream));
}

#[test]
fn valid_descriptor_passes() {
    assert!(sample_descriptor().validate().is_empty());
}

#[test]
fn bounds_must_be_ordered() {
    let mut descriptor = sample_descriptor();
    descriptor.min_value = Some(10.0);
    descriptor.max_value = Some(1.0);
    let errors = descriptor.validate();
    assert!(errors.iter().any(|e| e.contains("min")));
}

#[test]
fn unsupported_combination_rejected() {
    let mut descriptor = sample_descriptor();
    descriptor.protocol = Protocol::OpcUa;
    let errors = descriptor.validate();
    assert!(errors.iter().any(|e| e.contains("unsupported")));
}

#[test]
fn auth_profile_required_for_non_none_method() {
    let mut descriptor = sample_descriptor();
    descriptor.auth_method = AuthMethod::Bearer;
    descriptor.auth_profile = None;
    let errors = descriptor.validate();
    assert!(errors.iter().any(|e| e.contains("auth profile")));
}

#[test]
fn enum_parsing_round_trip() {
    assert_eq!(Protocol::from_str("mqtt").expect("protocol"), Protocol::Mqtt);
    assert_eq!(Protocol::from_str("WS").expect("protocol"), Protocol::Websocket);
    assert_eq!(Operation::from_str("subscribe").expect("op"), Operation::Subscribe);
    assert_eq!(AuthMethod::from_str("api_key").expect("auth"), AuthMethod::ApiKey);
    assert_eq!(ValueType::from_str("double").expect("type"), ValueType::Number);
    assert!(Protocol::from_str("carrier-pigeon").is_err());
}

#[test]
fn content_kind_inferred_from_paths() {
    let mut descriptor = sample_descriptor();
    assert_eq!(descriptor.effective_content_kind(), domain::ContentKind::Json);
    descriptor.json_path = None;
    descriptor.xpath = Some("/root/value".to_string());
    assert_eq!(descriptor.effective_content_kind(), domain::ContentKind::Xml);
    descriptor.xpath = None;
    assert_eq!(descriptor.effective_content_kind(), domain::ContentKind::Plain);
}
