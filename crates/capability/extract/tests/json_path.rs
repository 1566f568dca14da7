use domain::{ContentKind, Value};
use sgbind_extract::{extract, ExtractError};

#[test]
fn extracts_nested_number() {
    let payload = br#"{"data":{"temperature":23.5}}"#;
    let value = extract(payload, ContentKind::Json, Some("$.data.temperature")).expect("extract");
    assert_eq!(value, Value::F64(23.5));
}

#[test]
fn missing_key_names_first_dead_segment() {
    let payload = br#"{"data":{"temperature":23.5}}"#;
    let err = extract(payload, ContentKind::Json, Some("$.data.missing.deeper"))
        .expect_err("must fail");
    match err {
        ExtractError::PathNotFound { segment, .. } => assert_eq!(segment, "missing"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn array_index_and_out_of_range() {
    let payload = br#"{"readings":[{"v":1},{"v":2}]}"#;
    let value = extract(payload, ContentKind::Json, Some("$.readings[1].v")).expect("extract");
    assert_eq!(value, Value::I64(2));

    let err = extract(payload, ContentKind::Json, Some("$.readings[5].v")).expect_err("oob");
    match err {
        ExtractError::PathNotFound { segment, .. } => assert_eq!(segment, "[5]"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn leaf_types_preserved() {
    let payload = br#"{"s":"on","b":true,"n":null,"i":7}"#;
    assert_eq!(
        extract(payload, ContentKind::Json, Some("$.s")).expect("s"),
        Value::Text("on".to_string())
    );
    assert_eq!(
        extract(payload, ContentKind::Json, Some("$.b")).expect("b"),
        Value::Bool(true)
    );
    assert_eq!(
        extract(payload, ContentKind::Json, Some("$.n")).expect("n"),
        Value::Null
    );
    assert_eq!(
        extract(payload, ContentKind::Json, Some("$.i")).expect("i"),
        Value::I64(7)
    );
}

#[test]
fn structured_leaf_kept_as_structured() {
    let payload = br#"{"obj":{"a":1}}"#;
    let value = extract(payload, ContentKind::Json, Some("$.obj")).expect("extract");
    match value {
        Value::Structured(v) => assert_eq!(v["a"], 1),
        other => panic!("unexpected value: {other:?}"),
    }
}

#[test]
fn empty_path_returns_whole_document() {
    let payload = br#"42"#;
    let value = extract(payload, ContentKind::Json, None).expect("extract");
    assert_eq!(value, Value::I64(42));
}

#[test]
fn malformed_payload_is_decode_error() {
    let err = extract(b"{not json", ContentKind::Json, Some("$.a")).expect_err("must fail");
    assert!(matches!(err, ExtractError::Decode(_)));
}

#[test]
fn malformed_path_is_invalid_path() {
    let payload = br#"{"a":[1]}"#;
    let err = extract(payload, ContentKind::Json, Some("$.a[x]")).expect_err("must fail");
    assert!(matches!(err, ExtractError::InvalidPath { .. }));
}
