use domain::{ContentKind, Value, ValueType};
use sgbind_extract::{bounds_violation, coerce, extract, ExtractError};

#[test]
fn plain_payload_is_trimmed_text() {
    let value = extract(b"  23.5\n", ContentKind::Plain, Some("$.ignored")).expect("extract");
    assert_eq!(value, Value::Text("23.5".to_string()));
}

#[test]
fn textual_source_parses_into_declared_type() {
    let value = coerce(Value::Text("23.5".to_string()), ValueType::Number, true).expect("number");
    assert_eq!(value, Value::F64(23.5));
    let value = coerce(Value::Text("on".to_string()), ValueType::Boolean, true).expect("bool");
    assert_eq!(value, Value::Bool(true));
    let value = coerce(Value::Text("42".to_string()), ValueType::Integer, true).expect("int");
    assert_eq!(value, Value::I64(42));
}

#[test]
fn json_string_where_number_expected_is_mismatch() {
    let err = coerce(Value::Text("23.5".to_string()), ValueType::Number, false)
        .expect_err("json strings stay strings");
    assert!(matches!(err, ExtractError::TypeMismatch { expected: "number", .. }));
}

#[test]
fn integer_accepts_whole_floats_only() {
    assert_eq!(
        coerce(Value::F64(42.0), ValueType::Integer, false).expect("whole"),
        Value::I64(42)
    );
    let err = coerce(Value::F64(42.5), ValueType::Integer, false).expect_err("fractional");
    assert!(matches!(err, ExtractError::TypeMismatch { .. }));
}

#[test]
fn text_type_accepts_scalar_display() {
    assert_eq!(
        coerce(Value::F64(1.5), ValueType::Text, false).expect("display"),
        Value::Text("1.5".to_string())
    );
}

#[test]
fn unparsable_text_reports_mismatch() {
    let err = coerce(Value::Text("warm".to_string()), ValueType::Number, true)
        .expect_err("must fail");
    assert!(matches!(err, ExtractError::TypeMismatch { .. }));
}

#[test]
fn bounds_are_advisory_descriptions() {
    assert!(bounds_violation(&Value::F64(50.0), Some(0.0), Some(100.0)).is_none());
    let below = bounds_violation(&Value::F64(-5.0), Some(0.0), Some(100.0)).expect("below");
    assert!(below.contains("below"));
    let above = bounds_violation(&Value::I64(150), Some(0.0), Some(100.0)).expect("above");
    assert!(above.contains("above"));
    // 非数值不检查
    assert!(bounds_violation(&Value::Text("x".to_string()), Some(0.0), None).is_none());
}
