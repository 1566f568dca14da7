use domain::{ContentKind, Value};
use sgbind_extract::{extract, ExtractError};

const PAYLOAD: &[u8] = br#"
<plant name="plant-7">
  <line id="a">
    <sensor unit="celsius">21.5</sensor>
    <sensor unit="bar">2.0</sensor>
  </line>
</plant>
"#;

#[test]
fn element_text_extracted() {
    let value = extract(PAYLOAD, ContentKind::Xml, Some("/plant/line/sensor")).expect("extract");
    assert_eq!(value, Value::Text("21.5".to_string()));
}

#[test]
fn indexed_sibling_selected() {
    let value =
        extract(PAYLOAD, ContentKind::Xml, Some("/plant/line/sensor[1]")).expect("extract");
    assert_eq!(value, Value::Text("2.0".to_string()));
}

#[test]
fn attribute_leaf_extracted() {
    let value =
        extract(PAYLOAD, ContentKind::Xml, Some("/plant/line/sensor/@unit")).expect("extract");
    assert_eq!(value, Value::Text("celsius".to_string()));
    let value = extract(PAYLOAD, ContentKind::Xml, Some("/plant/@name")).expect("extract");
    assert_eq!(value, Value::Text("plant-7".to_string()));
}

#[test]
fn attribute_segment_must_be_last() {
    let err = extract(PAYLOAD, ContentKind::Xml, Some("/plant/line/@id/sensor"))
        .expect_err("must fail");
    match err {
        ExtractError::InvalidPath { reason, .. } => {
            assert_eq!(reason, "attribute segment must be last")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn missing_element_names_segment() {
    let err = extract(PAYLOAD, ContentKind::Xml, Some("/plant/line/pump")).expect_err("must fail");
    match err {
        ExtractError::PathNotFound { segment, .. } => assert_eq!(segment, "pump"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn wrong_root_rejected() {
    let err = extract(PAYLOAD, ContentKind::Xml, Some("/factory/line")).expect_err("must fail");
    assert!(matches!(err, ExtractError::PathNotFound { .. }));
}

#[test]
fn malformed_xml_is_decode_error() {
    let err = extract(b"<open", ContentKind::Xml, Some("/open")).expect_err("must fail");
    assert!(matches!(err, ExtractError::Decode(_)));
}
