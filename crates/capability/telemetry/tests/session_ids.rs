use sgbind_telemetry::{metrics, new_session_id, record_update_delivered};

#[test]
fn session_ids_non_empty_and_distinct() {
    let a = new_session_id();
    let b = new_session_id();
    assert!(!a.is_empty());
    assert_ne!(a, b);
}

#[test]
fn counters_accumulate() {
    let before = metrics().snapshot().updates_delivered;
    record_update_delivered();
    record_update_delivered();
    let after = metrics().snapshot().updates_delivered;
    assert_eq!(after, before + 2);
}
