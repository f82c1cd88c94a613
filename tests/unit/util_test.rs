//! Tests for utility functions

use chrono::{Duration, TimeZone, Utc};
use prometheus_sla_engine::util::{
    init_tracing, Clock, EntryId, ManualClock, QueueKey, RequesterId, SystemClock,
    WorkItemId,
};

#[test]
fn test_string_ids() {
    let key = QueueKey::new("billing");
    assert_eq!(key.as_str(), "billing");
    assert_eq!(key.to_string(), "billing");
    assert_eq!(QueueKey::from("billing"), key);
    assert_eq!(RequesterId::from(String::from("+55 11")), RequesterId::new("+55 11"));
    assert!(WorkItemId::new("a") < WorkItemId::new("b"));
}

#[test]
fn test_ids_serialize_transparently() {
    assert_eq!(
        serde_json::to_string(&WorkItemId::new("t-1")).unwrap(),
        "\"t-1\""
    );
    let id = EntryId::generate();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
    let back: EntryId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn test_entry_ids_are_unique() {
    assert_ne!(EntryId::generate(), EntryId::generate());
}

#[test]
fn test_clocks() {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
    let manual = ManualClock::new(start);
    manual.advance(Duration::seconds(30));
    assert_eq!(manual.now(), start + Duration::seconds(30));
    assert!(SystemClock.now() > start);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialized twice without panicking");
}
