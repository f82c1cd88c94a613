//! Tests for engine events and sinks

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use prometheus_sla_engine::builders::EngineBuilder;
use prometheus_sla_engine::core::{
    build_event, EventKind, EventSink, InMemoryEventSink, TickDirection, TracingEventSink,
};
use prometheus_sla_engine::util::WorkItemId;

use super::sample_config;

#[test]
fn test_in_memory_sink_is_bounded() {
    let sink = InMemoryEventSink::new(2);
    let at = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
    sink.record(build_event("t-1", None, EventKind::ItemOpened, at, None));
    sink.record(build_event("t-1", None, EventKind::ItemPaused, at, None));
    sink.record(build_event("e-1", Some("billing".into()), EventKind::EntryAdmitted, at, None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventKind::ItemPaused);
    assert_eq!(events[1].queue.as_deref(), Some("billing"));
    assert_ne!(events[0].event_id, events[1].event_id);
    assert_eq!(sink.of_kind(EventKind::ItemOpened).len(), 0);
}

#[test]
fn test_tracing_sink_accepts_events() {
    let at = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
    TracingEventSink.record(build_event(
        "t-9",
        None,
        EventKind::ItemBreached,
        at,
        Some("{}".into()),
    ));
}

#[test]
fn test_event_serializes_kind_in_snake_case() {
    let at = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
    let event = build_event("t-1", None, EventKind::ItemHalfElapsed, at, None);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["kind"], "item_half_elapsed");
    assert_eq!(json["subject"], "t-1");
}

#[tokio::test]
async fn test_orchestrator_emits_lifecycle_events() {
    let sink = InMemoryEventSink::new(64);
    let engine = EngineBuilder::new(sample_config())
        .with_event_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();

    // Saturday 11:00 in São Paulo: outside business days, starts paused
    let created_at = Utc.with_ymd_and_hms(2024, 3, 2, 14, 0, 0).unwrap();
    let created = engine
        .on_work_item_created(WorkItemId::new("t-1"), created_at, 120)
        .await
        .unwrap();
    assert!(created.paused);
    assert_eq!(sink.of_kind(EventKind::ItemOpened).len(), 1);
    assert_eq!(sink.of_kind(EventKind::ItemPaused).len(), 1);

    // Monday 09:00 opening
    let monday = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
    engine
        .on_calendar_tick(TickDirection::Start, monday)
        .await
        .unwrap();
    let resumed = sink.of_kind(EventKind::ItemResumed);
    assert_eq!(resumed.len(), 1);
    assert_eq!(resumed[0].subject, "t-1");
    // the whole weekend gap is credited, so the item is still on track
    assert!(sink.of_kind(EventKind::ItemBreached).is_empty());

    engine
        .on_work_item_resolved(&WorkItemId::new("t-1"), monday)
        .await
        .unwrap();
    assert_eq!(sink.of_kind(EventKind::ItemResolved).len(), 1);
}
