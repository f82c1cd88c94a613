//! Tests for builder modules

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use prometheus_sla_engine::builders::EngineBuilder;
use prometheus_sla_engine::config::StoreBackendConfig;
use prometheus_sla_engine::core::{EngineError, EventKind, InMemoryEventSink};
use prometheus_sla_engine::infra::MemoryStore;
use prometheus_sla_engine::util::{Clock, ManualClock, QueueKey, RequesterId, WorkItemId};

use super::sample_config;

#[test]
fn test_engine_builder_defaults() {
    let builder = EngineBuilder::new(sample_config());
    assert_eq!(builder.config().max_active_per_queue, 1);
    let engine = builder.build().unwrap();
    assert_eq!(engine.settings().max_active_per_queue, 1);
    assert!(engine.settings().auto_promote);
    assert_eq!(
        engine.sla_clock().policy().to_string(),
        "Mon,Tue,Wed,Thu,Fri 09:00-18:00 America/Sao_Paulo"
    );
}

#[test]
fn test_engine_builder_rejects_bad_policy() {
    let mut cfg = sample_config();
    cfg.calendar.timezone = "Nowhere/Special".into();
    assert!(matches!(
        EngineBuilder::new(cfg).build(),
        Err(EngineError::PolicyMisconfigured(_))
    ));

    let mut cfg = sample_config();
    cfg.max_active_per_queue = 0;
    assert!(matches!(
        EngineBuilder::new(cfg).build(),
        Err(EngineError::PolicyMisconfigured(_))
    ));
}

#[tokio::test]
async fn test_engine_builder_wires_clock_store_and_sink() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 13, 0, 0).unwrap());
    let store = Arc::new(MemoryStore::new(Arc::new(clock.clone())));
    let sink = InMemoryEventSink::new(16);
    let engine = EngineBuilder::new(sample_config())
        .with_clock(Arc::new(clock.clone()))
        .with_store(store.clone())
        .with_event_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();

    let outcome = engine
        .on_admission_requested(QueueKey::new("billing"), RequesterId::new("r-1"))
        .await
        .unwrap();
    assert_eq!(outcome.entry.created_at, clock.now());
    assert_eq!(store.entry_count(), 1);
    assert_eq!(sink.of_kind(EventKind::EntryAdmitted).len(), 1);
}

#[tokio::test]
async fn test_engine_builder_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = sample_config();
    cfg.store = StoreBackendConfig::File {
        dir: dir.path().display().to_string(),
        name: "journal".into(),
    };
    // Monday 10:00 in São Paulo
    let created_at = Utc.with_ymd_and_hms(2024, 3, 4, 13, 0, 0).unwrap();

    let engine = EngineBuilder::new(cfg.clone()).build().unwrap();
    let created = engine
        .on_work_item_created(WorkItemId::new("t-1"), created_at, 60)
        .await
        .unwrap();
    assert!(created.created);
    drop(engine);

    let reopened = EngineBuilder::new(cfg).build().unwrap();
    let item = reopened.work_item(&WorkItemId::new("t-1")).await.unwrap();
    assert_eq!(item.deadline, created.deadline);
    assert!(dir.path().join("journal.jsonl").exists());
}
