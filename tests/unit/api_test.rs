//! Tests for the request/response table

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use prometheus_sla_engine::builders::EngineBuilder;
use prometheus_sla_engine::core::{
    AssignmentOutcome, EngineError, EntryStatus, EventKind, InMemoryEventSink, Position,
    MAX_TARGET_MINUTES,
};
use prometheus_sla_engine::runtime::{handle, health, EngineRequest, EngineResponse};
use prometheus_sla_engine::util::{EntryId, QueueKey};

use super::sample_config;

#[test]
fn test_health() {
    assert!(health().ok);
}

#[test]
fn test_request_wire_format() {
    let request: EngineRequest = serde_json::from_str(
        r#"{"op":"admission_requested","queue_key":"billing","requester":"+5511999990000"}"#,
    )
    .unwrap();
    assert!(matches!(
        request,
        EngineRequest::AdmissionRequested { ref queue_key, .. } if queue_key.as_str() == "billing"
    ));

    let tick: EngineRequest = serde_json::from_str(
        r#"{"op":"calendar_tick","direction":"end","at":"2024-03-01T20:30:00Z"}"#,
    )
    .unwrap();
    assert!(matches!(tick, EngineRequest::CalendarTick { .. }));

    let json = serde_json::to_value(EngineResponse::Position {
        entry_id: EntryId::generate(),
        position: Position::Waiting(3),
    })
    .unwrap();
    assert_eq!(json["result"], "position");
    assert_eq!(json["position"]["kind"], "waiting");
    assert_eq!(json["position"]["place"], 3);
}

#[tokio::test]
async fn test_handle_dispatches_operations() {
    let engine = EngineBuilder::new(sample_config()).build().unwrap();
    let key = QueueKey::new("billing");

    // Monday 10:00 in São Paulo
    let created_at = Utc.with_ymd_and_hms(2024, 3, 4, 13, 0, 0).unwrap();
    let EngineResponse::Deadline(created) = handle(
        &engine,
        EngineRequest::WorkItemCreated {
            id: "t-1".into(),
            created_at,
            target_minutes: 90,
        },
    )
    .await
    .unwrap() else {
        panic!("expected a deadline");
    };
    assert_eq!(created.deadline, created_at + chrono::Duration::minutes(90));

    let mut admitted = Vec::new();
    for requester in ["r-1", "r-2"] {
        let EngineResponse::Admission(outcome) = handle(
            &engine,
            EngineRequest::AdmissionRequested {
                queue_key: key.clone(),
                requester: requester.into(),
            },
        )
        .await
        .unwrap() else {
            panic!("expected an admission");
        };
        admitted.push(outcome);
    }
    assert_eq!(admitted[0].position, Position::BeingServed);
    assert_eq!(admitted[1].position, Position::Waiting(1));

    let response = handle(
        &engine,
        EngineRequest::AssignmentResolved {
            entry_id: admitted[0].entry.id,
            outcome: AssignmentOutcome::Completed,
        },
    )
    .await
    .unwrap();
    assert!(matches!(
        response,
        EngineResponse::Entry(ref e) if e.status == EntryStatus::Completed
    ));

    let response = handle(
        &engine,
        EngineRequest::PositionQuery {
            queue_key: key.clone(),
            entry_id: admitted[1].entry.id,
        },
    )
    .await
    .unwrap();
    assert_eq!(
        response,
        EngineResponse::Position {
            entry_id: admitted[1].entry.id,
            position: Position::BeingServed,
        }
    );

    let response = handle(&engine, EngineRequest::WorkItemAssigned { id: "t-1".into() })
        .await
        .unwrap();
    assert!(matches!(response, EngineResponse::WorkItem(_)));
}

#[tokio::test]
async fn test_handle_surfaces_errors() {
    let engine = EngineBuilder::new(sample_config()).build().unwrap();
    let err = handle(
        &engine,
        EngineRequest::WorkItemResolved {
            id: "missing".into(),
            at: Utc::now(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn test_oversized_target_is_clamped_not_fatal() {
    let engine = EngineBuilder::new(sample_config()).build().unwrap();
    let request: EngineRequest = serde_json::from_str(
        r#"{"op":"work_item_created","id":"t-huge","created_at":"2024-03-04T13:00:00Z","target_minutes":9223372036854775807}"#,
    )
    .unwrap();
    let EngineResponse::Deadline(created) = handle(&engine, request).await.unwrap() else {
        panic!("expected a deadline");
    };
    let created_at = Utc.with_ymd_and_hms(2024, 3, 4, 13, 0, 0).unwrap();
    assert_eq!(created.deadline, created_at + Duration::minutes(MAX_TARGET_MINUTES));
    assert!(created.half_elapsed_at > created_at);

    let EngineResponse::WorkItem(item) =
        handle(&engine, EngineRequest::WorkItemAssigned { id: "t-huge".into() })
            .await
            .unwrap()
    else {
        panic!("expected a work item");
    };
    assert_eq!(item.target_minutes, MAX_TARGET_MINUTES);
}

#[tokio::test]
async fn test_handle_promotes_on_request() {
    let mut config = sample_config();
    config.auto_promote = false;
    let sink = InMemoryEventSink::new(64);
    let engine = EngineBuilder::new(config)
        .with_event_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();
    let key = QueueKey::new("billing");

    let mut ids = Vec::new();
    for requester in ["r-1", "r-2"] {
        let EngineResponse::Admission(outcome) = handle(
            &engine,
            EngineRequest::AdmissionRequested {
                queue_key: key.clone(),
                requester: requester.into(),
            },
        )
        .await
        .unwrap() else {
            panic!("expected an admission");
        };
        assert_eq!(outcome.entry.status, EntryStatus::Queued);
        ids.push(outcome.entry.id);
    }

    let head: EngineRequest =
        serde_json::from_str(r#"{"op":"promotion_requested","queue_key":"billing"}"#).unwrap();
    let EngineResponse::Promoted { entry: Some(promoted) } = handle(&engine, head).await.unwrap()
    else {
        panic!("expected a promotion");
    };
    assert_eq!(promoted.id, ids[0]);
    assert_eq!(promoted.status, EntryStatus::Active);

    // one attendant slot, already taken
    let err = handle(
        &engine,
        EngineRequest::PromotionRequested {
            queue_key: key.clone(),
            entry_id: Some(ids[1]),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }));
    let response = handle(
        &engine,
        EngineRequest::PromotionRequested {
            queue_key: key.clone(),
            entry_id: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(response, EngineResponse::Promoted { entry: None });

    handle(
        &engine,
        EngineRequest::AssignmentResolved {
            entry_id: ids[0],
            outcome: AssignmentOutcome::Completed,
        },
    )
    .await
    .unwrap();
    let response = handle(
        &engine,
        EngineRequest::PromotionRequested {
            queue_key: key.clone(),
            entry_id: Some(ids[1]),
        },
    )
    .await
    .unwrap();
    assert!(matches!(
        response,
        EngineResponse::Promoted { entry: Some(ref e) } if e.id == ids[1]
    ));

    let promoted_events = sink.of_kind(EventKind::EntryPromoted);
    assert_eq!(promoted_events.len(), 2);
    assert_eq!(promoted_events[0].subject, ids[0].to_string());
    assert_eq!(promoted_events[1].subject, ids[1].to_string());
}
