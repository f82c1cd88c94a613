//! API-facing request/response models.
//!
//! Transports (HTTP, RPC, queue consumers) deserialize an [`EngineRequest`],
//! pass it to [`handle`], and serialize the [`EngineResponse`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    AdmissionOutcome, AssignmentOutcome, CreatedWorkItem, EngineResult, Orchestrator, Position,
    QueueEntry, TickDirection, TickReport, WorkItem,
};
use crate::util::types::{EntryId, QueueKey, RequesterId, WorkItemId};

/// Operations collaborators may invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum EngineRequest {
    /// A work item opened.
    WorkItemCreated {
        /// Work item id.
        id: WorkItemId,
        /// Creation instant.
        created_at: DateTime<Utc>,
        /// SLA target in minutes.
        target_minutes: i64,
    },
    /// A scheduled business-hours boundary fired.
    CalendarTick {
        /// Which boundary.
        direction: TickDirection,
        /// Instant of the tick.
        at: DateTime<Utc>,
    },
    /// A requester asked to join a queue.
    AdmissionRequested {
        /// Queue to join.
        queue_key: QueueKey,
        /// Who is asking.
        requester: RequesterId,
    },
    /// An operator asked to serve a queued entry, or the head of the line.
    PromotionRequested {
        /// Queue to promote in.
        queue_key: QueueKey,
        /// Specific entry; `None` promotes the earliest queued one.
        #[serde(default)]
        entry_id: Option<EntryId>,
    },
    /// An assignment finished.
    AssignmentResolved {
        /// Entry that was served or dropped.
        entry_id: EntryId,
        /// How it ended.
        outcome: AssignmentOutcome,
    },
    /// A work item was picked up by an attendant.
    WorkItemAssigned {
        /// Work item id.
        id: WorkItemId,
    },
    /// A work item was resolved.
    WorkItemResolved {
        /// Work item id.
        id: WorkItemId,
        /// Resolution instant.
        at: DateTime<Utc>,
    },
    /// Look up a queue entry's position.
    PositionQuery {
        /// Queue of the entry.
        queue_key: QueueKey,
        /// Entry to locate.
        entry_id: EntryId,
    },
}

/// Results matching [`EngineRequest`] variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum EngineResponse {
    /// Deadline of a created work item.
    Deadline(CreatedWorkItem),
    /// Calendar sweep summary.
    Tick(TickReport),
    /// Admission result.
    Admission(AdmissionOutcome),
    /// Updated queue entry.
    Entry(QueueEntry),
    /// Promotion result.
    Promoted {
        /// Entry now being served; `None` when nobody was promoted.
        entry: Option<QueueEntry>,
    },
    /// Updated work item.
    WorkItem(WorkItem),
    /// Entry position.
    Position {
        /// Entry that was located.
        entry_id: EntryId,
        /// Its position.
        position: Position,
    },
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

/// Dispatch a request to the orchestrator.
pub async fn handle(engine: &Orchestrator, request: EngineRequest) -> EngineResult<EngineResponse> {
    let response = match request {
        EngineRequest::WorkItemCreated {
            id,
            created_at,
            target_minutes,
        } => EngineResponse::Deadline(
            engine
                .on_work_item_created(id, created_at, target_minutes)
                .await?,
        ),
        EngineRequest::CalendarTick { direction, at } => {
            EngineResponse::Tick(engine.on_calendar_tick(direction, at).await?)
        }
        EngineRequest::AdmissionRequested {
            queue_key,
            requester,
        } => EngineResponse::Admission(engine.on_admission_requested(queue_key, requester).await?),
        EngineRequest::PromotionRequested {
            queue_key,
            entry_id,
        } => EngineResponse::Promoted {
            entry: engine.on_promotion_requested(queue_key, entry_id).await?,
        },
        EngineRequest::AssignmentResolved { entry_id, outcome } => {
            EngineResponse::Entry(engine.on_assignment_resolved(entry_id, outcome).await?)
        }
        EngineRequest::WorkItemAssigned { id } => {
            EngineResponse::WorkItem(engine.on_work_item_assigned(&id).await?)
        }
        EngineRequest::WorkItemResolved { id, at } => {
            EngineResponse::WorkItem(engine.on_work_item_resolved(&id, at).await?)
        }
        EngineRequest::PositionQuery {
            queue_key,
            entry_id,
        } => EngineResponse::Position {
            entry_id,
            position: engine.position(&queue_key, entry_id).await?,
        },
    };
    Ok(response)
}

/// Return a health payload.
pub const fn health() -> Health {
    Health { ok: true }
}
