//! SLA deadline lifecycle for a single work item.
//!
//! The clock is a pure state machine (`Running`, `Paused`, `Resolved`). Every
//! transition takes a work item snapshot and returns a new snapshot; the
//! caller persists it. Transitions that do not apply return the snapshot
//! unchanged, so late calendar ticks can never resurrect a closed item.
//!
//! Deadline bookkeeping always satisfies
//! `deadline == created_at + target + paused` and
//! `half_elapsed_at == created_at + (deadline - created_at) / 2`.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::calendar::{self, BusinessCalendarPolicy};
use crate::util::types::WorkItemId;

/// Lifecycle status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    /// Created and waiting for an attendant.
    Open,
    /// Picked up by an attendant.
    Active,
    /// Closed; SLA bookkeeping is frozen.
    Resolved,
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Active => "active",
            Self::Resolved => "resolved",
        };
        f.write_str(s)
    }
}

/// State of the SLA clock derived from a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockState {
    /// Deadline is accruing.
    Running,
    /// Accrual suspended outside business hours.
    Paused,
    /// Terminal.
    Resolved,
}

/// Ticket or assistance request tracked against an SLA target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Work item identifier.
    pub id: WorkItemId,
    /// Instant the item was opened.
    pub created_at: DateTime<Utc>,
    /// Nominal SLA target in whole minutes.
    pub target_minutes: i64,
    /// Current deadline.
    pub deadline: DateTime<Utc>,
    /// When the current pause began; `Some` iff the clock is paused.
    pub paused_at: Option<DateTime<Utc>>,
    /// Total paused minutes so far; `None` until the first pause.
    pub paused_minutes: Option<i64>,
    /// Instant at which half of the effective duration has elapsed.
    pub half_elapsed_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: WorkItemStatus,
    /// Optimistic concurrency counter maintained by the store.
    #[serde(default)]
    pub version: u64,
}

impl WorkItem {
    /// Whether the clock is currently paused.
    pub const fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Derived clock state.
    pub const fn clock_state(&self) -> ClockState {
        match (self.status, self.paused_at) {
            (WorkItemStatus::Resolved, _) => ClockState::Resolved,
            (_, Some(_)) => ClockState::Paused,
            (_, None) => ClockState::Running,
        }
    }

    /// Nominal target as a duration.
    pub fn target(&self) -> Duration {
        Duration::minutes(self.target_minutes.clamp(0, MAX_TARGET_MINUTES))
    }

    /// Target plus all paused time accumulated so far.
    pub fn effective_duration(&self) -> Duration {
        self.deadline - self.created_at
    }
}

/// Result of a clock transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The transition applied and the item changed.
    Applied(WorkItem),
    /// The transition did not apply; the item is returned as given.
    Unchanged(WorkItem),
}

impl Transition {
    /// Whether the item changed.
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Borrow the resulting item.
    pub const fn item(&self) -> &WorkItem {
        match self {
            Self::Applied(item) | Self::Unchanged(item) => item,
        }
    }

    /// Take the resulting item.
    pub fn into_item(self) -> WorkItem {
        match self {
            Self::Applied(item) | Self::Unchanged(item) => item,
        }
    }
}

/// Early-warning classification of a work item at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    /// Less than half of the effective duration has elapsed.
    OnTrack,
    /// Past the half-elapsed checkpoint but before the deadline.
    HalfElapsed,
    /// Past the deadline.
    Breached,
}

/// Largest accepted SLA target, ten years of minutes. Longer targets are
/// clamped.
pub const MAX_TARGET_MINUTES: i64 = 10 * 366 * 24 * 60;

/// `from + minutes`, saturating at the representable range.
fn shift(from: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    Duration::try_minutes(minutes)
        .and_then(|d| from.checked_add_signed(d))
        .unwrap_or(if minutes < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

fn half_point(created_at: DateTime<Utc>, deadline: DateTime<Utc>) -> DateTime<Utc> {
    let window = (deadline - created_at).num_seconds();
    created_at + Duration::seconds(window / 2)
}

/// SLA clock bound to a business calendar policy.
#[derive(Debug, Clone)]
pub struct SlaClock {
    policy: Arc<BusinessCalendarPolicy>,
}

impl SlaClock {
    /// Create a clock for `policy`.
    pub fn new(policy: Arc<BusinessCalendarPolicy>) -> Self {
        Self { policy }
    }

    /// Calendar policy driving pause accounting.
    pub fn policy(&self) -> &BusinessCalendarPolicy {
        &self.policy
    }

    /// Open a work item with a naive deadline of `created_at + target`.
    ///
    /// Targets are clamped to `0..=MAX_TARGET_MINUTES`.
    pub fn open(&self, id: WorkItemId, created_at: DateTime<Utc>, target_minutes: i64) -> WorkItem {
        let target_minutes = target_minutes.clamp(0, MAX_TARGET_MINUTES);
        let deadline = shift(created_at, target_minutes);
        WorkItem {
            id,
            created_at,
            target_minutes,
            deadline,
            paused_at: None,
            paused_minutes: None,
            half_elapsed_at: half_point(created_at, deadline),
            status: WorkItemStatus::Open,
            version: 0,
        }
    }

    /// Suspend accrual at `now`. No-op unless the clock is running.
    pub fn pause(&self, item: WorkItem, now: DateTime<Utc>) -> Transition {
        if item.clock_state() != ClockState::Running {
            return Transition::Unchanged(item);
        }
        Transition::Applied(WorkItem {
            paused_at: Some(now),
            paused_minutes: Some(item.paused_minutes.unwrap_or(0)),
            ..item
        })
    }

    /// Resume accrual at `now`, crediting the paused span to the deadline.
    ///
    /// Paused time is truncated to whole minutes, so the credit never exceeds
    /// what actually elapsed. A `now` earlier than the pause credits nothing.
    pub fn resume(&self, item: WorkItem, now: DateTime<Utc>) -> Transition {
        let Some(paused_at) = item.paused_at else {
            return Transition::Unchanged(item);
        };
        if item.status == WorkItemStatus::Resolved {
            return Transition::Unchanged(item);
        }
        let elapsed = calendar::paused_minutes_between(&self.policy, paused_at, now);
        let paused_minutes = item.paused_minutes.unwrap_or(0).saturating_add(elapsed);
        let deadline = shift(
            item.created_at,
            item.target_minutes.saturating_add(paused_minutes),
        );
        Transition::Applied(WorkItem {
            deadline,
            half_elapsed_at: half_point(item.created_at, deadline),
            paused_at: None,
            paused_minutes: Some(paused_minutes),
            ..item
        })
    }

    /// Mark the item as picked up by an attendant. Clock state is untouched.
    pub fn activate(&self, item: WorkItem) -> Transition {
        if item.status != WorkItemStatus::Open {
            return Transition::Unchanged(item);
        }
        Transition::Applied(WorkItem {
            status: WorkItemStatus::Active,
            ..item
        })
    }

    /// Close the item. Deadline and pause bookkeeping freeze as they are.
    pub fn resolve(&self, item: WorkItem, _now: DateTime<Utc>) -> Transition {
        if item.status == WorkItemStatus::Resolved {
            return Transition::Unchanged(item);
        }
        Transition::Applied(WorkItem {
            status: WorkItemStatus::Resolved,
            ..item
        })
    }

    /// Classify `item` against its checkpoints at `now`.
    ///
    /// While paused, the comparison uses the pause instant: time spent paused
    /// cannot push an item towards breach.
    pub fn status(&self, item: &WorkItem, now: DateTime<Utc>) -> SlaStatus {
        let at = item.paused_at.map_or(now, |p| p.min(now));
        if at >= item.deadline {
            SlaStatus::Breached
        } else if at >= item.half_elapsed_at {
            SlaStatus::HalfElapsed
        } else {
            SlaStatus::OnTrack
        }
    }
}
