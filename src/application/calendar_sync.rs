use std::sync::Arc;

use crate::domain::models::{EventDescriptor, StudySession};
use crate::infrastructure::calendar_client::{CalendarClient, CreatedEvent};
use crate::infrastructure::error::CoreError;
use crate::infrastructure::event_ledger::EventLedger;
use crate::infrastructure::event_payload::encode_event;

/// A descriptor paired with the schedule entry it was derived from, so a
/// per-item failure can be reported against its source row.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEvent {
    pub source: StudySession,
    pub descriptor: EventDescriptor,
}

impl PlannedEvent {
    pub fn new(source: StudySession, descriptor: EventDescriptor) -> Self {
        Self { source, descriptor }
    }
}

#[derive(Debug, Clone, serde::Serialize, PartialEq)]
pub struct SyncFailure {
    pub message: String,
    pub session: StudySession,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Created(CreatedEvent),
    Failed(SyncFailure),
}

impl SyncOutcome {
    pub fn created(&self) -> Option<&CreatedEvent> {
        match self {
            SyncOutcome::Created(event) => Some(event),
            SyncOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&SyncFailure> {
        match self {
            SyncOutcome::Created(_) => None,
            SyncOutcome::Failed(failure) => Some(failure),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct DeleteFailure {
    pub event_id: String,
    pub message: String,
}

#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: usize,
    pub failures: Vec<DeleteFailure>,
}

/// Applies planned events against the external calendar, one item at a
/// time, in input order.
///
/// Neither operation is transactional: a per-item failure is recorded and
/// the loop continues, so one bad event never aborts the rest of the plan.
/// Created IDs go into the ledger as soon as the calendar confirms them,
/// inside the loop, so a crash mid-batch cannot orphan events that were
/// already created. There is no automatic retry; event insertion is not
/// idempotent, and the per-item failure record carries enough context for
/// the caller to retry individual rows.
pub struct PlanSyncService<C, L>
where
    C: CalendarClient,
    L: EventLedger,
{
    calendar_client: Arc<C>,
    ledger: Arc<L>,
}

impl<C, L> PlanSyncService<C, L>
where
    C: CalendarClient,
    L: EventLedger,
{
    pub fn new(calendar_client: Arc<C>, ledger: Arc<L>) -> Self {
        Self {
            calendar_client,
            ledger,
        }
    }

    /// Creates one calendar event per planned item. The returned outcomes
    /// are 1:1 with the input, in input order. Only an internal ledger
    /// fault aborts the batch; calendar failures never do.
    pub async fn sync_create(
        &self,
        access_token: &str,
        calendar_id: &str,
        planned: &[PlannedEvent],
    ) -> Result<Vec<SyncOutcome>, CoreError> {
        let mut outcomes = Vec::with_capacity(planned.len());

        for item in planned {
            let payload = encode_event(&item.descriptor);
            match self
                .calendar_client
                .insert_event(access_token, calendar_id, &payload)
                .await
            {
                Ok(created) => {
                    self.ledger.record(&created.id)?;
                    outcomes.push(SyncOutcome::Created(created));
                }
                Err(error) => outcomes.push(SyncOutcome::Failed(SyncFailure {
                    message: error.to_string(),
                    session: item.source.clone(),
                })),
            }
        }

        Ok(outcomes)
    }

    /// Best-effort bulk delete: failures are reported but never stop the
    /// remaining deletions. Returns the count of confirmed deletions.
    pub async fn sync_delete(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_ids: &[String],
    ) -> DeleteReport {
        let mut deleted = 0usize;
        let mut failures = Vec::new();

        for event_id in event_ids {
            match self
                .calendar_client
                .delete_event(access_token, calendar_id, event_id)
                .await
            {
                Ok(()) => deleted += 1,
                Err(error) => failures.push(DeleteFailure {
                    event_id: event_id.clone(),
                    message: error.to_string(),
                }),
            }
        }

        DeleteReport { deleted, failures }
    }
}
