use std::sync::{Mutex, PoisonError};

use crate::infrastructure::error::CoreError;

/// Tracks the calendar event IDs created in the current plan-generation
/// cycle. The successful entries recorded here are the exact and only set
/// of events eligible for a later bulk delete; the owning session clears
/// the ledger on teardown and replaces it when a new plan is generated.
pub trait EventLedger: Send + Sync {
    fn record(&self, event_id: &str) -> Result<(), CoreError>;
    fn all(&self) -> Result<Vec<String>, CoreError>;
    fn count(&self) -> Result<usize, CoreError>;
    fn clear(&self) -> Result<(), CoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventLedger {
    created: Mutex<Vec<String>>,
}

impl InMemoryEventLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLedger for InMemoryEventLedger {
    fn record(&self, event_id: &str) -> Result<(), CoreError> {
        let event_id = event_id.trim();
        if event_id.is_empty() {
            return Err(CoreError::Internal(
                "event id is required for ledger record".to_string(),
            ));
        }
        // Held only for the push; a panicking holder leaves the data intact.
        let mut created = self
            .created
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        created.push(event_id.to_string());
        Ok(())
    }

    fn all(&self) -> Result<Vec<String>, CoreError> {
        let created = self
            .created
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(created.clone())
    }

    fn count(&self) -> Result<usize, CoreError> {
        let created = self
            .created
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(created.len())
    }

    fn clear(&self) -> Result<(), CoreError> {
        let mut created = self
            .created
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        created.clear();
        Ok(())
    }
}
