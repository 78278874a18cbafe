use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::infrastructure::calendar_client::{CalendarClient, CalendarInfo};
use crate::infrastructure::config::{ensure_default_configs, read_calendar_config, save_calendar_id};
use crate::infrastructure::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarChoice {
    Configured(String),
    PickedPrimary(String),
    PickedFirstWritable(String),
}

impl CalendarChoice {
    pub fn calendar_id(&self) -> &str {
        match self {
            CalendarChoice::Configured(id)
            | CalendarChoice::PickedPrimary(id)
            | CalendarChoice::PickedFirstWritable(id) => id,
        }
    }
}

/// Resolves which calendar study events land on: the configured id if one
/// is saved, otherwise the primary writable calendar, otherwise the first
/// writable one. A pick is persisted so later runs reuse it.
pub struct TargetCalendarResolver<C>
where
    C: CalendarClient,
{
    config_dir: PathBuf,
    calendar_client: Arc<C>,
}

impl<C> TargetCalendarResolver<C>
where
    C: CalendarClient,
{
    pub fn new(config_dir: impl AsRef<Path>, calendar_client: Arc<C>) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
            calendar_client,
        }
    }

    pub async fn resolve(&self, access_token: &str) -> Result<CalendarChoice, CoreError> {
        ensure_default_configs(&self.config_dir)?;

        if let Some(calendar_id) = read_calendar_config(&self.config_dir)?.calendar_id {
            return Ok(CalendarChoice::Configured(calendar_id));
        }

        let writable = self.list_writable(access_token).await?;
        if writable.is_empty() {
            return Err(CoreError::Calendar(
                "no writable calendar available for this account".to_string(),
            ));
        }

        if let Some(primary) = writable.iter().find(|calendar| calendar.primary) {
            save_calendar_id(&self.config_dir, &primary.id)?;
            return Ok(CalendarChoice::PickedPrimary(primary.id.clone()));
        }

        let first = &writable[0];
        save_calendar_id(&self.config_dir, &first.id)?;
        Ok(CalendarChoice::PickedFirstWritable(first.id.clone()))
    }

    /// Calendars the account can create events on, in the order the API
    /// returned them.
    pub async fn list_writable(&self, access_token: &str) -> Result<Vec<CalendarInfo>, CoreError> {
        Ok(self
            .calendar_client
            .list_calendars(access_token)
            .await?
            .into_iter()
            .filter(CalendarInfo::is_writable)
            .collect())
    }
}
