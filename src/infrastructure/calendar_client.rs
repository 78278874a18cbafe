use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use crate::infrastructure::error::CoreError;
use crate::infrastructure::event_payload::CalendarEventPayload;

const CALENDAR_LIST_ENDPOINT: &str =
    "https://www.googleapis.com/calendar/v3/users/me/calendarList";
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

// accessRole values that permit event creation.
const WRITABLE_ROLES: [&str; 2] = ["owner", "writer"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarInfo {
    pub id: String,
    pub summary: String,
    pub primary: bool,
    pub access_role: Option<String>,
}

impl CalendarInfo {
    pub fn is_writable(&self) -> bool {
        self.access_role
            .as_deref()
            .is_some_and(|role| WRITABLE_ROLES.contains(&role))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

/// Capability the sync engine needs from the external calendar: create an
/// event, delete an event, enumerate the user's calendars. Implemented over
/// REST in production and by scripted fakes in tests.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn list_calendars(&self, access_token: &str) -> Result<Vec<CalendarInfo>, CoreError>;

    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &CalendarEventPayload,
    ) -> Result<CreatedEvent, CoreError>;

    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestGoogleCalendarClient {
    client: Client,
}

impl ReqwestGoogleCalendarClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), CoreError> {
        if value.trim().is_empty() {
            return Err(CoreError::Calendar(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn calendar_http_error(status: reqwest::StatusCode, body: &str) -> CoreError {
        let message = if body.trim().is_empty() {
            format!("google calendar api error: http {}", status.as_u16())
        } else {
            format!(
                "google calendar api error: http {}; body={body}",
                status.as_u16()
            )
        };
        CoreError::Calendar(message)
    }

    fn events_endpoint(calendar_id: &str) -> Result<Url, CoreError> {
        let mut url = Url::parse(CALENDAR_API_BASE).map_err(|error| {
            CoreError::Calendar(format!("invalid calendar api base url: {error}"))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                CoreError::Calendar("calendar api base URL cannot be a base".to_string())
            })?;
            segments.push("calendars");
            segments.push(calendar_id);
            segments.push("events");
        }
        Ok(url)
    }

    fn event_endpoint(calendar_id: &str, event_id: &str) -> Result<Url, CoreError> {
        let mut url = Self::events_endpoint(calendar_id)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                CoreError::Calendar("calendar events URL cannot be a base".to_string())
            })?;
            segments.push(event_id);
        }
        Ok(url)
    }
}

#[derive(Debug, serde::Deserialize)]
struct CalendarListResponse {
    items: Option<Vec<CalendarListItem>>,
}

#[derive(Debug, serde::Deserialize)]
struct CalendarListItem {
    id: String,
    summary: Option<String>,
    primary: Option<bool>,
    #[serde(rename = "accessRole")]
    access_role: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct CreatedEventResponse {
    id: Option<String>,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

#[async_trait]
impl CalendarClient for ReqwestGoogleCalendarClient {
    async fn list_calendars(&self, access_token: &str) -> Result<Vec<CalendarInfo>, CoreError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let response = self
            .client
            .get(CALENDAR_LIST_ENDPOINT)
            .query(&[("maxResults", 250)])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| {
                CoreError::Calendar(format!("network error while listing calendars: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            CoreError::Calendar(format!("failed reading calendar list response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::calendar_http_error(status, &body));
        }

        let parsed: CalendarListResponse = serde_json::from_str(&body).map_err(|error| {
            CoreError::Calendar(format!("invalid calendar list payload: {error}; body={body}"))
        })?;

        Ok(parsed
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let id = item.id.trim();
                if id.is_empty() {
                    return None;
                }
                let summary = item
                    .summary
                    .unwrap_or_else(|| id.to_string())
                    .trim()
                    .to_string();
                Some(CalendarInfo {
                    id: id.to_string(),
                    summary,
                    primary: item.primary.unwrap_or(false),
                    access_role: item.access_role,
                })
            })
            .collect())
    }

    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &CalendarEventPayload,
    ) -> Result<CreatedEvent, CoreError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let endpoint = Self::events_endpoint(calendar_id)?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|error| {
                CoreError::Calendar(format!("network error while creating event: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            CoreError::Calendar(format!("failed reading event create response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::calendar_http_error(status, &body));
        }

        let parsed: CreatedEventResponse = serde_json::from_str(&body).map_err(|error| {
            CoreError::Calendar(format!("invalid event create payload: {error}; body={body}"))
        })?;
        let id = parsed
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                CoreError::Calendar("event create response did not include id".to_string())
            })?;

        Ok(CreatedEvent {
            id,
            html_link: parsed.html_link,
        })
    }

    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CoreError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;
        Self::ensure_non_empty(event_id, "event id")?;

        let endpoint = Self::event_endpoint(calendar_id, event_id)?;
        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| {
                CoreError::Calendar(format!("network error while deleting event: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            CoreError::Calendar(format!("failed reading event delete response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::calendar_http_error(status, &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendar(role: Option<&str>) -> CalendarInfo {
        CalendarInfo {
            id: "cal-1".to_string(),
            summary: "Studies".to_string(),
            primary: false,
            access_role: role.map(str::to_string),
        }
    }

    #[test]
    fn owner_and_writer_roles_are_writable() {
        assert!(calendar(Some("owner")).is_writable());
        assert!(calendar(Some("writer")).is_writable());
    }

    #[test]
    fn reader_and_unknown_roles_are_not_writable() {
        assert!(!calendar(Some("reader")).is_writable());
        assert!(!calendar(Some("freeBusyReader")).is_writable());
        assert!(!calendar(None).is_writable());
    }
}
