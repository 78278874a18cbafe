use crate::domain::models::EventDescriptor;

/// Wire shape of a Google Calendar event body. The calendar itself is an
/// API path parameter, not part of the body.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventDateTimePayload {
    #[serde(rename = "dateTime")]
    pub date_time: String,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CalendarEventPayload {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: EventDateTimePayload,
    pub end: EventDateTimePayload,
}

pub fn encode_event(descriptor: &EventDescriptor) -> CalendarEventPayload {
    let description = if descriptor.description.trim().is_empty() {
        None
    } else {
        Some(descriptor.description.clone())
    };

    CalendarEventPayload {
        summary: descriptor.summary.clone(),
        description,
        start: EventDateTimePayload {
            date_time: descriptor.start.to_rfc3339(),
            time_zone: Some(descriptor.start.timezone().name().to_string()),
        },
        end: EventDateTimePayload {
            date_time: descriptor.end.to_rfc3339(),
            time_zone: Some(descriptor.end.timezone().name().to_string()),
        },
    }
}
