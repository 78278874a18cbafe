use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Lifecycle step of a planning session. Operations on the session are only
/// valid in specific steps; see `application::session`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStep {
    Connect,
    Upload,
    Display,
}

impl SessionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStep::Connect => "connect",
            SessionStep::Upload => "upload",
            SessionStep::Display => "display",
        }
    }
}

impl std::fmt::Display for SessionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured plan artifact produced by the language model.
///
/// `schedule` is the sync-relevant part; `topics` is presentation material
/// and may be absent. Dates stay as `YYYY-MM-DD` strings here and only
/// become zoned timestamps at mapping time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanDocument {
    #[serde(default = "default_plan_title")]
    pub title: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
    pub schedule: Vec<StudySession>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub resources: Vec<String>,
}

impl Topic {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.name, "topic.name")
    }
}

/// One scheduled study block, the source data for exactly one calendar event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudySession {
    pub date: String,
    pub topic: String,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
    pub objective: Option<String>,
    #[serde(default)]
    pub resources: Vec<String>,
}

impl StudySession {
    /// `date` and `topic` determine event identity and timing, so they are
    /// never substituted with defaults; `duration_minutes` defaults to 60
    /// at deserialization but zero is still invalid.
    pub fn validate(&self) -> Result<(), String> {
        validate_date(&self.date, "session.date")?;
        validate_non_empty(&self.topic, "session.topic")?;
        if self.duration_minutes == 0 {
            return Err("session.duration_minutes must be > 0".to_string());
        }
        Ok(())
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }
}

pub(crate) fn default_plan_title() -> String {
    "Your Study Plan".to_string()
}

fn default_duration_minutes() -> u32 {
    60
}

/// Calendar-ready form of one StudySession. Constructed fresh for every sync
/// attempt, never mutated, consumed exactly once by the sync engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDescriptor {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// Refreshable authorization artifact granting calendar write access.
/// A missing expiry is treated as still valid; refresh decisions lean on
/// `is_valid_at` with a leeway so tokens are renewed before they lapse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub token_type: String,
    pub scope: Option<String>,
}

impl Credential {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        if self.access_token.trim().is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at > now + chrono::Duration::seconds(leeway_seconds),
            None => true,
        }
    }
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}

pub fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    parse_hhmm(value).ok_or_else(|| format!("{field_name} must be HH:MM"))?;
    Ok(())
}

pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_session() -> StudySession {
        StudySession {
            date: "2025-11-01".to_string(),
            topic: "Recursion".to_string(),
            duration_minutes: 90,
            objective: Some("Learn base cases".to_string()),
            resources: vec!["https://example.com/recursion".to_string()],
        }
    }

    fn sample_plan() -> PlanDocument {
        PlanDocument {
            title: "Algorithms Week".to_string(),
            topics: vec![Topic {
                name: "Recursion".to_string(),
                summary: "Self-referential problem decomposition".to_string(),
                estimated_hours: Some(3.0),
                resources: vec!["CLRS ch. 4".to_string()],
            }],
            schedule: vec![sample_session()],
        }
    }

    fn sample_credential() -> Credential {
        Credential {
            access_token: "at-123".to_string(),
            refresh_token: Some("rt-456".to_string()),
            expires_at: Some(fixed_time("2026-02-16T10:00:00Z")),
            token_type: "Bearer".to_string(),
            scope: Some("https://www.googleapis.com/auth/calendar.events".to_string()),
        }
    }

    #[test]
    fn session_validate_accepts_valid_session() {
        assert!(sample_session().validate().is_ok());
    }

    #[test]
    fn session_validate_rejects_blank_topic() {
        let mut session = sample_session();
        session.topic = "   ".to_string();
        assert!(session.validate().is_err());
    }

    #[test]
    fn session_validate_rejects_malformed_date() {
        let mut session = sample_session();
        session.date = "01-11-2025".to_string();
        assert!(session.validate().is_err());
    }

    #[test]
    fn session_validate_rejects_zero_duration() {
        let mut session = sample_session();
        session.duration_minutes = 0;
        assert!(session.validate().is_err());
    }

    #[test]
    fn topic_validate_rejects_empty_name() {
        let topic = Topic {
            name: "".to_string(),
            summary: String::new(),
            estimated_hours: None,
            resources: Vec::new(),
        };
        assert!(topic.validate().is_err());
    }

    #[test]
    fn session_duration_defaults_to_sixty_minutes() {
        let session: StudySession =
            serde_json::from_str(r#"{"date":"2025-11-01","topic":"Graphs"}"#)
                .expect("deserialize session");
        assert_eq!(session.duration_minutes, 60);
        assert!(session.objective.is_none());
        assert!(session.resources.is_empty());
    }

    #[test]
    fn plan_title_defaults_to_placeholder() {
        let plan: PlanDocument =
            serde_json::from_str(r#"{"schedule":[{"date":"2025-11-01","topic":"Graphs"}]}"#)
                .expect("deserialize plan");
        assert_eq!(plan.title, "Your Study Plan");
        assert!(plan.topics.is_empty());
    }

    #[test]
    fn credential_validity_honors_expiry_and_leeway() {
        let credential = sample_credential();
        let before = fixed_time("2026-02-16T09:00:00Z");
        let inside_leeway = fixed_time("2026-02-16T09:59:31Z");
        let after = fixed_time("2026-02-16T11:00:00Z");

        assert!(credential.is_valid_at(before, 60));
        assert!(!credential.is_valid_at(inside_leeway, 60));
        assert!(!credential.is_valid_at(after, 60));
    }

    #[test]
    fn credential_without_expiry_counts_as_valid() {
        let mut credential = sample_credential();
        credential.expires_at = None;
        assert!(credential.is_valid_at(fixed_time("2030-01-01T00:00:00Z"), 60));

        credential.access_token = "  ".to_string();
        assert!(!credential.is_valid_at(fixed_time("2030-01-01T00:00:00Z"), 60));
    }

    #[test]
    fn plan_document_supports_serde_roundtrip() {
        let plan = sample_plan();
        let roundtrip: PlanDocument =
            serde_json::from_str(&serde_json::to_string(&plan).expect("serialize plan"))
                .expect("deserialize plan");
        assert_eq!(roundtrip, plan);
    }

    proptest! {
        #[test]
        fn any_calendar_date_in_range_validates(
            year in 2000i32..2100i32,
            month in 1u32..=12u32,
            day in 1u32..=28u32
        ) {
            let mut session = sample_session();
            session.date = format!("{year:04}-{month:02}-{day:02}");
            prop_assert!(session.validate().is_ok());
        }
    }

    proptest! {
        #[test]
        fn positive_durations_always_validate(duration in 1u32..=6000u32) {
            let mut session = sample_session();
            session.duration_minutes = duration;
            prop_assert!(session.validate().is_ok());
        }
    }
}
