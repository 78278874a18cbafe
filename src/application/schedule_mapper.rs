use chrono::{DateTime, LocalResult, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::domain::models::{EventDescriptor, PlanDocument, StudySession};
use crate::infrastructure::error::CoreError;

/// Converts a validated plan into calendar-ready descriptors, one per
/// schedule entry, preserving schedule order.
///
/// Pure: no I/O, deterministic for identical inputs. End times use
/// wall-clock arithmetic — the naive local start plus `duration_minutes`,
/// localized afterwards — so a session spanning a DST transition still ends
/// `duration_minutes` of local clock time after it starts. The only failure
/// mode is a session whose local times cannot be resolved (malformed date,
/// or a start/end falling into a DST gap), reported with the offending
/// index.
pub fn map_schedule(
    plan: &PlanDocument,
    start_time: NaiveTime,
    timezone: Tz,
) -> Result<Vec<EventDescriptor>, CoreError> {
    plan.schedule
        .iter()
        .enumerate()
        .map(|(index, session)| map_session(index, session, start_time, timezone))
        .collect()
}

fn map_session(
    index: usize,
    session: &StudySession,
    start_time: NaiveTime,
    timezone: Tz,
) -> Result<EventDescriptor, CoreError> {
    let date = session.start_date().ok_or_else(|| CoreError::Mapping {
        index,
        reason: format!("invalid date '{}'", session.date),
    })?;

    let naive_start = date.and_time(start_time);
    let naive_end = naive_start + chrono::Duration::minutes(i64::from(session.duration_minutes));

    let start = resolve_local(naive_start, timezone).ok_or_else(|| CoreError::Mapping {
        index,
        reason: format!("local time {naive_start} does not exist in {timezone}"),
    })?;
    let end = resolve_local(naive_end, timezone).ok_or_else(|| CoreError::Mapping {
        index,
        reason: format!("local time {naive_end} does not exist in {timezone}"),
    })?;

    Ok(EventDescriptor {
        summary: event_summary(&session.topic),
        description: build_event_description(session.objective.as_deref(), &session.resources),
        start,
        end,
    })
}

// Ambiguous local times (DST fall-back) resolve to the earlier instant;
// nonexistent ones (spring-forward gap) have no sensible mapping.
fn resolve_local(naive: NaiveDateTime, timezone: Tz) -> Option<DateTime<Tz>> {
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(instant) => Some(instant),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => None,
    }
}

pub fn event_summary(topic: &str) -> String {
    format!("Study: {}", topic.trim())
}

/// Objective paragraph, blank line, then a bulleted resources block. Empty
/// parts contribute nothing, so there are never stray blank sections.
pub fn build_event_description(objective: Option<&str>, resources: &[String]) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(objective) = objective {
        let trimmed = objective.trim();
        if !trimmed.is_empty() {
            sections.push(trimmed.to_string());
        }
    }

    let bullets: Vec<String> = resources
        .iter()
        .map(|resource| resource.trim())
        .filter(|resource| !resource.is_empty())
        .map(|resource| format!("- {resource}"))
        .collect();
    if !bullets.is_empty() {
        sections.push(format!("Resources:\n{}", bullets.join("\n")));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;
    use proptest::prelude::*;

    fn session(date: &str, topic: &str, duration_minutes: u32) -> StudySession {
        StudySession {
            date: date.to_string(),
            topic: topic.to_string(),
            duration_minutes,
            objective: None,
            resources: Vec::new(),
        }
    }

    fn plan_of(schedule: Vec<StudySession>) -> PlanDocument {
        PlanDocument {
            title: "Plan".to_string(),
            topics: Vec::new(),
            schedule,
        }
    }

    fn nine_am() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).expect("valid time")
    }

    #[test]
    fn maps_kolkata_morning_session() {
        let mut entry = session("2025-11-01", "Recursion", 90);
        entry.objective = Some("Learn base cases".to_string());
        let plan = plan_of(vec![entry]);

        let descriptors =
            map_schedule(&plan, nine_am(), chrono_tz::Asia::Kolkata).expect("map plan");

        assert_eq!(descriptors.len(), 1);
        let descriptor = &descriptors[0];
        assert_eq!(descriptor.summary, "Study: Recursion");
        assert_eq!(descriptor.description, "Learn base cases");
        assert_eq!(descriptor.start.to_rfc3339(), "2025-11-01T09:00:00+05:30");
        assert_eq!(descriptor.end.to_rfc3339(), "2025-11-01T10:30:00+05:30");
    }

    #[test]
    fn end_minus_start_is_wall_clock_duration_across_fall_back() {
        // America/New_York leaves DST on 2025-11-02 at 02:00 local.
        let plan = plan_of(vec![session("2025-11-02", "Graphs", 180)]);
        let half_past_midnight = NaiveTime::from_hms_opt(0, 30, 0).expect("valid time");

        let descriptors = map_schedule(&plan, half_past_midnight, chrono_tz::America::New_York)
            .expect("map plan");
        let descriptor = &descriptors[0];

        let wall_clock = descriptor.end.naive_local() - descriptor.start.naive_local();
        assert_eq!(wall_clock, chrono::Duration::minutes(180));

        // The elapsed time includes the repeated hour.
        let elapsed = descriptor.end.clone() - descriptor.start.clone();
        assert_eq!(elapsed, chrono::Duration::minutes(240));
    }

    #[test]
    fn ambiguous_local_start_resolves_to_earlier_offset() {
        // 01:30 occurs twice on 2025-11-02 in America/New_York.
        let plan = plan_of(vec![session("2025-11-02", "Graphs", 30)]);
        let ambiguous = NaiveTime::from_hms_opt(1, 30, 0).expect("valid time");

        let descriptors =
            map_schedule(&plan, ambiguous, chrono_tz::America::New_York).expect("map plan");

        let offset_seconds = descriptors[0].start.offset().fix().local_minus_utc();
        assert_eq!(offset_seconds, -4 * 3600);
    }

    #[test]
    fn nonexistent_local_start_is_a_mapping_error() {
        // 02:30 does not exist on 2025-03-09 in America/New_York.
        let plan = plan_of(vec![session("2025-03-09", "Graphs", 60)]);
        let inside_gap = NaiveTime::from_hms_opt(2, 30, 0).expect("valid time");

        let error = map_schedule(&plan, inside_gap, chrono_tz::America::New_York)
            .expect_err("gap times cannot be mapped");
        match error {
            CoreError::Mapping { index, reason } => {
                assert_eq!(index, 0);
                assert!(reason.contains("does not exist"));
            }
            other => panic!("expected Mapping error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_date_names_the_offending_index() {
        let plan = plan_of(vec![
            session("2025-11-01", "Recursion", 60),
            session("tomorrow", "Graphs", 60),
        ]);

        let error = map_schedule(&plan, nine_am(), chrono_tz::UTC)
            .expect_err("malformed dates fail the mapping");
        match error {
            CoreError::Mapping { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("tomorrow"));
            }
            other => panic!("expected Mapping error, got {other:?}"),
        }
    }

    #[test]
    fn empty_schedule_maps_to_no_descriptors() {
        let descriptors = map_schedule(&plan_of(Vec::new()), nine_am(), chrono_tz::UTC)
            .expect("empty schedule is fine");
        assert!(descriptors.is_empty());
    }

    #[test]
    fn description_combines_objective_and_resources() {
        let description = build_event_description(
            Some("Master recursion"),
            &["CLRS ch. 4".to_string(), "https://example.com".to_string()],
        );
        assert_eq!(
            description,
            "Master recursion\n\nResources:\n- CLRS ch. 4\n- https://example.com"
        );
    }

    #[test]
    fn description_with_resources_only_has_no_leading_blank() {
        let description = build_event_description(None, &["CLRS ch. 4".to_string()]);
        assert_eq!(description, "Resources:\n- CLRS ch. 4");
    }

    #[test]
    fn description_with_objective_only_has_no_trailing_block() {
        let description = build_event_description(Some("Master recursion"), &[]);
        assert_eq!(description, "Master recursion");
    }

    #[test]
    fn description_of_empty_parts_is_empty() {
        let description = build_event_description(Some("   "), &["  ".to_string()]);
        assert_eq!(description, "");
    }

    proptest! {
        // One descriptor per session, same relative order.
        #[test]
        fn mapping_preserves_schedule_order(topics in proptest::collection::vec("[A-Za-z]{1,10}", 1..20)) {
            let schedule: Vec<StudySession> = topics
                .iter()
                .enumerate()
                .map(|(day, topic)| session(&format!("2025-11-{:02}", day + 1), topic, 45))
                .collect();
            let plan = plan_of(schedule);

            let descriptors = map_schedule(&plan, nine_am(), chrono_tz::UTC).expect("map plan");

            prop_assert_eq!(descriptors.len(), topics.len());
            for (descriptor, topic) in descriptors.iter().zip(topics.iter()) {
                prop_assert_eq!(&descriptor.summary, &format!("Study: {topic}"));
            }
        }
    }

    proptest! {
        // Wall-clock duration equals duration_minutes for any date and length.
        #[test]
        fn wall_clock_duration_matches_duration_minutes(
            year in 2000i32..2100i32,
            month in 1u32..=12u32,
            day in 1u32..=28u32,
            duration in 1u32..1440u32
        ) {
            let date = format!("{year:04}-{month:02}-{day:02}");
            let plan = plan_of(vec![session(&date, "Topic", duration)]);

            let descriptors = map_schedule(&plan, nine_am(), chrono_tz::Asia::Kolkata)
                .expect("Kolkata has no DST transitions in range");
            let descriptor = &descriptors[0];

            let wall_clock = descriptor.end.naive_local() - descriptor.start.naive_local();
            prop_assert_eq!(wall_clock, chrono::Duration::minutes(i64::from(duration)));
        }
    }
}
