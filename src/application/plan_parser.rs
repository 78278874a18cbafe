use serde_json::Value;

use crate::domain::models::{self, PlanDocument, StudySession, Topic};
use crate::infrastructure::error::CoreError;

/// Result of validating raw model output. Invalid entries are filtered out
/// individually instead of rejecting the whole document; each drop carries
/// its section, original index, and reason so the caller can log or display
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPlan {
    pub plan: PlanDocument,
    pub dropped: Vec<DroppedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEntry {
    pub section: PlanSection,
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSection {
    Topics,
    Schedule,
}

impl PlanSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanSection::Topics => "topics",
            PlanSection::Schedule => "schedule",
        }
    }
}

/// Parses untrusted model output into a validated plan.
///
/// Two-stage strategy: parse the whole text as JSON first; if that fails,
/// extract the first balanced `{ ... }` span and retry on that substring
/// only. This repairs the common case of JSON wrapped in prose or markdown
/// fences. A text yielding no parsable span is a `Parse` error, never a
/// panic.
pub fn parse_plan(raw: &str) -> Result<ParsedPlan, CoreError> {
    let value = parse_json_value(raw)?;
    let root = value
        .as_object()
        .ok_or_else(|| CoreError::Parse("plan is not a JSON object".to_string()))?;

    let title = root
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(models::default_plan_title);

    let mut dropped = Vec::new();

    let topics = match root.get("topics") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => collect_topics(items, &mut dropped),
        Some(_) => {
            dropped.push(DroppedEntry {
                section: PlanSection::Topics,
                index: 0,
                reason: "topics is not an array".to_string(),
            });
            Vec::new()
        }
    };

    let schedule_items = match root.get("schedule") {
        None | Some(Value::Null) => {
            return Err(CoreError::Parse("plan has no schedule".to_string()));
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(CoreError::Parse(
                "plan.schedule must be an array".to_string(),
            ));
        }
    };
    let schedule = collect_sessions(schedule_items, &mut dropped);

    Ok(ParsedPlan {
        plan: PlanDocument {
            title,
            topics,
            schedule,
        },
        dropped,
    })
}

fn parse_json_value(raw: &str) -> Result<Value, CoreError> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Ok(value);
    }
    balanced_json_span(raw)
        .and_then(|span| serde_json::from_str::<Value>(span).ok())
        .ok_or_else(|| CoreError::Parse("no valid plan found".to_string()))
}

/// Returns the substring from the first `{` to its matching `}`.
///
/// Depth counting is string-aware: braces inside JSON string literals
/// (including escaped quotes) do not affect nesting. Returns `None` when no
/// opening brace exists or the span never closes.
fn balanced_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn collect_topics(items: &[Value], dropped: &mut Vec<DroppedEntry>) -> Vec<Topic> {
    let mut topics = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match serde_json::from_value::<Topic>(item.clone()) {
            Ok(topic) => match topic.validate() {
                Ok(()) => topics.push(topic),
                Err(reason) => dropped.push(DroppedEntry {
                    section: PlanSection::Topics,
                    index,
                    reason,
                }),
            },
            Err(error) => dropped.push(DroppedEntry {
                section: PlanSection::Topics,
                index,
                reason: error.to_string(),
            }),
        }
    }
    topics
}

fn collect_sessions(items: &[Value], dropped: &mut Vec<DroppedEntry>) -> Vec<StudySession> {
    let mut sessions = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match serde_json::from_value::<StudySession>(item.clone()) {
            Ok(session) => match session.validate() {
                Ok(()) => sessions.push(session),
                Err(reason) => dropped.push(DroppedEntry {
                    section: PlanSection::Schedule,
                    index,
                    reason,
                }),
            },
            Err(error) => dropped.push(DroppedEntry {
                section: PlanSection::Schedule,
                index,
                reason: error.to_string(),
            }),
        }
    }
    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MINIMAL_PLAN: &str = r#"{
        "title": "Algorithms Week",
        "topics": [
            {"name": "Recursion", "summary": "Base cases first", "estimated_hours": 3, "resources": ["CLRS ch. 4"]}
        ],
        "schedule": [
            {"date": "2025-11-01", "topic": "Recursion", "duration_minutes": 90, "objective": "Learn base cases"},
            {"date": "2025-11-02", "topic": "Dynamic Programming"}
        ]
    }"#;

    #[test]
    fn parses_direct_json() {
        let parsed = parse_plan(MINIMAL_PLAN).expect("parse plan");
        assert_eq!(parsed.plan.title, "Algorithms Week");
        assert_eq!(parsed.plan.topics.len(), 1);
        assert_eq!(parsed.plan.schedule.len(), 2);
        assert!(parsed.dropped.is_empty());
        assert_eq!(parsed.plan.schedule[1].duration_minutes, 60);
    }

    #[test]
    fn repairs_markdown_fenced_json() {
        let wrapped = format!("Here is your plan:\n```json\n{MINIMAL_PLAN}\n```\nEnjoy!");
        let from_wrapped = parse_plan(&wrapped).expect("parse wrapped plan");
        let from_inner = parse_plan(MINIMAL_PLAN).expect("parse inner plan");
        assert_eq!(from_wrapped, from_inner);
    }

    #[test]
    fn rejects_text_without_braces() {
        let error = parse_plan("Sorry, I could not produce a plan today.")
            .expect_err("must reject braceless text");
        match error {
            CoreError::Parse(message) => assert_eq!(message, "no valid plan found"),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unclosed_span() {
        let error =
            parse_plan("intro {\"schedule\": [").expect_err("must reject unbalanced braces");
        assert!(matches!(error, CoreError::Parse(_)));
    }

    #[test]
    fn span_extraction_handles_nested_objects() {
        let text = r#"model says: {"schedule":[{"date":"2025-11-01","topic":"Graphs","resources":["a"]}],"extra":{"deep":{"deeper":1}}} done"#;
        let parsed = parse_plan(text).expect("parse nested plan");
        assert_eq!(parsed.plan.schedule.len(), 1);
    }

    #[test]
    fn span_extraction_ignores_braces_inside_strings() {
        let text = r#"note: {"schedule":[{"date":"2025-11-01","topic":"Sets {and} braces \" quoted"}]} trailing }"#;
        let parsed = parse_plan(text).expect("parse plan with braces in strings");
        assert_eq!(parsed.plan.schedule.len(), 1);
        assert_eq!(parsed.plan.schedule[0].topic, "Sets {and} braces \" quoted");
    }

    #[test]
    fn only_first_balanced_span_is_considered() {
        let text = r#"a {"not":"a plan"} b {"schedule":[{"date":"2025-11-01","topic":"T"}]}"#;
        let error = parse_plan(text).expect_err("first span has no schedule");
        match error {
            CoreError::Parse(message) => assert_eq!(message, "plan has no schedule"),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_object_json() {
        let error = parse_plan("[1, 2, 3]").expect_err("arrays are not plans");
        match error {
            CoreError::Parse(message) => assert_eq!(message, "plan is not a JSON object"),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_plan_without_schedule() {
        let error =
            parse_plan(r#"{"title": "No schedule here"}"#).expect_err("schedule is required");
        match error {
            CoreError::Parse(message) => assert_eq!(message, "plan has no schedule"),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_array_schedule() {
        let error = parse_plan(r#"{"schedule": "monday"}"#).expect_err("schedule must be array");
        match error {
            CoreError::Parse(message) => assert_eq!(message, "plan.schedule must be an array"),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn filters_invalid_schedule_entries_and_reports_them() {
        let text = r#"{
            "schedule": [
                {"date": "2025-11-01", "topic": "Recursion"},
                {"date": "2025-11-02"},
                {"date": "not-a-date", "topic": "Graphs"},
                {"date": "2025-11-04", "topic": "Trees", "duration_minutes": 0},
                "not an object",
                {"date": "2025-11-05", "topic": "Heaps"}
            ]
        }"#;
        let parsed = parse_plan(text).expect("filtering keeps the document usable");

        assert_eq!(parsed.plan.schedule.len(), 2);
        assert_eq!(parsed.plan.schedule[0].topic, "Recursion");
        assert_eq!(parsed.plan.schedule[1].topic, "Heaps");

        let dropped_indices: Vec<usize> = parsed.dropped.iter().map(|entry| entry.index).collect();
        assert_eq!(dropped_indices, vec![1, 2, 3, 4]);
        assert!(parsed.dropped[0].reason.contains("topic"));
        assert!(parsed.dropped[1].reason.contains("YYYY-MM-DD"));
        assert!(parsed.dropped[2].reason.contains("> 0"));
        assert!(
            parsed
                .dropped
                .iter()
                .all(|entry| entry.section == PlanSection::Schedule)
        );
    }

    #[test]
    fn filters_topics_with_empty_names() {
        let text = r#"{
            "topics": [{"name": "  "}, {"name": "Recursion"}],
            "schedule": [{"date": "2025-11-01", "topic": "Recursion"}]
        }"#;
        let parsed = parse_plan(text).expect("parse plan");
        assert_eq!(parsed.plan.topics.len(), 1);
        assert_eq!(parsed.dropped.len(), 1);
        assert_eq!(parsed.dropped[0].section, PlanSection::Topics);
        assert_eq!(parsed.dropped[0].index, 0);
    }

    #[test]
    fn blank_title_falls_back_to_placeholder() {
        let text = r#"{"title": "   ", "schedule": [{"date": "2025-11-01", "topic": "T"}]}"#;
        let parsed = parse_plan(text).expect("parse plan");
        assert_eq!(parsed.plan.title, "Your Study Plan");
    }

    fn date_strategy() -> impl Strategy<Value = String> {
        (2000i32..2100i32, 1u32..=12u32, 1u32..=28u32)
            .prop_map(|(year, month, day)| format!("{year:04}-{month:02}-{day:02}"))
    }

    fn session_strategy() -> impl Strategy<Value = StudySession> {
        (
            date_strategy(),
            "[A-Za-z][A-Za-z ]{0,14}",
            1u32..600u32,
            proptest::option::of("[A-Za-z ]{1,24}"),
            proptest::collection::vec("[a-z]{1,10}", 0..3),
        )
            .prop_map(
                |(date, topic, duration_minutes, objective, resources)| StudySession {
                    date,
                    topic,
                    duration_minutes,
                    objective,
                    resources,
                },
            )
    }

    fn topic_strategy() -> impl Strategy<Value = Topic> {
        (
            "[A-Za-z][A-Za-z ]{0,14}",
            "[A-Za-z ]{0,30}",
            proptest::option::of((1u32..100u32).prop_map(|h| f64::from(h) / 2.0)),
            proptest::collection::vec("[a-z]{1,10}", 0..3),
        )
            .prop_map(|(name, summary, estimated_hours, resources)| Topic {
                name,
                summary,
                estimated_hours,
                resources,
            })
    }

    fn plan_strategy() -> impl Strategy<Value = PlanDocument> {
        (
            // No leading/trailing spaces: parse trims the title.
            "[A-Za-z]([A-Za-z ]{0,18}[A-Za-z])?",
            proptest::collection::vec(topic_strategy(), 0..3),
            proptest::collection::vec(session_strategy(), 1..6),
        )
            .prop_map(|(title, topics, schedule)| PlanDocument {
                title,
                topics,
                schedule,
            })
    }

    proptest! {
        // Any valid serialized document survives the parse unchanged.
        #[test]
        fn serialized_plans_roundtrip_field_for_field(plan in plan_strategy()) {
            let serialized = serde_json::to_string(&plan).expect("serialize plan");
            let parsed = parse_plan(&serialized).expect("parse serialized plan");
            prop_assert_eq!(parsed.plan, plan);
            prop_assert!(parsed.dropped.is_empty());
        }
    }

    proptest! {
        // Wrapping a valid document in prose must not change the result.
        #[test]
        fn fenced_plans_parse_to_the_inner_document(plan in plan_strategy()) {
            let serialized = serde_json::to_string(&plan).expect("serialize plan");
            let wrapped = format!("Sure! Here it is:\n```json\n{serialized}\n```\nGood luck!");
            let parsed = parse_plan(&wrapped).expect("parse wrapped plan");
            prop_assert_eq!(parsed.plan, plan);
        }
    }

    proptest! {
        // Arbitrary junk may fail but must fail with a Parse error, not a panic.
        #[test]
        fn arbitrary_text_never_panics(raw in "[^{}]{0,64}") {
            match parse_plan(&raw) {
                Ok(_) => {}
                Err(CoreError::Parse(_)) => {}
                Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
            }
        }
    }
}
