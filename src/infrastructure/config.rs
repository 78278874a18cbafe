use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::domain::models::parse_hhmm;
use crate::infrastructure::error::CoreError;

const PLANNER_JSON: &str = "planner.json";
const CALENDAR_JSON: &str = "calendar.json";

pub const DEFAULT_PLAN_DAYS: u32 = 7;
pub const DEFAULT_HOURS_PER_DAY: f64 = 2.0;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_PROMPT_CHAR_BUDGET: usize = 8000;
pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";
pub const DEFAULT_START_TIME: &str = "09:00";

/// Planner-side settings: how plans are requested from the model.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub plan_days: u32,
    pub hours_per_day: f64,
    pub model: String,
    pub prompt_char_budget: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            plan_days: DEFAULT_PLAN_DAYS,
            hours_per_day: DEFAULT_HOURS_PER_DAY,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            prompt_char_budget: DEFAULT_PROMPT_CHAR_BUDGET,
        }
    }
}

/// Calendar-side settings: where and when synced events land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarConfig {
    pub calendar_id: Option<String>,
    pub timezone: String,
    pub start_time: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            start_time: DEFAULT_START_TIME.to_string(),
        }
    }
}

impl CalendarConfig {
    pub fn parsed_timezone(&self) -> Result<Tz, CoreError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            CoreError::InvalidConfig(format!("unknown timezone '{}'", self.timezone))
        })
    }

    pub fn parsed_start_time(&self) -> Result<NaiveTime, CoreError> {
        parse_hhmm(&self.start_time).ok_or_else(|| {
            CoreError::InvalidConfig(format!("start_time must be HH:MM, got '{}'", self.start_time))
        })
    }
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            PLANNER_JSON,
            serde_json::json!({
                "schema": 1,
                "planDays": DEFAULT_PLAN_DAYS,
                "hoursPerDay": DEFAULT_HOURS_PER_DAY,
                "model": DEFAULT_GEMINI_MODEL,
                "promptCharBudget": DEFAULT_PROMPT_CHAR_BUDGET
            }),
        ),
        (
            CALENDAR_JSON,
            serde_json::json!({
                "schema": 1,
                "calendarId": null,
                "timezone": DEFAULT_TIMEZONE,
                "startTime": DEFAULT_START_TIME
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), CoreError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, CoreError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            CoreError::InvalidConfig(format!("missing schema in {}", path.display()))
        })?;
    if schema != 1 {
        return Err(CoreError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

/// Missing individual fields fall back to defaults; only a missing or
/// malformed file itself is an error.
pub fn read_planner_config(config_dir: &Path) -> Result<PlannerConfig, CoreError> {
    let parsed = read_config(&config_dir.join(PLANNER_JSON))?;
    let defaults = PlannerConfig::default();

    Ok(PlannerConfig {
        plan_days: parsed
            .get("planDays")
            .and_then(serde_json::Value::as_u64)
            .filter(|days| *days > 0)
            .map(|days| days as u32)
            .unwrap_or(defaults.plan_days),
        hours_per_day: parsed
            .get("hoursPerDay")
            .and_then(serde_json::Value::as_f64)
            .filter(|hours| *hours > 0.0)
            .unwrap_or(defaults.hours_per_day),
        model: parsed
            .get("model")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or(defaults.model),
        prompt_char_budget: parsed
            .get("promptCharBudget")
            .and_then(serde_json::Value::as_u64)
            .filter(|budget| *budget > 0)
            .map(|budget| budget as usize)
            .unwrap_or(defaults.prompt_char_budget),
    })
}

pub fn read_calendar_config(config_dir: &Path) -> Result<CalendarConfig, CoreError> {
    let parsed = read_config(&config_dir.join(CALENDAR_JSON))?;
    let defaults = CalendarConfig::default();

    Ok(CalendarConfig {
        calendar_id: parsed
            .get("calendarId")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned),
        timezone: parsed
            .get("timezone")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|zone| !zone.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or(defaults.timezone),
        start_time: parsed
            .get("startTime")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|time| !time.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or(defaults.start_time),
    })
}

pub fn save_calendar_id(config_dir: &Path, calendar_id: &str) -> Result<(), CoreError> {
    let calendar_id = calendar_id.trim();
    if calendar_id.is_empty() {
        return Err(CoreError::InvalidConfig(
            "calendarId must not be empty".to_string(),
        ));
    }

    let path = config_dir.join(CALENDAR_JSON);
    let mut parsed = read_config(&path)?;
    let object = parsed.as_object_mut().ok_or_else(|| {
        CoreError::InvalidConfig(format!("invalid object structure in {}", path.display()))
    })?;
    object.insert(
        "calendarId".to_string(),
        serde_json::Value::String(calendar_id.to_string()),
    );

    let formatted = serde_json::to_string_pretty(&parsed)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}
