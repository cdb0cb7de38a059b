//! Payload construction for classified actions.
//!
//! Builders here own the payload shapes: key order is fixed per intent and
//! datetimes are serialized as RFC 3339 UTC strings.

use chrono::DateTime;
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map};

use crate::config::Settings;
use crate::models::{Action, IntentTag, RemindPolicy};
use crate::temporal::{extract, to_utc};

pub const TITLE_FALLBACK: &str = "Lale Notu";

const TITLE_WORD_LIMIT: usize = 6;
const EVENT_DEFAULT_HOUR: u32 = 18;
const TASK_DEFAULT_HOUR: u32 = 17;
const REMINDER_DEFAULT_HOUR: u32 = 9;

static CAPITALIZED_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-ZÇĞİÖŞÜ][\wçğıöşü]+").expect("capitalized word"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digit run"));

/// Calendar-event payload: title, optional start with timezone, reminders.
pub fn build_event_action(
    text: &str,
    default_hour: u32,
    reference: DateTime<Tz>,
    settings: &Settings,
    parsed: Option<DateTime<Tz>>,
) -> Action {
    let start = parsed.or_else(|| extract(text, reference, Some(default_hour)));

    let mut payload = Map::new();
    payload.insert("title".into(), json!(title_or_fallback(text)));
    if let Some(start) = start {
        payload.insert("start".into(), json!(to_utc(start).to_rfc3339()));
        payload.insert("timezone".into(), json!(settings.timezone_name));
    }
    payload.insert(
        "remind_policy".into(),
        json!(RemindPolicy {
            minutes_before: settings.default_reminders.clone(),
            voice: true,
        }),
    );
    Action::new(IntentTag::AddEvent, payload)
}

/// Task payload: full text as title plus an optional due instant.
pub fn build_task_action(text: &str, reference: DateTime<Tz>) -> Action {
    let trimmed = text.trim();
    let title = if trimmed.is_empty() { TITLE_FALLBACK } else { trimmed };

    let mut payload = Map::new();
    payload.insert("title".into(), json!(title));
    if let Some(due) = extract(text, reference, Some(TASK_DEFAULT_HOUR)) {
        payload.insert("due".into(), json!(to_utc(due).to_rfc3339()));
    }
    Action::new(IntentTag::AddTask, payload)
}

/// Reminder payload: verbatim message plus an optional trigger instant.
pub fn build_reminder_action(text: &str, reference: DateTime<Tz>) -> Action {
    let mut payload = Map::new();
    payload.insert("message".into(), json!(text.trim()));
    if let Some(remind_at) = extract(text, reference, Some(REMINDER_DEFAULT_HOUR)) {
        payload.insert("remind_at".into(), json!(to_utc(remind_at).to_rfc3339()));
    }
    Action::new(IntentTag::ScheduleReminder, payload)
}

/// First six words of the text, each capitalized. `None` on blank input.
pub fn infer_title(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().take(TITLE_WORD_LIMIT).collect();
    if words.is_empty() {
        return None;
    }
    Some(
        words
            .iter()
            .map(|word| capitalize(word))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Topic heuristic: first capitalized Turkish word, otherwise the trailing
/// two tokens of the text.
pub fn extract_topic(text: &str) -> String {
    if let Some(found) = CAPITALIZED_WORD.find(text) {
        return found.as_str().to_string();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let tail = words.len().saturating_sub(2);
    words[tail..].join(" ")
}

/// First run of digits in the text, used for entity ids.
pub fn extract_number(text: &str) -> Option<i64> {
    DIGIT_RUN.find(text)?.as_str().parse().ok()
}

pub(crate) fn title_or_fallback(text: &str) -> String {
    infer_title(text).unwrap_or_else(|| TITLE_FALLBACK.to_string())
}

pub(crate) const fn event_default_hour() -> u32 {
    EVENT_DEFAULT_HOUR
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
