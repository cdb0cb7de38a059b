//! Turkish temporal-expression extraction.
//!
//! The extractor resolves phrases like "yarın saat 14 te" or "22'si 10:00"
//! into a timezone-aware instant. Each temporal idiom is a separate pattern
//! object; both the explicit-time scan and the date resolution walk their
//! pattern lists in a fixed priority order, so results are deterministic.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::normalize::normalize;

/// Explicit clock-time signals found in the text, byte offsets into the
/// scanned (lowercased, normalized) string.
#[derive(Debug, Clone, Copy)]
struct TimeMatch {
    hour: u32,
    minute: u32,
    start: usize,
    end: usize,
}

static CLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})[:.](\d{2})\b").expect("clock"));
static SAAT_HOUR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bsaat (\d{1,2})(?: (?:da|de|ta|te))?\b").expect("saat hour"));
static HOUR_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}) (?:da|de|ta|te)\b").expect("hour suffix"));
static EVENING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(akşam|gece)\b").expect("evening"));

static RELATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(bugün|yarın|öbür gün)\b").expect("relative"));
static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(pazartesi|salı|çarşamba|perşembe|cumartesi|cuma|pazar)\b").expect("weekday")
});
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(\d{1,2}) (ocak|şubat|mart|nisan|mayıs|haziran|temmuz|ağustos|eylül|ekim|kasım|aralık)(?: (\d{4}))?\b",
    )
    .expect("day month")
});
static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[./](\d{1,2})(?:[./](\d{2,4}))?\b").expect("numeric date"));

static ORDINAL_APOSTROPHE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\s*['’]\s*(?:si|sı|sü|su|i|ı|u|ü)\b").expect("ordinal"));
static ORDINAL_SPACED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}) (?:si|sı|sü|su)\b").expect("ordinal spaced"));

type Resolver = fn(&Captures<'_>, DateTime<Tz>) -> Option<NaiveDateTime>;

/// One temporal idiom: its pattern, whether a match carries an explicit
/// calendar-date signal, and how it resolves against the reference instant.
struct Idiom {
    regex: &'static Lazy<Regex>,
    date_signal: bool,
    resolve: Resolver,
}

/// Idioms accepted by the whole-candidate direct parse, priority order.
static DATE_IDIOMS: &[Idiom] = &[
    Idiom { regex: &RELATIVE, date_signal: true, resolve: resolve_relative },
    Idiom { regex: &WEEKDAY, date_signal: true, resolve: resolve_weekday },
    Idiom { regex: &DAY_MONTH, date_signal: true, resolve: resolve_day_month },
    Idiom { regex: &NUMERIC_DATE, date_signal: true, resolve: resolve_numeric },
];

/// Idioms accepted by the fragment search; date idioms first, then bare
/// time idioms whose matches must not relocate the calendar date.
static SEARCH_IDIOMS: &[Idiom] = &[
    Idiom { regex: &RELATIVE, date_signal: true, resolve: resolve_relative },
    Idiom { regex: &WEEKDAY, date_signal: true, resolve: resolve_weekday },
    Idiom { regex: &DAY_MONTH, date_signal: true, resolve: resolve_day_month },
    Idiom { regex: &NUMERIC_DATE, date_signal: true, resolve: resolve_numeric },
    Idiom { regex: &CLOCK, date_signal: false, resolve: resolve_clock },
    Idiom { regex: &SAAT_HOUR, date_signal: false, resolve: resolve_hour_only },
    Idiom { regex: &HOUR_SUFFIX, date_signal: false, resolve: resolve_hour_only },
];

/// Resolve a Turkish date/time phrase to an instant in the reference's zone.
///
/// `default_hour` applies only when the text carries no explicit clock time.
/// Returns `None` when neither the direct parse nor the fragment search
/// finds anything usable.
pub fn extract(
    text: &str,
    reference: DateTime<Tz>,
    default_hour: Option<u32>,
) -> Option<DateTime<Tz>> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }
    let lower = normalized.to_lowercase();

    let time = scan_explicit_time(&lower);
    let explicit = time.map(|tm| {
        let evening = EVENING.is_match(&lower[..tm.start]);
        let hour = if evening && tm.hour < 12 { tm.hour + 12 } else { tm.hour };
        (hour, tm.minute)
    });

    let candidates = candidate_texts(&lower, time.as_ref());

    let mut resolved = candidates
        .iter()
        .find_map(|candidate| direct_parse(candidate, reference));

    if resolved.is_none() {
        for candidate in &candidates {
            if let Some((fragment_value, date_signal)) = search_fragment(candidate, reference) {
                resolved = Some(if date_signal {
                    fragment_value
                } else {
                    // Time-only fragment: pin the date to the reference so
                    // the substring search cannot drift it.
                    NaiveDateTime::new(reference.date_naive(), fragment_value.time())
                });
                break;
            }
        }
    }

    let mut resolved = resolved?;

    if let Some(day) = scan_day_ordinal(text, &lower) {
        if let Some(overridden) = resolved.date().with_day(day) {
            resolved = NaiveDateTime::new(overridden, resolved.time());
        }
    }

    if let Some((hour, minute)) = explicit {
        resolved = NaiveDateTime::new(resolved.date(), NaiveTime::from_hms_opt(hour, minute, 0)?);
    } else if let Some(hour) = default_hour.filter(|hour| *hour <= 23) {
        resolved = NaiveDateTime::new(resolved.date(), NaiveTime::from_hms_opt(hour, 0, 0)?);
    }

    attach_zone(resolved, reference.timezone())
}

/// Convert a zone-aware instant to UTC.
pub fn to_utc(value: DateTime<Tz>) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

/// Convert a naive local instant to UTC by first attaching the given zone.
pub fn naive_to_utc(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    attach_zone(naive, tz).map(|value| value.with_timezone(&Utc))
}

fn scan_explicit_time(lower: &str) -> Option<TimeMatch> {
    for caps in CLOCK.captures_iter(lower) {
        let (hour, minute) = (parse_u32(&caps, 1)?, parse_u32(&caps, 2)?);
        if hour <= 23 && minute <= 59 {
            let whole = caps.get(0)?;
            return Some(TimeMatch { hour, minute, start: whole.start(), end: whole.end() });
        }
    }
    for regex in [&SAAT_HOUR, &HOUR_SUFFIX] {
        for caps in regex.captures_iter(lower) {
            let hour = parse_u32(&caps, 1)?;
            if hour <= 23 {
                let whole = caps.get(0)?;
                return Some(TimeMatch { hour, minute: 0, start: whole.start(), end: whole.end() });
            }
        }
    }
    None
}

/// Ordered, de-duplicated list of substrings to try a date parse on: the
/// full text, then the text around the explicit-time match.
fn candidate_texts(lower: &str, time: Option<&TimeMatch>) -> Vec<String> {
    let mut out = vec![lower.to_string()];
    if let Some(tm) = time {
        let before = lower[..tm.start].trim().to_string();
        let after = lower[tm.end..].trim().to_string();
        let joined = normalize(&format!("{before} {after}"));
        for candidate in [before, joined, after] {
            if !candidate.is_empty() && !out.contains(&candidate) {
                out.push(candidate);
            }
        }
    }
    out
}

fn direct_parse(candidate: &str, reference: DateTime<Tz>) -> Option<NaiveDateTime> {
    let trimmed = candidate.trim();
    for idiom in DATE_IDIOMS {
        if let Some(caps) = idiom.regex.captures(trimmed) {
            let whole = caps.get(0)?;
            if whole.start() == 0 && whole.end() == trimmed.len() {
                if let Some(parsed) = (idiom.resolve)(&caps, reference) {
                    return Some(parsed);
                }
            }
        }
    }
    None
}

fn search_fragment(candidate: &str, reference: DateTime<Tz>) -> Option<(NaiveDateTime, bool)> {
    for idiom in SEARCH_IDIOMS {
        for caps in idiom.regex.captures_iter(candidate) {
            if let Some(parsed) = (idiom.resolve)(&caps, reference) {
                return Some((parsed, idiom.date_signal));
            }
        }
    }
    None
}

fn scan_day_ordinal(raw: &str, lower: &str) -> Option<u32> {
    let raw_lower = raw.to_lowercase();
    let caps = ORDINAL_APOSTROPHE
        .captures(&raw_lower)
        .or_else(|| ORDINAL_SPACED.captures(lower))?;
    let day = parse_u32(&caps, 1)?;
    (1..=31).contains(&day).then_some(day)
}

fn resolve_relative(caps: &Captures<'_>, reference: DateTime<Tz>) -> Option<NaiveDateTime> {
    let days = match caps.get(1)?.as_str() {
        "bugün" => 0,
        "yarın" => 1,
        _ => 2,
    };
    Some(reference.naive_local() + Duration::days(days))
}

fn resolve_weekday(caps: &Captures<'_>, reference: DateTime<Tz>) -> Option<NaiveDateTime> {
    let target = match caps.get(1)?.as_str() {
        "pazartesi" => 0,
        "salı" => 1,
        "çarşamba" => 2,
        "perşembe" => 3,
        "cuma" => 4,
        "cumartesi" => 5,
        _ => 6,
    };
    let current = reference.weekday().num_days_from_monday() as i64;
    let mut ahead = (target - current).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    (reference.date_naive() + Duration::days(ahead)).and_hms_opt(0, 0, 0)
}

fn resolve_day_month(caps: &Captures<'_>, reference: DateTime<Tz>) -> Option<NaiveDateTime> {
    let day = parse_u32(&caps, 1)?;
    let month = month_number(caps.get(2)?.as_str())?;
    let explicit_year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
    resolve_date_parts(day, month, explicit_year, reference)
}

fn resolve_numeric(caps: &Captures<'_>, reference: DateTime<Tz>) -> Option<NaiveDateTime> {
    let day = parse_u32(&caps, 1)?;
    let month = parse_u32(&caps, 2)?;
    if month == 0 || month > 12 {
        return None;
    }
    let explicit_year = caps.get(3).and_then(|m| {
        let year = m.as_str().parse::<i32>().ok()?;
        Some(if m.as_str().len() == 2 { 2000 + year } else { year })
    });
    resolve_date_parts(day, month, explicit_year, reference)
}

/// Day-month-year resolution with a future-dated preference: a yearless date
/// already behind the reference rolls to next year.
fn resolve_date_parts(
    day: u32,
    month: u32,
    explicit_year: Option<i32>,
    reference: DateTime<Tz>,
) -> Option<NaiveDateTime> {
    let year = explicit_year.unwrap_or_else(|| reference.year());
    let mut date = NaiveDate::from_ymd_opt(year, month, day)?;
    if explicit_year.is_none() && date < reference.date_naive() {
        date = NaiveDate::from_ymd_opt(year + 1, month, day)?;
    }
    date.and_hms_opt(0, 0, 0)
}

fn resolve_clock(caps: &Captures<'_>, reference: DateTime<Tz>) -> Option<NaiveDateTime> {
    let (hour, minute) = (parse_u32(caps, 1)?, parse_u32(caps, 2)?);
    if hour > 23 || minute > 59 {
        return None;
    }
    reference.date_naive().and_hms_opt(hour, minute, 0)
}

fn resolve_hour_only(caps: &Captures<'_>, reference: DateTime<Tz>) -> Option<NaiveDateTime> {
    let hour = parse_u32(caps, 1)?;
    if hour > 23 {
        return None;
    }
    reference.date_naive().and_hms_opt(hour, 0, 0)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "ocak" => 1,
        "şubat" => 2,
        "mart" => 3,
        "nisan" => 4,
        "mayıs" => 5,
        "haziran" => 6,
        "temmuz" => 7,
        "ağustos" => 8,
        "eylül" => 9,
        "ekim" => 10,
        "kasım" => 11,
        "aralık" => 12,
        _ => return None,
    };
    Some(month)
}

fn parse_u32(caps: &Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index)?.as_str().parse().ok()
}

fn attach_zone(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(value) => Some(value),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        // DST gap: the wall-clock time does not exist, shift past it.
        LocalResult::None => tz.from_local_datetime(&(naive + Duration::hours(1))).earliest(),
    }
}
