//! Duplicate detection for events and tasks.
//!
//! Two records are duplicates when their normalized titles are equal and
//! their instants fall within one hour of each other. A record without an
//! instant only matches another record without one.

use chrono::{DateTime, Duration, Utc};

/// Half-width of the duplicate time window.
pub fn duplicate_window() -> Duration {
    Duration::hours(1)
}

/// Trim, collapse inner whitespace, and lowercase.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Title equality plus the ±1h instant window.
pub fn is_duplicate(
    candidate_title: &str,
    candidate_at: Option<DateTime<Utc>>,
    existing_title: &str,
    existing_at: Option<DateTime<Utc>>,
) -> bool {
    if normalize_title(candidate_title) != normalize_title(existing_title) {
        return false;
    }
    match (candidate_at, existing_at) {
        (Some(candidate), Some(existing)) => {
            (candidate - existing).abs() <= duplicate_window()
        }
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2025, 10, 3, hour, minute, 0).unwrap())
    }

    #[test]
    fn title_normalization_ignores_case_and_spacing() {
        assert_eq!(
            normalize_title("  Tedarikçi   Toplantısı "),
            normalize_title("tedarikçi toplantısı")
        );
    }

    #[test]
    fn within_an_hour_is_a_duplicate() {
        assert!(is_duplicate("Toplantı", at(14, 0), "toplantı", at(14, 59)));
        assert!(is_duplicate("Toplantı", at(14, 0), "toplantı", at(13, 0)));
    }

    #[test]
    fn beyond_an_hour_is_not() {
        assert!(!is_duplicate("Toplantı", at(14, 0), "toplantı", at(15, 1)));
    }

    #[test]
    fn different_titles_never_collide() {
        assert!(!is_duplicate("Toplantı", at(14, 0), "Prova", at(14, 0)));
    }

    #[test]
    fn absent_instants_match_only_each_other() {
        assert!(is_duplicate("Rapor", None, "rapor", None));
        assert!(!is_duplicate("Rapor", None, "rapor", at(14, 0)));
        assert!(!is_duplicate("Rapor", at(14, 0), "rapor", None));
    }
}
