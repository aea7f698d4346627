//! `Date` header normalization.
//!
//! Mail `Date` headers come in a handful of RFC 2822 flavours, often with a
//! trailing `(UTC)`-style comment. [`normalize_date`] tries each known
//! pattern in order and never fails: when nothing matches the current time
//! is used and the result is marked as a fallback.

use crate::models::{DateFallback, MessageTimestamp};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Patterns tried in order against the comment-stripped header.
const DATE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M:%S %z %Z",
    "%d %b %Y %H:%M:%S %z",
];

static ZONE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

/// Remove parenthetical comments such as `(PDT)` and trim the rest.
pub fn strip_zone_comment(raw: &str) -> String {
    ZONE_COMMENT.replace_all(raw, "").trim().to_string()
}

/// Parse a mail `Date` header into a UTC instant.
///
/// # Returns
///
/// [`MessageTimestamp::Parsed`] for the first matching pattern, otherwise
/// [`MessageTimestamp::Fallback`] holding `Utc::now()` and the reason.
pub fn normalize_date(raw: &str) -> MessageTimestamp {
    let cleaned = strip_zone_comment(raw);
    if cleaned.is_empty() {
        warn!("Empty Date header; using current time");
        return MessageTimestamp::Fallback {
            at: Utc::now(),
            reason: DateFallback::Empty,
        };
    }

    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&cleaned, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc2822(&cleaned).ok());

    match parsed {
        Some(dt) => MessageTimestamp::Parsed(dt.with_timezone(&Utc)),
        None => {
            warn!(date = %raw, "Unparseable Date header; using current time");
            MessageTimestamp::Fallback {
                at: Utc::now(),
                reason: DateFallback::Unrecognized(raw.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, TimeZone};

    fn sample_instant() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 5, 7, 8, 15, 42)
            .unwrap()
    }

    fn assert_recovers(formatted: &str) {
        let expected = sample_instant().with_timezone(&Utc);
        match normalize_date(formatted) {
            MessageTimestamp::Parsed(got) => {
                assert!(
                    (got - expected).num_seconds().abs() <= 1,
                    "{formatted} -> {got}"
                );
            }
            other => panic!("{formatted} fell back: {other:?}"),
        }
    }

    #[test]
    fn test_strip_zone_comment() {
        assert_eq!(
            strip_zone_comment("Wed, 7 May 2025 08:15:42 +0900 (JST)"),
            "Wed, 7 May 2025 08:15:42 +0900"
        );
        assert_eq!(strip_zone_comment("  (only comment) "), "");
    }

    #[test]
    fn test_recovers_weekday_pattern() {
        let dt = sample_instant();
        assert_recovers(&dt.format("%a, %d %b %Y %H:%M:%S %z").to_string());
        assert_recovers(&format!("{} (JST)", dt.format("%a, %d %b %Y %H:%M:%S %z")));
    }

    #[test]
    fn test_recovers_trailing_zone_name() {
        let dt = sample_instant();
        assert_recovers(&format!("{} JST", dt.format("%a, %d %b %Y %H:%M:%S %z")));
    }

    #[test]
    fn test_recovers_without_weekday() {
        let dt = sample_instant();
        assert_recovers(&dt.format("%d %b %Y %H:%M:%S %z").to_string());
        assert_recovers(&format!("{} (JST)", dt.format("%d %b %Y %H:%M:%S %z")));
    }

    #[test]
    fn test_single_digit_day() {
        assert_recovers("Wed, 7 May 2025 08:15:42 +0900 (JST)");
    }

    #[test]
    fn test_empty_falls_back_to_now() {
        let before = Utc::now();
        let ts = normalize_date("");
        let after = Utc::now();
        assert!(matches!(
            ts,
            MessageTimestamp::Fallback {
                reason: DateFallback::Empty,
                ..
            }
        ));
        assert!(ts.instant() >= before - Duration::seconds(1));
        assert!(ts.instant() <= after + Duration::seconds(1));
    }

    #[test]
    fn test_garbage_falls_back_to_now() {
        let before = Utc::now();
        let ts = normalize_date("not a date at all");
        let after = Utc::now();
        match &ts {
            MessageTimestamp::Fallback {
                reason: DateFallback::Unrecognized(raw),
                ..
            } => assert_eq!(raw, "not a date at all"),
            other => panic!("expected fallback, got {other:?}"),
        }
        assert!(ts.instant() >= before - Duration::seconds(1));
        assert!(ts.instant() <= after + Duration::seconds(1));
    }
}
