//! Free-text date and budget parsing for lead intake.
//!
//! Both parsers are total: unreadable input degrades to a safe default
//! (current time, or a `None` bound) and never produces an error.

use chrono::{
    DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static UK_DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})/(\d{1,2})/(\d{4})\s*,?\s+(\d{1,2}):(\d{2})\s*(am|pm)$").unwrap()
});

static UK_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());

static ISO_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());

/// A number and the word glued to it. Only a bare `k`/`m`/`mn` scales the value,
/// so "450000 max" or "350k monthly" keep their face value.
static BUDGET_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*([a-z]+)?").unwrap());

const GENERIC_DATE_FORMATS: &[&str] = &[
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d.%m.%Y",
];

const GENERIC_DATE_TIME_FORMATS: &[&str] = &[
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// Parse a free-text date into an ISO 8601 UTC string (millisecond precision).
///
/// Falls back to the current time when nothing matches.
pub fn parse_date(input: Option<&str>) -> String {
    parse_date_time(input).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a free-text date, trying in order:
///
/// 1. UK `D/M/YYYY H:MMam|pm` (local time)
/// 2. UK `D/M/YYYY` (local midnight)
/// 3. ISO-prefixed `YYYY-MM-DD...`
/// 4. a handful of common long-form formats
pub fn parse_date_time(input: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return Utc::now();
    };

    if let Some(parsed) = parse_uk_date_time(raw)
        .or_else(|| parse_uk_date(raw))
        .or_else(|| parse_iso_prefixed(raw))
        .or_else(|| parse_generic(raw))
    {
        return parsed;
    }

    tracing::warn!("Unparseable date '{}', using current time", raw);
    Utc::now()
}

fn parse_uk_date_time(raw: &str) -> Option<DateTime<Utc>> {
    let caps = UK_DATE_TIME.captures(raw)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;

    if hour == 0 || hour > 12 {
        return None;
    }
    let is_pm = caps[6].eq_ignore_ascii_case("pm");
    let hour = match (hour, is_pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    Some(local_to_utc(naive))
}

fn parse_uk_date(raw: &str) -> Option<DateTime<Utc>> {
    let caps = UK_DATE.captures(raw)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
    Some(local_to_utc(naive))
}

fn parse_iso_prefixed(raw: &str) -> Option<DateTime<Utc>> {
    if !ISO_PREFIX.is_match(raw) {
        return None;
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f %z").map(|dt| dt.with_timezone(&Utc))
        })
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|ndt| Utc.from_utc_datetime(&ndt))
        })
        .or_else(|| {
            // Date part only, e.g. "2026-01-06" or "2026-01-06 garbage"
            NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| Utc.from_utc_datetime(&ndt))
        })
}

fn parse_generic(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(ndt) = GENERIC_DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(local_to_utc(ndt));
    }

    GENERIC_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(local_to_utc)
}

/// Interpret a wall-clock time in the server's local zone.
/// Non-existent local times (DST gaps) are read as UTC.
fn local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    }
}

/// Numeric budget bounds in whole GBP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl BudgetRange {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Parse a budget string such as `£400K - £500K`, `£1.5M` or `350,000`.
///
/// A single value collapses to a point range (`max == min`). `K` multiplies
/// by a thousand, `M`/`Million` by a million. When the lower bound has no
/// suffix but the upper one does (`400-500K`), a small lower bound inherits it.
pub fn parse_budget_range(input: Option<&str>) -> BudgetRange {
    let Some(raw) = input else {
        return BudgetRange::default();
    };

    let cleaned: String = raw
        .to_lowercase()
        .replace("million", "m")
        .replace("thousand", "k")
        .replace(&['–', '—'][..], "-")
        .replace(" to ", "-")
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | '€' | ','))
        .collect();

    if cleaned.trim().is_empty() {
        return BudgetRange::default();
    }

    let mut parts = cleaned.splitn(2, '-');
    let first = parts.next().and_then(parse_amount);
    let second = parts.next().map(parse_amount);

    let (min, max) = match second {
        None => {
            let value = first.map(|(n, mult)| scale(n, mult));
            (value, value)
        }
        Some(second) => {
            let max = second.map(|(n, mult)| scale(n, mult));
            let min = first.map(|(n, mult)| match (mult, second) {
                (None, Some((_, Some(upper)))) if n < 1000.0 => scale(n, Some(upper)),
                _ => scale(n, mult),
            });
            (min, max)
        }
    };

    match (min, max) {
        (Some(lo), Some(hi)) if lo > hi => BudgetRange {
            min: Some(hi),
            max: Some(lo),
        },
        _ => BudgetRange { min, max },
    }
}

fn parse_amount(segment: &str) -> Option<(f64, Option<char>)> {
    let caps = BUDGET_AMOUNT.captures(segment)?;
    let number: f64 = caps[1].parse().ok()?;
    let suffix = match caps.get(2).map(|m| m.as_str()) {
        Some("k") => Some('k'),
        Some("m") | Some("mn") => Some('m'),
        _ => None,
    };
    Some((number, suffix))
}

fn scale(number: f64, suffix: Option<char>) -> i64 {
    let multiplier = match suffix {
        Some('k') => 1_000.0,
        Some('m') => 1_000_000.0,
        _ => 1.0,
    };
    (number * multiplier).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn budget(min: i64, max: i64) -> BudgetRange {
        BudgetRange {
            min: Some(min),
            max: Some(max),
        }
    }

    #[test]
    fn test_uk_date_time_is_local_wall_clock() {
        let iso = parse_date(Some("6/1/2026 1:20pm"));
        let parsed = DateTime::parse_from_rfc3339(&iso).unwrap().with_timezone(&Local);
        assert_eq!(parsed.year(), 2026);
        assert_eq!(parsed.month(), 1);
        assert_eq!(parsed.day(), 6);
        assert_eq!(parsed.hour(), 13);
        assert_eq!(parsed.minute(), 20);
    }

    #[test]
    fn test_uk_midnight_and_noon() {
        let am = parse_date_time(Some("6/1/2026 12:05am")).with_timezone(&Local);
        assert_eq!(am.hour(), 0);
        let pm = parse_date_time(Some("6/1/2026 12:05PM")).with_timezone(&Local);
        assert_eq!(pm.hour(), 12);
    }

    #[test]
    fn test_uk_date_only() {
        let parsed = parse_date_time(Some("25/12/2025")).with_timezone(&Local);
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2025, 12, 25));
    }

    #[test]
    fn test_iso_inputs() {
        assert_eq!(
            parse_date(Some("2026-01-06T13:20:00Z")),
            "2026-01-06T13:20:00.000Z"
        );
        assert_eq!(
            parse_date(Some("2026-01-06T13:20:00+01:00")),
            "2026-01-06T12:20:00.000Z"
        );
        assert_eq!(parse_date(Some("2026-01-06")), "2026-01-06T00:00:00.000Z");
    }

    #[test]
    fn test_invalid_dates_fall_back_to_now() {
        let before = Utc::now();
        let parsed = parse_date_time(Some("not a date"));
        assert!(parsed >= before);
        assert!(DateTime::parse_from_rfc3339(&parse_date(Some("31/31/2026"))).is_ok());
        assert!(DateTime::parse_from_rfc3339(&parse_date(None)).is_ok());
    }

    #[test]
    fn test_budget_ranges() {
        assert_eq!(parse_budget_range(Some("£400K - £500K")), budget(400_000, 500_000));
        assert_eq!(parse_budget_range(Some("£750K")), budget(750_000, 750_000));
        assert_eq!(parse_budget_range(Some("£1.5M")), budget(1_500_000, 1_500_000));
        assert_eq!(parse_budget_range(Some("2 Million")), budget(2_000_000, 2_000_000));
        assert_eq!(parse_budget_range(Some("350,000")), budget(350_000, 350_000));
        assert_eq!(parse_budget_range(Some("400-500k")), budget(400_000, 500_000));
        assert_eq!(parse_budget_range(Some("£1M-£750K")), budget(750_000, 1_000_000));
        assert_eq!(parse_budget_range(Some("£2.5 mn")), budget(2_500_000, 2_500_000));
        assert_eq!(parse_budget_range(Some("500 thousand")), budget(500_000, 500_000));
    }

    #[test]
    fn test_trailing_words_do_not_scale_budget() {
        assert_eq!(parse_budget_range(Some("£450,000 max")), budget(450_000, 450_000));
        assert_eq!(parse_budget_range(Some("£450,000max")), budget(450_000, 450_000));
        assert_eq!(parse_budget_range(Some("350000 minimum")), budget(350_000, 350_000));
        assert_eq!(parse_budget_range(Some("£2,000 monthly")), budget(2_000, 2_000));
        assert_eq!(parse_budget_range(Some("£300K mortgage")), budget(300_000, 300_000));
        assert_eq!(parse_budget_range(Some("£500k max")), budget(500_000, 500_000));
        assert_eq!(
            parse_budget_range(Some("£400,000 - £450,000 max")),
            budget(400_000, 450_000)
        );
    }

    #[test]
    fn test_unparseable_budget_bounds_are_none() {
        assert!(parse_budget_range(None).is_empty());
        assert!(parse_budget_range(Some("")).is_empty());
        assert!(parse_budget_range(Some("flexible")).is_empty());
        assert_eq!(
            parse_budget_range(Some("tbc - £600K")),
            BudgetRange {
                min: None,
                max: Some(600_000)
            }
        );
    }
}
