//! Next-run computation
//!
//! All arithmetic is relative to the instant the task ran, never to the
//! previous `next_run_at`. Times are UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use tracing::warn;

use crate::models::ScheduleType;

/// When a task of `schedule_type` should next run after running at `now`
///
/// The result is always strictly after `now`.
pub fn next_run_at(
    schedule_type: ScheduleType,
    cron_expression: Option<&str>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match schedule_type {
        ScheduleType::Daily => now + Duration::days(1),
        ScheduleType::Weekly => now + Duration::days(7),
        ScheduleType::Monthly => same_day_next_month(now),
        ScheduleType::Cron => match cron_expression {
            Some(expr) => parse_cron_next(expr, now),
            None => now + Duration::days(1),
        },
    }
}

/// Same day-of-month and time in the following month
///
/// December rolls into January of the next year. A day that does not exist
/// in the next month (31st into April) is clamped to that month's last day.
pub fn same_day_next_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let day = now.day().min(days_in_month(year, month));

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_time(now.time()).and_local_timezone(Utc).single())
        .unwrap_or_else(|| now + Duration::days(30))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Next run for a minimal cron expression
///
/// Only the first two fields (minute, hour) are read; each is a number or
/// `*` (meaning "the current value"). Day, month and weekday fields are
/// ignored. If today's candidate is not after `now` it moves to tomorrow.
/// Anything unparseable runs again in 24 hours.
pub fn parse_cron_next(expression: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    match cron_candidate(expression, now) {
        Some(candidate) if candidate <= now => candidate + Duration::days(1),
        Some(candidate) => candidate,
        None => {
            warn!(expression, "Unsupported cron expression, running again in 24h");
            now + Duration::days(1)
        }
    }
}

fn cron_candidate(expression: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut fields = expression.split_whitespace();
    let minute = cron_field(fields.next()?, now.minute())?;
    let hour = cron_field(fields.next()?, now.hour())?;

    now.with_hour(hour)?
        .with_minute(minute)?
        .with_second(0)?
        .with_nanosecond(0)
}

fn cron_field(field: &str, current: u32) -> Option<u32> {
    if field == "*" {
        Some(current)
    } else {
        field.parse().ok()
    }
}

/// Whether `expression` has the minute and hour fields this scheduler reads
pub fn is_supported_cron(expression: &str) -> bool {
    let probe = DateTime::<Utc>::default();
    cron_candidate(expression, probe).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_daily_and_weekly_are_relative_to_now() {
        let now = at(2024, 3, 1, 9, 1);
        assert_eq!(next_run_at(ScheduleType::Daily, None, now), at(2024, 3, 2, 9, 1));
        assert_eq!(next_run_at(ScheduleType::Weekly, None, now), at(2024, 3, 8, 9, 1));
    }

    #[test]
    fn test_monthly_rollover() {
        assert_eq!(same_day_next_month(at(2024, 3, 15, 8, 0)), at(2024, 4, 15, 8, 0));
        assert_eq!(same_day_next_month(at(2024, 12, 5, 8, 0)), at(2025, 1, 5, 8, 0));
        assert_eq!(same_day_next_month(at(2024, 1, 31, 8, 0)), at(2024, 2, 29, 8, 0));
        assert_eq!(same_day_next_month(at(2023, 1, 31, 8, 0)), at(2023, 2, 28, 8, 0));
        assert_eq!(same_day_next_month(at(2024, 3, 31, 8, 0)), at(2024, 4, 30, 8, 0));
    }

    #[test]
    fn test_cron_hour_already_passed() {
        assert_eq!(parse_cron_next("0 9 * * *", at(2024, 3, 1, 10, 0)), at(2024, 3, 2, 9, 0));
    }

    #[test]
    fn test_cron_later_today() {
        assert_eq!(parse_cron_next("30 18 * * *", at(2024, 3, 1, 10, 0)), at(2024, 3, 1, 18, 30));
    }

    #[test]
    fn test_cron_exactly_now_moves_to_tomorrow() {
        assert_eq!(parse_cron_next("0 9 * * *", at(2024, 3, 1, 9, 0)), at(2024, 3, 2, 9, 0));
    }

    #[test]
    fn test_cron_wildcards_use_current_values() {
        // "* *" lands on the current minute, which is never after now
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap();
        assert_eq!(parse_cron_next("* * * * *", now), at(2024, 3, 2, 10, 15));
        assert_eq!(parse_cron_next("45 *", now), at(2024, 3, 1, 10, 45));
    }

    #[test]
    fn test_cron_ignores_day_fields() {
        assert_eq!(parse_cron_next("0 9 1 1 0", at(2024, 3, 1, 10, 0)), at(2024, 3, 2, 9, 0));
    }

    #[test]
    fn test_cron_unparseable_falls_back_to_a_day() {
        let now = at(2024, 3, 1, 10, 0);
        for expr in ["", "0", "x 9 * * *", "0 25 * * *", "61 9", "@daily"] {
            assert_eq!(parse_cron_next(expr, now), at(2024, 3, 2, 10, 0), "{expr}");
        }
        assert!(!is_supported_cron("@daily"));
        assert!(is_supported_cron("0 9 * * *"));
    }

    #[test]
    fn test_cron_without_expression() {
        let now = at(2024, 3, 1, 10, 0);
        assert_eq!(next_run_at(ScheduleType::Cron, None, now), at(2024, 3, 2, 10, 0));
    }
}
