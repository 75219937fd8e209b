//! Week and hour bucket labels.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc, Weekday};

/// ISO year-week label, e.g. `2024-W31`.
pub fn iso_week_label(at: DateTime<Utc>) -> String {
    let week = at.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Label of the ISO week before the given instant.
pub fn previous_week_label(at: DateTime<Utc>) -> String {
    iso_week_label(at - Duration::weeks(1))
}

/// UTC hour bucket, e.g. `2024-07-31T14`.
pub fn hour_label(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H").to_string()
}

/// Seconds until the next hour boundary.
pub fn seconds_to_next_hour(at: DateTime<Utc>) -> u64 {
    let secs_into_hour = u64::from(at.minute()) * 60 + u64::from(at.second());
    3600 - secs_into_hour.min(3599)
}

/// Next Monday 00:00 UTC strictly after the given instant.
pub fn next_week_reset(at: DateTime<Utc>) -> DateTime<Utc> {
    let today = at.date_naive();
    let days_ahead = match today.weekday() {
        Weekday::Mon => 7,
        other => 7 - other.num_days_from_monday() as i64,
    };
    let monday = today + Duration::days(days_ahead);
    let midnight = monday.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&midnight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, 30, 15)
                .unwrap(),
        )
    }

    #[test]
    fn week_labels_follow_iso_8601() {
        // 2024-01-01 is a Monday in ISO week 1.
        assert_eq!(iso_week_label(at(2024, 1, 1, 10)), "2024-W01");
        // 2023-01-01 is a Sunday belonging to ISO 2022-W52.
        assert_eq!(iso_week_label(at(2023, 1, 1, 10)), "2022-W52");
    }

    #[test]
    fn previous_week_crosses_year_boundaries() {
        assert_eq!(previous_week_label(at(2024, 1, 3, 10)), "2023-W52");
    }

    #[test]
    fn hour_labels_are_utc_hours() {
        assert_eq!(hour_label(at(2024, 7, 31, 14)), "2024-07-31T14");
    }

    #[test]
    fn seconds_to_next_hour_counts_down() {
        assert_eq!(seconds_to_next_hour(at(2024, 7, 31, 14)), 3600 - (30 * 60 + 15));
    }

    #[test]
    fn reset_is_the_next_monday_midnight() {
        // Wednesday → following Monday.
        let reset = next_week_reset(at(2024, 7, 31, 14));
        assert_eq!(reset.date_naive(), NaiveDate::from_ymd_opt(2024, 8, 5).unwrap());
        assert_eq!(reset.time(), NaiveTime::MIN);

        // A Monday rolls a full week forward.
        let reset = next_week_reset(at(2024, 7, 29, 0));
        assert_eq!(reset.date_naive(), NaiveDate::from_ymd_opt(2024, 8, 5).unwrap());
    }
}
