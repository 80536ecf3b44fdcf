use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};

/// The calendar day before `now`, in `now`'s own timezone.
///
/// `None` only at the very start of chrono's representable range.
pub fn yesterday<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<NaiveDate> {
    now.date_naive().checked_sub_days(Days::new(1))
}

/// Returns true if `published` falls on the calendar day before `now`.
///
/// The instant is projected into `now`'s timezone and compared by year,
/// month and day, so this is a calendar test rather than a 24 hour window.
/// The item's original offset plays no part; an item stamped just before
/// midnight elsewhere can land on a different local day. Undated items
/// never match.
pub fn is_from_yesterday<Tz: TimeZone>(
    published: Option<&DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> bool {
    let Some(published) = published else {
        return false;
    };
    let local_day = published.with_timezone(&now.timezone()).date_naive();
    yesterday(now) == Some(local_day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(tz: &FixedOffset, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        tz.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn utc(dt: DateTime<FixedOffset>) -> DateTime<Utc> {
        dt.with_timezone(&Utc)
    }

    #[test]
    fn test_yesterday_date() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = at(&tz, 2026, 10, 17, 7, 0);
        assert_eq!(yesterday(&now), NaiveDate::from_ymd_opt(2026, 10, 16));
    }

    #[test]
    fn test_whole_calendar_day_matches() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = at(&tz, 2026, 10, 17, 0, 5);

        assert!(is_from_yesterday(Some(&utc(at(&tz, 2026, 10, 16, 0, 0))), &now));
        assert!(is_from_yesterday(Some(&utc(at(&tz, 2026, 10, 16, 23, 59))), &now));
    }

    #[test]
    fn test_today_and_two_days_ago_do_not_match() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = at(&tz, 2026, 10, 17, 12, 0);

        assert!(!is_from_yesterday(Some(&utc(at(&tz, 2026, 10, 17, 0, 1))), &now));
        assert!(!is_from_yesterday(Some(&utc(at(&tz, 2026, 10, 15, 23, 59))), &now));
    }

    #[test]
    fn test_not_a_rolling_window() {
        // Both 25 and 13 hours back fall on the 16th
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = at(&tz, 2026, 10, 17, 1, 0);

        assert!(is_from_yesterday(Some(&utc(at(&tz, 2026, 10, 16, 0, 0))), &now));
        assert!(is_from_yesterday(Some(&utc(at(&tz, 2026, 10, 16, 12, 0))), &now));
    }

    #[test]
    fn test_same_year_and_day_but_other_month_rejected() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = at(&tz, 2026, 10, 17, 9, 0);

        assert!(!is_from_yesterday(Some(&utc(at(&tz, 2026, 9, 16, 9, 0))), &now));
        assert!(!is_from_yesterday(Some(&utc(at(&tz, 2025, 10, 16, 9, 0))), &now));
    }

    #[test]
    fn test_month_and_year_boundaries() {
        let tz = FixedOffset::east_opt(0).unwrap();

        let now = at(&tz, 2026, 3, 1, 8, 0);
        assert!(is_from_yesterday(Some(&utc(at(&tz, 2026, 2, 28, 8, 0))), &now));

        let now = at(&tz, 2027, 1, 1, 8, 0);
        assert!(is_from_yesterday(Some(&utc(at(&tz, 2026, 12, 31, 8, 0))), &now));
    }

    #[test]
    fn test_instant_is_projected_into_runner_timezone() {
        // 2026-10-16T23:30Z is already the 17th in UTC+2
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = at(&plus_two, 2026, 10, 17, 9, 0);
        let published = "2026-10-16T23:30:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(!is_from_yesterday(Some(&published), &now));

        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = at(&minus_five, 2026, 10, 17, 9, 0);
        assert!(is_from_yesterday(Some(&published), &now));
    }

    #[test]
    fn test_missing_timestamp_never_matches() {
        let tz = FixedOffset::east_opt(0).unwrap();
        assert!(!is_from_yesterday(None, &at(&tz, 2026, 10, 17, 9, 0)));
    }
}
