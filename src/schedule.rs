//! Daily trigger time arithmetic.

use chrono::{DateTime, Days, NaiveTime, TimeZone};

/// Next occurrence of `hour:minute` strictly after `now`, in `now`'s timezone.
///
/// Returns `None` for an invalid time of day. A local time skipped by a DST
/// transition moves on to the following day.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let at = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let today = now.date_naive();

    (0..=2u64).find_map(|offset| {
        let day = today.checked_add_days(Days::new(offset))?;
        let candidate = now
            .timezone()
            .from_local_datetime(&day.and_time(at))
            .earliest()?;
        (candidate > *now).then_some(candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_later_today() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 8, 15, 0).unwrap();
        assert_eq!(
            next_run_after(&now, 12, 0),
            Some(Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_already_passed_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(
            next_run_after(&now, 12, 0),
            Some(Utc.with_ymd_and_hms(2026, 3, 11, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_month_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 30).unwrap();
        assert_eq!(
            next_run_after(&now, 0, 5),
            Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 5, 0).unwrap())
        );
    }

    #[test]
    fn test_invalid_time() {
        let now = Utc::now();
        assert_eq!(next_run_after(&now, 25, 0), None);
    }
}
