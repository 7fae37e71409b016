//! Challenge day calendar
//!
//! Pure date arithmetic. Day 1 is the configured start date itself; dates
//! before the start yield a non-positive day, which callers treat as
//! "nothing to do yet".

use chrono::{Days, NaiveDate};

/// 1-based challenge day that `today` falls on
pub fn current_day(start_day: NaiveDate, today: NaiveDate) -> i64 {
    (today - start_day).num_days() + 1
}

/// Calendar date of challenge `day`
///
/// Day 1 maps to `start_day`; non-positive days map to dates before it.
pub fn day_date(start_day: NaiveDate, day: i64) -> NaiveDate {
    let offset = day - 1;
    let shifted = if offset >= 0 {
        start_day.checked_add_days(Days::new(offset as u64))
    } else {
        start_day.checked_sub_days(Days::new(offset.unsigned_abs()))
    };
    shifted.unwrap_or(start_day)
}

/// First date to request from the record source
///
/// Re-requests the last day already in the ledger, since that day may have
/// gained records after the previous fetch. An empty ledger starts at
/// `start_day`.
pub fn harvest_window_start(start_day: NaiveDate, ledger_len: usize) -> NaiveDate {
    let offset = ledger_len.saturating_sub(1) as u64;
    start_day
        .checked_add_days(Days::new(offset))
        .unwrap_or(start_day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_start_date_is_day_one() {
        let start = date(2024, 1, 1);
        assert_eq!(current_day(start, start), 1);
        assert_eq!(current_day(start, date(2024, 1, 2)), 2);
    }

    #[test]
    fn test_day_crosses_month_and_leap_day() {
        let start = date(2024, 2, 27);
        assert_eq!(current_day(start, date(2024, 3, 1)), 4);
    }

    #[test]
    fn test_before_start_is_non_positive() {
        let start = date(2024, 1, 10);
        assert_eq!(current_day(start, date(2024, 1, 9)), 0);
        assert_eq!(current_day(start, date(2024, 1, 1)), -8);
    }

    #[test]
    fn test_day_index_is_monotonic() {
        let start = date(2024, 1, 1);
        let mut previous = i64::MIN;
        let mut today = date(2023, 12, 1);
        while today < date(2024, 3, 1) {
            let day = current_day(start, today);
            assert!(day >= previous);
            previous = day;
            today = today.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_day_date_inverts_current_day() {
        let start = date(2024, 1, 1);
        for day in [-3, 0, 1, 2, 31, 366] {
            assert_eq!(current_day(start, day_date(start, day)), day);
        }
    }

    #[test]
    fn test_harvest_window_start() {
        let start = date(2024, 1, 1);
        assert_eq!(harvest_window_start(start, 0), start);
        assert_eq!(harvest_window_start(start, 1), start);
        assert_eq!(harvest_window_start(start, 3), date(2024, 1, 3));
    }
}
