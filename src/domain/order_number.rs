use chrono::{Datelike, NaiveDate};

/// Largest per-day sequence that fits in the four low-order digits.
pub const MAX_DAILY_SEQUENCE: i64 = 9_999;

const SEQUENCE_WIDTH: i64 = 10_000;

/// `YYMMDD` prefix for a calendar day, e.g. 2024-01-01 -> 240101.
pub fn date_prefix(date: NaiveDate) -> i64 {
    let yy = i64::from(date.year().rem_euclid(100));
    yy * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day())
}

/// Inclusive range of order numbers that belong to `date`.
pub fn day_range(date: NaiveDate) -> (i64, i64) {
    let base = date_prefix(date) * SEQUENCE_WIDTH;
    (base + 1, base + MAX_DAILY_SEQUENCE)
}

/// Next order number for `date`, given the highest number already issued that day.
///
/// Returns `None` once the day's sequence is exhausted.
pub fn next_order_number(date: NaiveDate, last_today: Option<i64>) -> Option<i64> {
    let sequence = match last_today {
        Some(last) => last % SEQUENCE_WIDTH + 1,
        None => 1,
    };

    if sequence > MAX_DAILY_SEQUENCE {
        return None;
    }

    Some(date_prefix(date) * SEQUENCE_WIDTH + sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_order_of_the_day() {
        assert_eq!(next_order_number(day(2024, 1, 1), None), Some(2_401_010_001));
    }

    #[test]
    fn increments_within_a_day() {
        let date = day(2024, 1, 1);
        let first = next_order_number(date, None).unwrap();
        let second = next_order_number(date, Some(first)).unwrap();
        let third = next_order_number(date, Some(second)).unwrap();
        assert_eq!(second, 2_401_010_002);
        assert!(first < second && second < third);
    }

    #[test]
    fn resets_on_the_next_day() {
        assert_eq!(next_order_number(day(2024, 1, 2), None), Some(2_401_020_001));
        assert!(next_order_number(day(2024, 1, 2), None) > Some(2_401_019_999));
    }

    #[test]
    fn exhausted_sequence_yields_none() {
        let date = day(2024, 12, 31);
        assert_eq!(next_order_number(date, Some(2_412_319_999)), None);
        assert_eq!(
            next_order_number(date, Some(2_412_319_998)),
            Some(2_412_319_999)
        );
    }

    #[test]
    fn day_range_covers_every_sequence() {
        let (lo, hi) = day_range(day(2026, 10, 16));
        assert_eq!(lo, 2_610_160_001);
        assert_eq!(hi, 2_610_169_999);
    }
}
