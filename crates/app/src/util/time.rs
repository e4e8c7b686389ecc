use chrono::NaiveDate;
use meter_core::{DateRange, parse_date};

use crate::config::RangeParams;
use crate::error::{AppError, Result};

/// Days covered by a range query that names no bounds.
pub const DEFAULT_RANGE_DAYS: u32 = 30;

fn parse_bound(name: &str, value: &str) -> Result<NaiveDate> {
    parse_date(value)
        .ok_or_else(|| AppError::InvalidInput(format!("invalid {name} date: {value}")))
}

fn default_window(end: NaiveDate) -> Result<DateRange> {
    DateRange::last_days(end, DEFAULT_RANGE_DAYS).ok_or_else(|| {
        AppError::InvalidInput(format!("no {DEFAULT_RANGE_DAYS}-day range ends at {end}"))
    })
}

/// Turns optional `start`/`end` dates into an inclusive range ending at
/// `today` by default.
pub fn resolve_date_range(params: &RangeParams, today: NaiveDate) -> Result<DateRange> {
    let range = match (params.start.as_deref(), params.end.as_deref()) {
        (Some(start), Some(end)) => {
            DateRange::new(parse_bound("start", start)?, parse_bound("end", end)?)
        }
        (Some(start), None) => DateRange::new(parse_bound("start", start)?, today),
        (None, Some(end)) => default_window(parse_bound("end", end)?)?,
        (None, None) => default_window(today)?,
    };
    if !range.is_valid() {
        return Err(AppError::InvalidInput(format!(
            "start {} is after end {}",
            range.start_key(),
            range.end_key()
        )));
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> NaiveDate {
        parse_date(value).expect("date")
    }

    fn params(start: Option<&str>, end: Option<&str>) -> RangeParams {
        RangeParams {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        }
    }

    #[test]
    fn defaults_to_last_thirty_days() {
        let range = resolve_date_range(&params(None, None), date("2025-06-30")).expect("range");
        assert_eq!(range.start_key(), "2025-06-01");
        assert_eq!(range.end_key(), "2025-06-30");
    }

    #[test]
    fn open_bounds_are_filled_in() {
        let today = date("2025-06-30");
        let range = resolve_date_range(&params(Some("2025-06-10"), None), today).expect("range");
        assert_eq!(range.end_key(), "2025-06-30");
        let range = resolve_date_range(&params(None, Some("2025-05-30")), today).expect("range");
        assert_eq!(range.start_key(), "2025-05-01");
    }

    #[test]
    fn rejects_bad_or_inverted_dates() {
        let today = date("2025-06-30");
        assert!(resolve_date_range(&params(Some("06/10/2025"), None), today).is_err());
        assert!(
            resolve_date_range(&params(Some("2025-06-20"), Some("2025-06-10")), today).is_err()
        );
    }

    #[test]
    fn extreme_dates_are_invalid_input() {
        let today = date("2025-06-30");
        for end in ["-262143-01-05", "+262142-12-31", "0000-01-10"] {
            let err = resolve_date_range(&params(None, Some(end)), today).expect_err(end);
            assert!(matches!(err, AppError::InvalidInput(_)), "{end}");
        }
        let range = resolve_date_range(&params(None, Some("0001-01-10")), today).expect("range");
        assert_eq!(range.end_key(), "0001-01-10");
    }
}
