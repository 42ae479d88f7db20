//! Search datetime normalization
//!
//! STAC API servers only accept RFC 3339 instants or intervals in the
//! `datetime` search field. Callers tend to ask for calendar dates instead.

use chrono::{Datelike, NaiveDate};

/// Expand date-only values into the RFC 3339 interval they cover
///
/// `2024-01-01` becomes `2024-01-01T00:00:00Z/2024-01-01T23:59:59Z`, and
/// `2024-01` / `2024` cover the whole month or year. Each side of an interval
/// is expanded the same way; open ends (`..`) and full timestamps are kept.
pub fn datetime_interval(datetime: &str) -> String {
    let datetime = datetime.trim();

    if let Some((start, end)) = datetime.split_once('/') {
        let start = calendar_range(start)
            .map(|(first, _)| start_of_day(first))
            .unwrap_or_else(|| start.to_string());
        let end = calendar_range(end)
            .map(|(_, last)| end_of_day(last))
            .unwrap_or_else(|| end.to_string());
        return format!("{start}/{end}");
    }

    match calendar_range(datetime) {
        Some((first, last)) => format!("{}/{}", start_of_day(first), end_of_day(last)),
        None => datetime.to_string(),
    }
}

/// First and last day named by `YYYY-MM-DD`, `YYYY-MM` or `YYYY`
fn calendar_range(value: &str) -> Option<(NaiveDate, NaiveDate)> {
    let parts: Vec<&str> = value.split('-').collect();

    match parts.as_slice() {
        [year, month, day] => {
            let date = NaiveDate::from_ymd_opt(
                number(year, 4)? as i32,
                number(month, 2)?,
                number(day, 2)?,
            )?;
            Some((date, date))
        }
        [year, month] => {
            let first = NaiveDate::from_ymd_opt(number(year, 4)? as i32, number(month, 2)?, 1)?;
            let next_month = if first.month() == 12 {
                NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
            };
            Some((first, next_month.pred_opt()?))
        }
        [year] => {
            let year = number(year, 4)? as i32;
            Some((
                NaiveDate::from_ymd_opt(year, 1, 1)?,
                NaiveDate::from_ymd_opt(year, 12, 31)?,
            ))
        }
        _ => None,
    }
}

fn number(digits: &str, len: usize) -> Option<u32> {
    if digits.len() != len || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn start_of_day(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}

fn end_of_day(date: NaiveDate) -> String {
    format!("{}T23:59:59Z", date.format("%Y-%m-%d"))
}
