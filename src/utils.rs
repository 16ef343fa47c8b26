use crate::error::{InsightsError, Result};
use chrono::{Days, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

/// Parses a month stamp like `03/2024` (leading/trailing spaces allowed)
/// into the first day of that month.
pub fn parse_month_year(raw: &str) -> Result<NaiveDate> {
    let invalid = |details: &str| InsightsError::InvalidDate {
        value: raw.to_string(),
        details: details.to_string(),
    };

    let (month, year) = raw
        .trim()
        .split_once('/')
        .ok_or_else(|| invalid("expected MM/YYYY"))?;
    let month: u32 = month
        .trim()
        .parse()
        .map_err(|_| invalid("month is not a number"))?;
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| invalid("year is not a number"))?;

    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| invalid("month out of range"))
}

/// Converts an Excel serial day number (1900 date system) to a date.
pub fn excel_serial_to_date(serial: f64) -> Result<NaiveDate> {
    let invalid = || InsightsError::InvalidDate {
        value: serial.to_string(),
        details: "not a valid Excel serial date".to_string(),
    };
    if !serial.is_finite() || serial < 0.0 {
        return Err(invalid());
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30).ok_or_else(invalid)?;
    base.checked_add_days(Days::new(serial.trunc() as u64))
        .ok_or_else(invalid)
}

/// Keeps at most `budget` characters (not bytes) of `text`.
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
