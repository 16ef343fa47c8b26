//! Reporting-period labels: classification, parsing and ordering.
//!
//! Workbook columns mix quarterly labels (`Q1 2023`, `Q1_2023`), fiscal-year
//! labels (`FY2023`, `FY_2023`) and year-over-year delta columns
//! (`Q4 2024 vs. Q4 2023`). Delta columns are dropped; the rest are ordered as
//! two buckets: every quarter by `(year, quarter)`, then every fiscal year by
//! year.

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::utils::last_day_of_month;

/// A normalized reporting period.
///
/// Ordering puts every quarter before every fiscal year, matching the
/// two-bucket order of [`sort_periods`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodKey {
    Quarter { year: i32, quarter: u32 },
    Fiscal { year: i32 },
}

impl PeriodKey {
    /// Parses a label into a period. Pure function of the label text;
    /// year-over-year labels and anything malformed yield `None`.
    pub fn parse(label: &str) -> Option<PeriodKey> {
        if is_comparison_label(label) {
            return None;
        }
        match classify(label)? {
            PeriodKind::Fiscal => parse_fiscal_year(label).map(|year| PeriodKey::Fiscal { year }),
            PeriodKind::Quarterly => parse_quarter_parts(label)
                .filter(|(_, quarter)| (1..=4).contains(quarter))
                .map(|(year, quarter)| PeriodKey::Quarter { year, quarter }),
        }
    }

    pub fn year(&self) -> i32 {
        match *self {
            PeriodKey::Quarter { year, .. } | PeriodKey::Fiscal { year } => year,
        }
    }

    /// Calendar months `(first, last)` covered by the period, inclusive.
    pub fn month_range(&self) -> (u32, u32) {
        match *self {
            PeriodKey::Fiscal { .. } => (1, 12),
            PeriodKey::Quarter { quarter, .. } => (quarter.saturating_sub(1) * 3 + 1, quarter * 3),
        }
    }

    /// First and last calendar day of the period.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let (first, last) = self.month_range();
        let start = NaiveDate::from_ymd_opt(self.year(), first, 1)?;
        let end = last_day_of_month(self.year(), last)?;
        Some((start, end))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.date_range()
            .map(|(start, end)| date >= start && date <= end)
            .unwrap_or(false)
    }
}

impl PartialOrd for PeriodKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PeriodKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                PeriodKey::Quarter { year: y1, quarter: q1 },
                PeriodKey::Quarter { year: y2, quarter: q2 },
            ) => (y1, q1).cmp(&(y2, q2)),
            (PeriodKey::Fiscal { year: y1 }, PeriodKey::Fiscal { year: y2 }) => y1.cmp(y2),
            (PeriodKey::Quarter { .. }, PeriodKey::Fiscal { .. }) => Ordering::Less,
            (PeriodKey::Fiscal { .. }, PeriodKey::Quarter { .. }) => Ordering::Greater,
        }
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodKey::Quarter { year, quarter } => write!(f, "Q{}_{}", quarter, year),
            PeriodKey::Fiscal { year } => write!(f, "FY{}", year),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeriodKind {
    Quarterly,
    Fiscal,
}

/// Year-over-year delta columns carry "vs" somewhere in the label.
pub fn is_comparison_label(label: &str) -> bool {
    label.to_lowercase().contains("vs")
}

fn classify(label: &str) -> Option<PeriodKind> {
    let upper = label.trim().to_uppercase();
    if upper.starts_with("FY") {
        Some(PeriodKind::Fiscal)
    } else if upper.contains('Q') {
        Some(PeriodKind::Quarterly)
    } else {
        None
    }
}

/// `Q<n>_<year>` splits on the underscore; `Q<n> <year>` splits into the
/// leading quarter token and the trailing digit run. Only checks that both
/// parts are numbers; the quarter range is not validated here.
fn parse_quarter_parts(label: &str) -> Option<(i32, u32)> {
    let upper = label.trim().to_uppercase();

    let (quarter_part, year_part) = if upper.contains('_') {
        let mut parts = upper.split('_');
        (parts.next()?.to_string(), parts.next()?.to_string())
    } else {
        let quarter_part: String = upper
            .chars()
            .take_while(|c| !c.is_whitespace())
            .collect();
        let year_part: String = upper
            .chars()
            .skip(quarter_part.chars().count())
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        (quarter_part, year_part)
    };

    let quarter: u32 = quarter_part.trim().strip_prefix('Q')?.trim().parse().ok()?;
    let year: i32 = year_part.trim().parse().ok()?;
    Some((year, quarter))
}

fn parse_fiscal_year(label: &str) -> Option<i32> {
    let upper = label.trim().to_uppercase();
    upper
        .strip_prefix("FY")?
        .trim_start_matches('_')
        .trim()
        .parse()
        .ok()
}

/// Orders period labels for display.
///
/// Comparison labels and labels that are neither quarterly nor fiscal are
/// dropped. Quarterly labels come first, sorted by `(year, quarter)`, then
/// fiscal labels sorted by year. A label that classifies but fails to parse
/// sorts with key `(0, 0)` (quarterly) or `0` (fiscal), i.e. first in its
/// bucket. Ties keep input order.
pub fn sort_periods<'a, I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a S>,
    S: AsRef<str> + ?Sized + 'a,
{
    let mut quarterly: Vec<(String, (i32, u32))> = Vec::new();
    let mut fiscal: Vec<(String, i32)> = Vec::new();

    for label in labels {
        let label = label.as_ref();
        if label.trim().is_empty() || is_comparison_label(label) {
            continue;
        }
        match classify(label) {
            Some(PeriodKind::Fiscal) => {
                let year = parse_fiscal_year(label).unwrap_or_else(|| {
                    debug!("Fiscal label '{}' has no parseable year, sorting as 0", label);
                    0
                });
                fiscal.push((label.to_string(), year));
            }
            Some(PeriodKind::Quarterly) => {
                let key = parse_quarter_parts(label).unwrap_or_else(|| {
                    debug!("Quarterly label '{}' is malformed, sorting as (0, 0)", label);
                    (0, 0)
                });
                quarterly.push((label.to_string(), key));
            }
            None => debug!("Dropping unclassifiable period label '{}'", label),
        }
    }

    quarterly.sort_by_key(|(_, key)| *key);
    fiscal.sort_by_key(|(_, year)| *year);

    quarterly
        .into_iter()
        .map(|(label, _)| label)
        .chain(fiscal.into_iter().map(|(label, _)| label))
        .collect()
}

/// Normalizes a raw header cell into a period label: spaces, periods and
/// newlines become `_`, surrounding whitespace is trimmed.
pub fn sanitize_period_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '.' | '\n' | '\r' => '_',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}
