//! Macro indicator CSVs (business-climate index, composite index).
//!
//! Both sources are monthly. The business-climate export is
//! semicolon-delimited with decimal commas and a ` MM/YYYY` date column named
//! `Monat/Jahr`; the composite export is a plain CSV with a `Month` column in
//! `MM/YYYY`. Both load into an [`IndicatorTable`], from which a single
//! [`MacroSeries`] is selected by column-name fragment.

use chrono::NaiveDate;
use log::{debug, info, warn};
use std::fs::File;
use std::path::Path;

use crate::error::{InsightsError, Result};
use crate::utils::parse_month_year;

/// Parsing conventions of one indicator export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvFormat {
    pub delimiter: u8,
    pub decimal_comma: bool,
    pub date_column: &'static str,
    /// Lower-case and transliterate German umlauts in column names.
    pub normalize_names: bool,
}

pub const BUSINESS_CLIMATE_FORMAT: CsvFormat = CsvFormat {
    delimiter: b';',
    decimal_comma: true,
    date_column: "Monat/Jahr",
    normalize_names: true,
};

pub const COMPOSITE_INDEX_FORMAT: CsvFormat = CsvFormat {
    delimiter: b',',
    decimal_comma: false,
    date_column: "Month",
    normalize_names: false,
};

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// A monthly table of named indicator columns. Rows are sorted by date;
/// columns and rows without a single value have been dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorTable {
    pub name: String,
    pub date_column: String,
    pub columns: Vec<String>,
    pub rows: Vec<IndicatorRow>,
    /// Rows dropped at load time because their date did not parse.
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroObservation {
    pub date: NaiveDate,
    pub value: f64,
}

/// One indicator as date-ordered observations, at most one per date.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroSeries {
    pub name: String,
    observations: Vec<MacroObservation>,
}

impl MacroSeries {
    /// Sorts by date; for duplicate dates the later entry wins.
    pub fn new(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        let mut points: Vec<(NaiveDate, f64)> = points.into_iter().collect();
        points.sort_by_key(|(date, _)| *date);

        let mut observations: Vec<MacroObservation> = Vec::with_capacity(points.len());
        for (date, value) in points {
            match observations.last_mut() {
                Some(last) if last.date == date => last.value = value,
                _ => observations.push(MacroObservation { date, value }),
            }
        }

        Self {
            name: name.into(),
            observations,
        }
    }

    pub fn observations(&self) -> &[MacroObservation] {
        &self.observations
    }

    /// Observations with `start <= date <= end`, in date order.
    pub fn between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = &MacroObservation> {
        self.observations
            .iter()
            .filter(move |o| o.date >= start && o.date <= end)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl IndicatorTable {
    /// Finds the first column whose name contains `fragment`, ignoring case.
    pub fn find_column(&self, fragment: &str) -> Option<usize> {
        let fragment = fragment.to_lowercase();
        self.columns
            .iter()
            .position(|c| c.to_lowercase().contains(&fragment))
    }

    /// Selects one column as a series; rows without a value are dropped.
    pub fn series(&self, fragment: &str) -> Option<MacroSeries> {
        let idx = self.find_column(fragment)?;
        let points = self
            .rows
            .iter()
            .filter_map(|row| row.values.get(idx).copied().flatten().map(|v| (row.date, v)));
        Some(MacroSeries::new(self.columns[idx].clone(), points))
    }

    /// Keeps rows dated on or after `start`.
    pub fn since(mut self, start: NaiveDate) -> Self {
        self.rows.retain(|row| row.date >= start);
        self
    }

    /// Plain-text grid used in the prompt context.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.date_column);
        for column in &self.columns {
            out.push('\t');
            out.push_str(column);
        }
        out.push('\n');

        for row in &self.rows {
            out.push_str(&row.date.format("%Y-%m-%d").to_string());
            for value in &row.values {
                out.push('\t');
                match value {
                    Some(v) => out.push_str(&v.to_string()),
                    None => out.push_str("NaN"),
                }
            }
            out.push('\n');
        }
        out
    }
}

fn normalize_column_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace('ä', "ae")
        .replace('ö', "oe")
        .replace('ü', "ue")
        .replace('ß', "ss")
}

fn parse_value(raw: &str, decimal_comma: bool) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let normalized = if decimal_comma {
        raw.replace(',', ".")
    } else {
        raw.to_string()
    };
    normalized.parse().ok()
}

pub fn load_indicator_table(path: &Path, format: &CsvFormat) -> Result<IndicatorTable> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .flexible(true)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let wanted_date = format.date_column.to_lowercase();
    let date_idx = headers
        .iter()
        .position(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase() == wanted_date)
        .ok_or_else(|| InsightsError::MissingColumn {
            fragment: format.date_column.to_string(),
            source_name: path.display().to_string(),
        })?;

    let value_indices: Vec<usize> = (0..headers.len()).filter(|&i| i != date_idx).collect();
    let mut columns: Vec<String> = value_indices
        .iter()
        .map(|&i| {
            let raw = headers.get(i).unwrap_or_default();
            if format.normalize_names {
                normalize_column_name(raw)
            } else {
                raw.trim().to_string()
            }
        })
        .collect();

    let mut rows = Vec::new();
    let mut skipped_rows = 0usize;
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("{}:{}: CSV parse error: {}", path.display(), line, e);
                skipped_rows += 1;
                continue;
            }
        };

        let raw_date = record.get(date_idx).unwrap_or_default();
        if raw_date.trim().is_empty() && record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let date = match parse_month_year(raw_date) {
            Ok(d) => d,
            Err(e) => {
                debug!("{}:{}: skipping row: {}", path.display(), line, e);
                skipped_rows += 1;
                continue;
            }
        };

        let values = value_indices
            .iter()
            .map(|&i| record.get(i).and_then(|raw| parse_value(raw, format.decimal_comma)))
            .collect();
        rows.push(IndicatorRow { date, values });
    }

    // Drop all-empty columns, then all-empty rows.
    let keep: Vec<bool> = (0..columns.len())
        .map(|c| rows.iter().any(|r: &IndicatorRow| r.values[c].is_some()))
        .collect();
    let mut kept = keep.iter();
    columns.retain(|_| *kept.next().unwrap_or(&false));
    for row in &mut rows {
        let mut kept = keep.iter();
        row.values.retain(|_| *kept.next().unwrap_or(&false));
    }
    rows.retain(|row| row.values.iter().any(Option::is_some));
    rows.sort_by_key(|row| row.date);

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("indicator")
        .to_string();

    info!(
        "Loaded indicator table '{}' with {} column(s) and {} row(s) ({} skipped)",
        name,
        columns.len(),
        rows.len(),
        skipped_rows
    );

    Ok(IndicatorTable {
        name,
        date_column: format.date_column.to_string(),
        columns,
        rows,
        skipped_rows,
    })
}

/// Business-climate export, optionally limited to rows from `start` on.
pub fn load_business_climate(path: &Path, start: Option<NaiveDate>) -> Result<IndicatorTable> {
    let table = load_indicator_table(path, &BUSINESS_CLIMATE_FORMAT)?;
    Ok(match start {
        Some(start) => table.since(start),
        None => table,
    })
}

pub fn load_composite_index(path: &Path) -> Result<IndicatorTable> {
    load_indicator_table(path, &COMPOSITE_INDEX_FORMAT)
}
