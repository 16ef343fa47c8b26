//! Tabular KPI extraction from the multi-sheet financial workbook.
//!
//! Each configured sheet reports one business segment. Sheets are read
//! without header inference: the row at `layout.header_row` carries the
//! period labels and every row from `layout.first_data_row` on is data.
//! Row labels (first column) are matched against the ordered [`KpiRule`]s.

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use log::{debug, info};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::config::{KpiRule, SegmentSheet, WorkbookLayout};
use crate::error::{InsightsError, Result};
use crate::outcome::Outcome;
use crate::period::sanitize_period_label;
use crate::schema::{KpiMapping, KpiMappingBuilder, PeriodValue};

/// One data row of a sheet: its label and `(column header, cell value)` pairs
/// for every column after the label column.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWorkbookRow {
    pub label: String,
    pub cells: Vec<(String, String)>,
}

impl RawWorkbookRow {
    fn is_blank(&self) -> bool {
        self.label.trim().is_empty() && self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

/// Sheet contents as a dense grid of strings, addressed by absolute
/// (0-based) row and column. Empty cells are `""`, never missing.
pub type SheetGrid = Vec<Vec<String>>;

pub(crate) fn open_workbook(path: &Path) -> Result<Sheets<BufReader<File>>> {
    Ok(open_workbook_auto(path)?)
}

pub(crate) fn read_sheet(
    workbook: &mut Sheets<BufReader<File>>,
    sheet: &str,
) -> Result<SheetGrid> {
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(InsightsError::SheetNotFound(sheet.to_string()));
    }
    let range = workbook.worksheet_range(sheet)?;
    Ok(range_to_grid(&range))
}

/// Expands a calamine range into an absolute grid so that row indices match
/// the sheet even when the used range does not start at `A1`.
pub fn range_to_grid(range: &Range<Data>) -> SheetGrid {
    let Some((end_row, end_col)) = range.end() else {
        return Vec::new();
    };

    (0..=end_row)
        .map(|row| {
            (0..=end_col)
                .map(|col| range.get_value((row, col)).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect()
}

pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::Error(e) => e.to_string(),
    }
}

/// Splits a grid into data rows according to the layout. Fully-empty rows
/// are dropped; short rows are padded with empty strings.
pub fn rows_from_grid(grid: &SheetGrid, layout: &WorkbookLayout) -> Vec<RawWorkbookRow> {
    let Some(header) = grid.get(layout.header_row) else {
        return Vec::new();
    };

    grid.iter()
        .skip(layout.first_data_row)
        .map(|row| {
            let label = row.first().cloned().unwrap_or_default();
            let width = header.len().max(row.len());
            let cells = (1..width)
                .map(|col| {
                    let period = header.get(col).cloned().unwrap_or_default();
                    let value = row.get(col).cloned().unwrap_or_default();
                    (period, value)
                })
                .collect();
            RawWorkbookRow { label, cells }
        })
        .filter(|row| !row.is_blank())
        .collect()
}

/// Captures the non-empty cells of a matched row keyed by sanitized period.
/// Cells under an empty header have no period and are skipped.
fn capture_row(row: &RawWorkbookRow) -> Vec<PeriodValue> {
    row.cells
        .iter()
        .filter_map(|(period, value)| {
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            let period = sanitize_period_label(period);
            if period.is_empty() {
                debug!("Skipping value '{}' under an empty period header", value);
                return None;
            }
            Some(PeriodValue::new(period, value))
        })
        .collect()
}

/// Matches every row against every rule. Rows are visited in sheet order, so
/// when several rows match one KPI the last one is what remains.
pub fn collect_segment(
    builder: &mut KpiMappingBuilder,
    segment_key: &str,
    rows: &[RawWorkbookRow],
    rules: &[KpiRule],
) {
    builder.segment(segment_key);
    for row in rows {
        let label = row.label.to_lowercase();
        for rule in rules.iter().filter(|rule| rule.matches(&label)) {
            debug!(
                "Row '{}' matched KPI '{}' in segment '{}'",
                row.label.trim(),
                rule.kpi_key,
                segment_key
            );
            builder.record(segment_key, &rule.kpi_key, capture_row(row));
        }
    }
}

/// Extracts `segment -> kpi -> period -> value` from the workbook.
///
/// A sheet that is missing or unreadable yields an empty segment and a
/// degraded outcome; sibling segments are unaffected. An unreadable workbook
/// yields every configured segment empty.
pub fn extract_kpis(
    path: &Path,
    segments: &[SegmentSheet],
    rules: &[KpiRule],
    layout: &WorkbookLayout,
) -> Outcome<KpiMapping> {
    let mut builder = KpiMapping::builder();
    for segment in segments {
        builder.segment(&segment.segment_key);
    }

    let mut workbook = match open_workbook(path) {
        Ok(wb) => wb,
        Err(e) => {
            return Outcome::degraded(
                builder.build(),
                format!("Workbook '{}' unreadable: {}", path.display(), e),
            );
        }
    };

    let mut failures = Vec::new();
    for segment in segments {
        match read_sheet(&mut workbook, &segment.sheet) {
            Ok(grid) => {
                let rows = rows_from_grid(&grid, layout);
                collect_segment(&mut builder, &segment.segment_key, &rows, rules);
            }
            Err(e) => failures.push(format!(
                "segment '{}' (sheet '{}'): {}",
                segment.segment_key, segment.sheet, e
            )),
        }
    }

    let mapping = builder.build();
    info!(
        "Extracted KPIs for {} segment(s) from '{}'",
        segments.len() - failures.len(),
        path.display()
    );

    if failures.is_empty() {
        Outcome::Ok(mapping)
    } else {
        Outcome::degraded(
            mapping,
            format!("KPI extraction incomplete: {}", failures.join("; ")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_kpi_rules;

    fn grid(rows: &[&[&str]]) -> SheetGrid {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn sample_grid() -> SheetGrid {
        grid(&[
            &["Financial summary"],
            &[],
            &["in EUR m."],
            &["", "Q1 2023", "Q2 2023", "FY 2022", "Q2 2023 vs. Q2 2022"],
            &[],
            &["Net interest income", "3,200", "3,300", "13,000", "3%"],
            &["", "", "", "", ""],
            &["Provision for credit losses (bps of average loans)", "12.5", "-", "8,0%", ""],
            &["Allowance for loan losses", "5.0", "5.1"],
        ])
    }

    #[test]
    fn test_rows_from_grid_skips_header_and_blank_rows() {
        let rows = rows_from_grid(&sample_grid(), &WorkbookLayout::default());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].label, "Net interest income");
        assert_eq!(rows[0].cells[0], ("Q1 2023".to_string(), "3,200".to_string()));
        // short row padded to header width
        assert_eq!(rows[2].cells.len(), 4);
        assert_eq!(rows[2].cells[3], ("Q2 2023 vs. Q2 2022".to_string(), String::new()));
    }

    #[test]
    fn test_collect_segment_captures_matched_rows() {
        let rows = rows_from_grid(&sample_grid(), &WorkbookLayout::default());
        let mut builder = KpiMapping::builder();
        collect_segment(&mut builder, "total_bank", &rows, &default_kpi_rules());
        let mapping = builder.build();

        let pcl = mapping
            .kpi("total_bank", "provision_for_credit_losses_bps_avg_loans")
            .unwrap();
        assert_eq!(pcl.get("Q1_2023"), Some("12.5"));
        assert_eq!(pcl.get("Q2_2023"), Some("-"));
        assert_eq!(pcl.get("FY_2022"), Some("8,0%"));
        assert_eq!(pcl.len(), 3);

        let allowance = mapping
            .kpi("total_bank", "allowance_for_loan_losses_in_eur_bn")
            .unwrap();
        assert_eq!(allowance.get("Q2_2023"), Some("5.1"));
        assert!(mapping
            .kpi("total_bank", "average_loans_gross_of_allowance_for_loan_losses_in_eur_bn")
            .is_none());
    }

    #[test]
    fn test_duplicate_matches_last_row_wins() {
        let rows = vec![
            RawWorkbookRow {
                label: "Provision for credit losses".to_string(),
                cells: vec![
                    ("Q1 2023".to_string(), "10".to_string()),
                    ("Q2 2023".to_string(), "11".to_string()),
                ],
            },
            RawWorkbookRow {
                label: "Provision for credit losses (restated)".to_string(),
                cells: vec![
                    ("Q1 2023".to_string(), "".to_string()),
                    ("Q2 2023".to_string(), "13".to_string()),
                ],
            },
        ];
        let mut builder = KpiMapping::builder();
        collect_segment(&mut builder, "corporate_bank", &rows, &default_kpi_rules());
        let mapping = builder.build();
        let pcl = mapping
            .kpi("corporate_bank", "provision_for_credit_losses_bps_avg_loans")
            .unwrap();
        assert_eq!(pcl.len(), 1);
        assert_eq!(pcl.get("Q2_2023"), Some("13"));
    }

    #[test]
    fn test_one_row_can_feed_several_rules() {
        let rows = vec![RawWorkbookRow {
            label: "Average loans (gross of allowance for loan losses)".to_string(),
            cells: vec![("FY2023".to_string(), "480".to_string())],
        }];
        let mut builder = KpiMapping::builder();
        collect_segment(&mut builder, "private_bank", &rows, &default_kpi_rules());
        let mapping = builder.build();
        let segment = mapping.segment("private_bank").unwrap();
        // "allowance for loan losses", "average loans (...)" and "loans (...)" all match
        assert_eq!(segment.len(), 3);
    }

    #[test]
    fn test_empty_header_cells_are_skipped() {
        let row = RawWorkbookRow {
            label: "pcl".to_string(),
            cells: vec![
                ("".to_string(), "99".to_string()),
                ("Q3 2023".to_string(), " 14 ".to_string()),
            ],
        };
        let captured = capture_row(&row);
        assert_eq!(captured, vec![PeriodValue::new("Q3_2023", "14")]);
    }

    #[test]
    fn test_missing_workbook_degrades_to_empty_segments() {
        let segments = vec![SegmentSheet::new("FinSum", "total_bank")];
        let outcome = extract_kpis(
            Path::new("/nonexistent/workbook.xlsx"),
            &segments,
            &default_kpi_rules(),
            &WorkbookLayout::default(),
        );
        assert!(outcome.is_degraded());
        let mapping = outcome.into_value();
        assert!(mapping.segment("total_bank").unwrap().is_empty());
    }

    #[test]
    fn test_cell_text_formats() {
        assert_eq!(cell_text(&Data::Float(12.5)), "12.5");
        assert_eq!(cell_text(&Data::Float(12.0)), "12");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("Q1 2023".to_string())), "Q1 2023");
    }
}
