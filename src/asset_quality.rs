//! Asset-quality blocks of the workbook's `Asset Quality` sheet.
//!
//! The sheet has its own fixed layout: Excel serial dates in the first column
//! of rows 17..26, the gross carrying amount (GCA) block in columns 2..11 and
//! the allowance for credit losses (ACL) block in columns 12..21. After
//! dropping fully-empty columns each block must hold exactly the five stage
//! columns.

use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use std::ops::Range;
use std::path::Path;

use crate::error::{InsightsError, Result};
use crate::outcome::Outcome;
use crate::utils::excel_serial_to_date;
use crate::workbook::{open_workbook, read_sheet, SheetGrid};

pub const ASSET_QUALITY_SHEET: &str = "Asset Quality";
pub const STAGE_COLUMNS: [&str; 5] = ["Stage 1", "Stage 2", "Stage 3", "Stage 3 POCI", "Total"];

const DATA_ROWS: Range<usize> = 17..26;
const GCA_COLUMNS: Range<usize> = 2..11;
const ACL_COLUMNS: Range<usize> = 12..21;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetQualityRow {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssetQualityTable {
    pub columns: Vec<String>,
    pub rows: Vec<AssetQualityRow>,
}

impl AssetQualityTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Vec<(NaiveDate, Option<f64>)> {
        let Some(idx) = self.columns.iter().position(|c| c == name) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .map(|row| (row.date, row.values.get(idx).copied().flatten()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssetQuality {
    pub gross_carrying_amount: AssetQualityTable,
    pub allowance_for_credit_losses: AssetQualityTable,
}

impl AssetQuality {
    pub fn is_empty(&self) -> bool {
        self.gross_carrying_amount.is_empty() && self.allowance_for_credit_losses.is_empty()
    }
}

pub fn extract_asset_quality(path: &Path) -> Outcome<AssetQuality> {
    let result = open_workbook(path)
        .and_then(|mut wb| read_sheet(&mut wb, ASSET_QUALITY_SHEET))
        .and_then(|grid| asset_quality_from_grid(&grid));

    match result {
        Ok(quality) => {
            info!(
                "Extracted {} asset-quality dates from '{}'",
                quality.gross_carrying_amount.rows.len(),
                path.display()
            );
            Outcome::Ok(quality)
        }
        Err(e) => Outcome::degraded(
            AssetQuality::default(),
            format!("Asset-quality extraction from '{}' failed: {}", path.display(), e),
        ),
    }
}

fn cell(grid: &SheetGrid, row: usize, col: usize) -> &str {
    grid.get(row)
        .and_then(|r| r.get(col))
        .map(|s| s.trim())
        .unwrap_or("")
}

pub fn asset_quality_from_grid(grid: &SheetGrid) -> Result<AssetQuality> {
    let dates = DATA_ROWS
        .map(|row| {
            let raw = cell(grid, row, 0);
            let serial: f64 = raw.parse().map_err(|_| InsightsError::InvalidDate {
                value: raw.to_string(),
                details: format!("row {} has no serial date", row),
            })?;
            excel_serial_to_date(serial)
        })
        .collect::<Result<Vec<_>>>()?;

    let block = |columns: Range<usize>, name: &str| -> Result<AssetQualityTable> {
        let kept: Vec<usize> = columns
            .filter(|&col| DATA_ROWS.into_iter().any(|row| !cell(grid, row, col).is_empty()))
            .collect();
        if kept.len() != STAGE_COLUMNS.len() {
            return Err(InsightsError::Workbook(format!(
                "{} block has {} non-empty columns, expected {}",
                name,
                kept.len(),
                STAGE_COLUMNS.len()
            )));
        }

        let rows = DATA_ROWS
            .zip(dates.iter())
            .map(|(row, date)| AssetQualityRow {
                date: *date,
                values: kept
                    .iter()
                    .map(|&col| cell(grid, row, col).parse::<f64>().ok())
                    .collect(),
            })
            .collect();

        Ok(AssetQualityTable {
            columns: STAGE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    };

    Ok(AssetQuality {
        gross_carrying_amount: block(GCA_COLUMNS, "GCA")?,
        allowance_for_credit_losses: block(ACL_COLUMNS, "ACL")?,
    })
}
