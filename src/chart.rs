//! Chart series for the rendering client: sorted period labels plus parallel
//! datasets, one for the KPI and one per available macro overlay.

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::align::{align_labels, IndicatorSelector};
use crate::error::{InsightsError, Result};
use crate::indicators::IndicatorTable;
use crate::outcome::Outcome;
use crate::period::sort_periods;
use crate::schema::KpiSeries;

/// Display attributes of one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetStyle {
    pub label: &'static str,
    pub border_color: &'static str,
    pub background_color: &'static str,
    pub y_axis_id: Option<&'static str>,
}

pub const KPI_STYLE: DatasetStyle = DatasetStyle {
    label: "Provision for Credit Losses (bps of Avg Loans)",
    border_color: "#4285F4",
    background_color: "rgba(66, 133, 244, 0.2)",
    y_axis_id: None,
};

pub const BUSINESS_CLIMATE_STYLE: DatasetStyle = DatasetStyle {
    label: "IFO Business Climate Index",
    border_color: "#34A853",
    background_color: "rgba(52, 168, 83, 0.2)",
    y_axis_id: Some("y1"),
};

pub const COMPOSITE_INDEX_STYLE: DatasetStyle = DatasetStyle {
    label: "Global Composite PMI",
    border_color: "#EA4335",
    background_color: "rgba(234, 67, 53, 0.2)",
    y_axis_id: Some("y1"),
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub label: String,
    #[schemars(description = "One value per chart label; null where no value exists.")]
    pub data: Vec<Option<f64>>,
    pub border_color: String,
    pub background_color: String,
    #[serde(rename = "yAxisID", default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Secondary axis for macro overlays.")]
    pub y_axis_id: Option<String>,
}

impl ChartDataset {
    pub fn new(style: &DatasetStyle, data: Vec<Option<f64>>) -> Self {
        Self {
            label: style.label.to_string(),
            data,
            border_color: style.border_color.to_string(),
            background_color: style.background_color.to_string(),
            y_axis_id: style.y_axis_id.map(str::to_string),
        }
    }

    pub fn has_values(&self) -> bool {
        self.data.iter().any(Option::is_some)
    }
}

/// `labels` and every dataset's `data` always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

impl ChartSeries {
    /// No labels and a single empty KPI dataset.
    pub fn empty() -> Self {
        Self {
            labels: Vec::new(),
            datasets: vec![ChartDataset::new(&KPI_STYLE, Vec::new())],
        }
    }

    /// KPI values in sorted period order.
    pub fn from_kpi(series: &KpiSeries) -> Self {
        let labels = sort_periods(series.periods());
        let data = labels
            .iter()
            .map(|label| series.get(label).and_then(clean_value))
            .collect();
        Self {
            labels,
            datasets: vec![ChartDataset::new(&KPI_STYLE, data)],
        }
    }

    /// Appends an overlay aligned to `labels`. Returns `Ok(false)` when every
    /// value is null and the overlay was left out.
    pub fn push_overlay(&mut self, style: &DatasetStyle, data: Vec<Option<f64>>) -> Result<bool> {
        if data.len() != self.labels.len() {
            return Err(InsightsError::Chart(format!(
                "overlay '{}' has {} values for {} labels",
                style.label,
                data.len(),
                self.labels.len()
            )));
        }
        let dataset = ChartDataset::new(style, data);
        if !dataset.has_values() {
            debug!("Omitting overlay '{}': no aligned values", style.label);
            return Ok(false);
        }
        self.datasets.push(dataset);
        Ok(true)
    }

    pub fn kpi_values(&self) -> &[Option<f64>] {
        self.datasets
            .first()
            .map(|d| d.data.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_consistent(&self) -> bool {
        self.datasets.iter().all(|d| d.data.len() == self.labels.len())
    }

    pub fn json_schema() -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(schemars::schema_for!(ChartSeries))
    }
}

impl Default for ChartSeries {
    fn default() -> Self {
        Self::empty()
    }
}

/// A macro indicator to draw on top of the KPI.
#[derive(Debug, Clone, Copy)]
pub struct MacroOverlay<'a> {
    pub table: &'a IndicatorTable,
    pub selector: IndicatorSelector,
    pub style: DatasetStyle,
}

impl<'a> MacroOverlay<'a> {
    pub fn business_climate(table: &'a IndicatorTable) -> Self {
        Self {
            table,
            selector: IndicatorSelector::BUSINESS_CLIMATE,
            style: BUSINESS_CLIMATE_STYLE,
        }
    }

    pub fn composite_index(table: &'a IndicatorTable) -> Self {
        Self {
            table,
            selector: IndicatorSelector::COMPOSITE_INDEX,
            style: COMPOSITE_INDEX_STYLE,
        }
    }
}

/// Converts a raw KPI cell to a number.
///
/// `%`, `bps` and thousands-separator commas are stripped. A single comma
/// followed by one or two digits (and no `.`) is a decimal comma, so `8,0%`
/// reads as `8.0` while `1,234` reads as `1234`. Empty strings, `-` and
/// anything else that does not parse yield `None`.
pub fn clean_value(raw: &str) -> Option<f64> {
    let stripped = raw.replace('%', "").replace("bps", "");
    let stripped = stripped.trim();
    if stripped.is_empty() || stripped == "-" {
        return None;
    }

    let normalized = match stripped.split_once(',') {
        Some((_, fraction))
            if !stripped.contains('.')
                && !fraction.contains(',')
                && (1..=2).contains(&fraction.len())
                && fraction.chars().all(|c| c.is_ascii_digit()) =>
        {
            stripped.replacen(',', ".", 1)
        }
        _ => stripped.replace(',', ""),
    };

    normalized
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn try_build(kpi: &KpiSeries, overlays: &[MacroOverlay<'_>]) -> Result<(ChartSeries, Vec<String>)> {
    let mut chart = ChartSeries::from_kpi(kpi);
    let mut notes = Vec::new();

    for overlay in overlays {
        let aligned = align_labels(chart.labels.as_slice(), overlay.table, &overlay.selector);
        if let Some(reason) = aligned.reason() {
            notes.push(reason.to_string());
        }
        chart.push_overlay(&overlay.style, aligned.into_value())?;
    }

    if !chart.is_consistent() {
        return Err(InsightsError::Chart(
            "datasets are not aligned with labels".to_string(),
        ));
    }
    Ok((chart, notes))
}

/// Builds the chart for one KPI series with optional overlays.
///
/// Never fails: an assembly error yields [`ChartSeries::empty`] as a degraded
/// outcome, and overlays that could not be aligned are reported in the
/// degradation reason while the KPI dataset is kept.
pub fn build_chart(kpi: &KpiSeries, overlays: &[MacroOverlay<'_>]) -> Outcome<ChartSeries> {
    match try_build(kpi, overlays) {
        Ok((chart, notes)) => {
            info!(
                "Built chart with {} label(s) and {} dataset(s)",
                chart.labels.len(),
                chart.datasets.len()
            );
            if notes.is_empty() {
                Outcome::Ok(chart)
            } else {
                Outcome::degraded(chart, notes.join("; "))
            }
        }
        Err(e) => Outcome::degraded(ChartSeries::empty(), format!("Chart assembly failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorRow;
    use chrono::NaiveDate;

    fn table(name: &str, column: &str, points: &[(i32, u32, f64)]) -> IndicatorTable {
        IndicatorTable {
            name: name.to_string(),
            date_column: "Month".to_string(),
            columns: vec![column.to_string()],
            rows: points
                .iter()
                .map(|&(y, m, v)| IndicatorRow {
                    date: NaiveDate::from_ymd_opt(y, m, 1).unwrap(),
                    values: vec![Some(v)],
                })
                .collect(),
            skipped_rows: 0,
        }
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value("12.5"), Some(12.5));
        assert_eq!(clean_value(" 15 bps "), Some(15.0));
        assert_eq!(clean_value("3%"), Some(3.0));
        assert_eq!(clean_value("8,0%"), Some(8.0));
        assert_eq!(clean_value("1,234"), Some(1234.0));
        assert_eq!(clean_value("1,234,567.5"), Some(1234567.5));
        assert_eq!(clean_value("-"), None);
        assert_eq!(clean_value(""), None);
        assert_eq!(clean_value("n/a"), None);
        assert_eq!(clean_value("(12)"), None);
        assert_eq!(clean_value("-4.5"), Some(-4.5));
    }

    #[test]
    fn test_clean_value_is_idempotent() {
        for raw in ["12.5", "8,0%", "1,234", "-4.5", "0"] {
            let once = clean_value(raw).unwrap();
            assert_eq!(clean_value(&once.to_string()), Some(once));
        }
    }

    #[test]
    fn test_kpi_chart_orders_quarters_before_fiscal_years() {
        let kpi = KpiSeries::from([
            ("FY2022", "8,0%"),
            ("Q2_2023", "-"),
            ("Q1_2023", "12.5"),
            ("Q1_2023_vs_Q1_2022", "3"),
        ]);
        let chart = ChartSeries::from_kpi(&kpi);
        assert_eq!(chart.labels, vec!["Q1_2023", "Q2_2023", "FY2022"]);
        assert_eq!(chart.kpi_values(), &[Some(12.5), None, Some(8.0)]);
    }

    #[test]
    fn test_all_null_overlay_is_omitted() {
        let kpi = KpiSeries::from([("Q1_2023", "10"), ("Q2_2023", "11")]);
        let climate = table("ifo", "geschaeftsklima", &[(2019, 1, 95.0)]);
        let outcome = build_chart(&kpi, &[MacroOverlay::business_climate(&climate)]);
        assert!(outcome.is_ok());
        assert_eq!(outcome.value().datasets.len(), 1);
    }

    #[test]
    fn test_overlays_share_label_alignment() {
        let kpi = KpiSeries::from([("Q1 2023", "10"), ("Q2 2023", "11"), ("FY2023", "12")]);
        let composite = table(
            "pmi",
            "Composite_PMI",
            &[(2023, 1, 50.0), (2023, 2, 52.0), (2023, 7, 48.0)],
        );
        let outcome = build_chart(&kpi, &[MacroOverlay::composite_index(&composite)]);
        let chart = outcome.into_value();

        assert_eq!(chart.datasets.len(), 2);
        let overlay = &chart.datasets[1];
        assert_eq!(overlay.label, "Global Composite PMI");
        assert_eq!(overlay.y_axis_id.as_deref(), Some("y1"));
        assert_eq!(overlay.data, vec![Some(51.0), None, Some(50.0)]);
        assert!(chart.is_consistent());
    }

    #[test]
    fn test_missing_overlay_column_keeps_kpi_dataset() {
        let kpi = KpiSeries::from([("Q1_2023", "10")]);
        let wrong = table("pmi", "Services_PMI", &[(2023, 1, 50.0)]);
        let outcome = build_chart(&kpi, &[MacroOverlay::composite_index(&wrong)]);
        assert!(outcome.is_degraded());
        let chart = outcome.into_value();
        assert_eq!(chart.datasets.len(), 1);
        assert_eq!(chart.kpi_values(), &[Some(10.0)]);
    }

    #[test]
    fn test_push_overlay_rejects_length_mismatch() {
        let mut chart = ChartSeries::from_kpi(&KpiSeries::from([("Q1_2023", "10")]));
        assert!(chart
            .push_overlay(&BUSINESS_CLIMATE_STYLE, vec![Some(1.0), Some(2.0)])
            .is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let mut chart = ChartSeries::from_kpi(&KpiSeries::from([("FY2023", "5")]));
        chart
            .push_overlay(&BUSINESS_CLIMATE_STYLE, vec![Some(90.0)])
            .unwrap();
        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["datasets"][0]["borderColor"], "#4285F4");
        assert!(json["datasets"][0].get("yAxisID").is_none());
        assert_eq!(json["datasets"][1]["yAxisID"], "y1");
        assert_eq!(json["datasets"][1]["backgroundColor"], "rgba(52, 168, 83, 0.2)");
    }

    #[test]
    fn test_empty_chart_shape() {
        let json = serde_json::to_value(ChartSeries::empty()).unwrap();
        assert_eq!(json["labels"], serde_json::json!([]));
        assert_eq!(json["datasets"][0]["data"], serde_json::json!([]));
        assert!(ChartSeries::json_schema().unwrap().is_object());
    }
}
