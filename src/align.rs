//! Resolves reporting periods onto monthly macro observations.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::indicators::{IndicatorTable, MacroSeries};
use crate::outcome::Outcome;
use crate::period::PeriodKey;

/// How the observations that fall inside one period are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    /// Average of every observation in the period.
    Mean,
    /// Most recent observation in the period.
    LastObserved,
}

/// Which indicator column to align, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSelector {
    pub column_fragment: &'static str,
    pub aggregation: Aggregation,
}

impl IndicatorSelector {
    pub const BUSINESS_CLIMATE: IndicatorSelector = IndicatorSelector {
        column_fragment: "geschaeftsklima",
        aggregation: Aggregation::LastObserved,
    };

    pub const COMPOSITE_INDEX: IndicatorSelector = IndicatorSelector {
        column_fragment: "composite_pmi",
        aggregation: Aggregation::Mean,
    };
}

/// Aggregates the observations inside one period, `None` when there are none.
pub fn aggregate_period(
    period: &PeriodKey,
    series: &MacroSeries,
    mode: Aggregation,
) -> Option<f64> {
    let (start, end) = period.date_range()?;
    let selected = series.between(start, end).map(|o| o.value);

    match mode {
        Aggregation::LastObserved => selected.last(),
        Aggregation::Mean => {
            let (sum, count) = selected.fold((0.0, 0usize), |(sum, count), v| {
                (sum + v, count + 1)
            });
            if count == 0 {
                return None;
            }
            let mean = sum / count as f64;
            mean.is_finite().then_some(mean)
        }
    }
}

/// One aggregate per period, in input order.
pub fn align(periods: &[PeriodKey], series: &MacroSeries, mode: Aggregation) -> Vec<Option<f64>> {
    periods
        .iter()
        .map(|period| {
            let value = aggregate_period(period, series, mode);
            debug!("{} -> {:?} ({:?}, '{}')", period, value, mode, series.name);
            value
        })
        .collect()
}

/// Aligns the selected indicator column onto raw period labels.
///
/// Labels that do not parse get `None`. A table without a matching column
/// degrades to all-`None` of the same length.
pub fn align_labels<S: AsRef<str>>(
    labels: &[S],
    table: &IndicatorTable,
    selector: &IndicatorSelector,
) -> Outcome<Vec<Option<f64>>> {
    let Some(series) = table.series(selector.column_fragment) else {
        return Outcome::degraded(
            vec![None; labels.len()],
            format!(
                "No column matching '{}' in indicator table '{}'",
                selector.column_fragment, table.name
            ),
        );
    };

    let values = labels
        .iter()
        .map(|label| {
            let label = label.as_ref();
            match PeriodKey::parse(label) {
                Some(period) => aggregate_period(&period, &series, selector.aggregation),
                None => {
                    debug!("Period label '{}' cannot be aligned", label);
                    None
                }
            }
        })
        .collect();
    Outcome::Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorRow;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn series(points: &[(i32, u32, f64)]) -> MacroSeries {
        MacroSeries::new("idx", points.iter().map(|&(y, m, v)| (date(y, m), v)))
    }

    #[test]
    fn test_last_observed_takes_latest_in_quarter() {
        let s = series(&[(2023, 1, 90.0), (2023, 3, 92.0), (2023, 4, 95.0)]);
        let q1 = PeriodKey::Quarter { year: 2023, quarter: 1 };
        assert_eq!(aggregate_period(&q1, &s, Aggregation::LastObserved), Some(92.0));
    }

    #[test]
    fn test_mean_over_quarter() {
        let s = series(&[(2023, 4, 50.0), (2023, 5, 52.0), (2023, 6, 54.0), (2023, 7, 80.0)]);
        let q2 = PeriodKey::Quarter { year: 2023, quarter: 2 };
        assert_eq!(aggregate_period(&q2, &s, Aggregation::Mean), Some(52.0));
    }

    #[test]
    fn test_mean_of_single_observation_is_exact() {
        let s = series(&[(2023, 11, 49.7)]);
        let q4 = PeriodKey::Quarter { year: 2023, quarter: 4 };
        assert_eq!(aggregate_period(&q4, &s, Aggregation::Mean), Some(49.7));
    }

    #[test]
    fn test_empty_window_is_none_in_both_modes() {
        let s = series(&[(2021, 1, 1.0)]);
        let fy = PeriodKey::Fiscal { year: 2023 };
        assert_eq!(aggregate_period(&fy, &s, Aggregation::LastObserved), None);
        assert_eq!(aggregate_period(&fy, &s, Aggregation::Mean), None);
    }

    #[test]
    fn test_fiscal_year_uses_december_when_last() {
        let s = series(&[(2022, 12, 88.6)]);
        let values = align(&[PeriodKey::Fiscal { year: 2022 }], &s, Aggregation::LastObserved);
        assert_eq!(values, vec![Some(88.6)]);
    }

    #[test]
    fn test_align_labels_handles_unparseable_and_missing_column() {
        let table = IndicatorTable {
            name: "ifo".to_string(),
            date_column: "Monat/Jahr".to_string(),
            columns: vec!["geschaeftsklima".to_string()],
            rows: vec![IndicatorRow {
                date: date(2023, 2),
                values: vec![Some(91.1)],
            }],
            skipped_rows: 0,
        };
        let labels = ["Q1_2023", "Total", "FY2023"];

        let outcome = align_labels(&labels, &table, &IndicatorSelector::BUSINESS_CLIMATE);
        assert!(outcome.is_ok());
        assert_eq!(outcome.into_value(), vec![Some(91.1), None, Some(91.1)]);

        let outcome = align_labels(&labels, &table, &IndicatorSelector::COMPOSITE_INDEX);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.into_value(), vec![None, None, None]);
    }
}
