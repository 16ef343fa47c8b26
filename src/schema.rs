//! Typed records for the extracted KPI mapping.
//!
//! The external shape stays `segment -> kpi -> period_label -> value_string`
//! (all wrappers serialize transparently), but construction goes through
//! [`KpiMappingBuilder`] so the last-write-wins rule for duplicate rows lives
//! in exactly one place.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One captured cell: sanitized period label and the raw (uncoerced) value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodValue {
    pub period: String,
    pub value: String,
}

impl PeriodValue {
    pub fn new(period: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            period: period.into(),
            value: value.into(),
        }
    }
}

/// Values of one KPI keyed by period label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct KpiSeries(BTreeMap<String, String>);

impl KpiSeries {
    pub fn from_values(values: impl IntoIterator<Item = PeriodValue>) -> Self {
        let mut series = BTreeMap::new();
        for pv in values {
            // Two columns sanitizing to the same label: the later column wins.
            series.insert(pv.period, pv.value);
        }
        Self(series)
    }

    pub fn get(&self, period: &str) -> Option<&str> {
        self.0.get(period).map(String::as_str)
    }

    pub fn periods(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, v)| (p.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for KpiSeries {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self::from_values(pairs.into_iter().map(|(p, v)| PeriodValue::new(p, v)))
    }
}

/// All KPIs extracted for one business segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Segment(BTreeMap<String, KpiSeries>);

impl Segment {
    pub fn kpi(&self, kpi_key: &str) -> Option<&KpiSeries> {
        self.0.get(kpi_key)
    }

    pub fn kpi_keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct KpiMapping(BTreeMap<String, Segment>);

impl KpiMapping {
    pub fn segment(&self, segment_key: &str) -> Option<&Segment> {
        self.0.get(segment_key)
    }

    pub fn kpi(&self, segment_key: &str, kpi_key: &str) -> Option<&KpiSeries> {
        self.segment(segment_key).and_then(|s| s.kpi(kpi_key))
    }

    pub fn segment_keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn builder() -> KpiMappingBuilder {
        KpiMappingBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct KpiMappingBuilder {
    segments: BTreeMap<String, Segment>,
}

impl KpiMappingBuilder {
    /// Ensures the segment appears in the output even when nothing matched.
    pub fn segment(&mut self, segment_key: &str) -> &mut Self {
        self.segments.entry(segment_key.to_string()).or_default();
        self
    }

    /// Records a matched row. A later row for the same `(segment, kpi)`
    /// replaces the earlier capture entirely; values are never merged.
    pub fn record(
        &mut self,
        segment_key: &str,
        kpi_key: &str,
        values: impl IntoIterator<Item = PeriodValue>,
    ) -> &mut Self {
        let segment = self.segments.entry(segment_key.to_string()).or_default();
        segment
            .0
            .insert(kpi_key.to_string(), KpiSeries::from_values(values));
        self
    }

    pub fn build(self) -> KpiMapping {
        KpiMapping(self.segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_record_replaces_earlier() {
        let mut builder = KpiMapping::builder();
        builder.record(
            "total_bank",
            "pcl",
            vec![
                PeriodValue::new("Q1_2023", "10"),
                PeriodValue::new("Q2_2023", "11"),
            ],
        );
        builder.record("total_bank", "pcl", vec![PeriodValue::new("Q3_2023", "12")]);

        let mapping = builder.build();
        let series = mapping.kpi("total_bank", "pcl").unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.get("Q3_2023"), Some("12"));
        assert_eq!(series.get("Q1_2023"), None);
    }

    #[test]
    fn test_empty_segment_is_kept() {
        let mut builder = KpiMapping::builder();
        builder.segment("investment_bank");
        let mapping = builder.build();
        assert!(mapping.segment("investment_bank").unwrap().is_empty());
    }

    #[test]
    fn test_serializes_as_nested_maps() {
        let mut builder = KpiMapping::builder();
        builder.record("private_bank", "pcl", vec![PeriodValue::new("FY2023", "8.0")]);
        let json = serde_json::to_value(builder.build()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "private_bank": { "pcl": { "FY2023": "8.0" } } })
        );

        let back: KpiMapping = serde_json::from_value(json).unwrap();
        assert_eq!(back.kpi("private_bank", "pcl").unwrap().get("FY2023"), Some("8.0"));
    }
}
