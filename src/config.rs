use crate::error::{InsightsError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// KPI whose series drives the main chart.
pub const PRIMARY_KPI: &str = "provision_for_credit_losses_bps_avg_loans";

/// Segment sheet used when a request names an unknown segment.
pub const DEFAULT_SEGMENT_SHEET: &str = "FinSum";

/// Maps one workbook sheet to the business segment it reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSheet {
    pub sheet: String,
    pub segment_key: String,
}

impl SegmentSheet {
    pub fn new(sheet: impl Into<String>, segment_key: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            segment_key: segment_key.into(),
        }
    }
}

/// One row-matching rule. A row belongs to `kpi_key` when its lower-cased
/// label contains any of the keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiRule {
    pub kpi_key: String,
    pub keywords: Vec<String>,
}

impl KpiRule {
    pub fn new(kpi_key: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            kpi_key: kpi_key.into(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn matches(&self, lowered_label: &str) -> bool {
        self.keywords
            .iter()
            .any(|kw| lowered_label.contains(kw.to_lowercase().as_str()))
    }
}

/// Fixed structural convention of the segment sheets (0-based row indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookLayout {
    pub header_row: usize,
    pub first_data_row: usize,
}

impl Default for WorkbookLayout {
    fn default() -> Self {
        Self {
            header_row: 3,
            first_data_row: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub workbook_file: String,
    pub business_climate_file: String,
    pub composite_index_file: String,
    pub composite_report_file: String,
    pub examples_file: String,
    pub layout: WorkbookLayout,
    pub segments: Vec<SegmentSheet>,
    pub kpi_rules: Vec<KpiRule>,
    /// Characters kept per uploaded document before it enters the prompt.
    pub document_char_budget: usize,
    pub retry: RetryPolicy,
    pub model: String,
    pub max_output_tokens: u32,
    pub business_climate_start: Option<NaiveDate>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            uploads_dir: PathBuf::from("uploads"),
            workbook_file: "FDS-Q4-2024-13032025.xlsb".to_string(),
            business_climate_file: "202504_ifo_gsk_prepared.csv".to_string(),
            composite_index_file: "global_composite_pmi.csv".to_string(),
            composite_report_file: "202502_pmi.pdf".to_string(),
            examples_file: "examples.txt".to_string(),
            layout: WorkbookLayout::default(),
            segments: default_segments(),
            kpi_rules: default_kpi_rules(),
            document_char_budget: 3000,
            retry: RetryPolicy::default(),
            model: "gemini-2.5-flash-preview-04-17".to_string(),
            max_output_tokens: 8192,
            business_climate_start: None,
        }
    }
}

impl AnalysisConfig {
    /// Loads a (possibly partial) JSON config; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.segments.is_empty() {
            return Err(InsightsError::InvalidConfig(
                "at least one segment sheet is required".to_string(),
            ));
        }
        if self.kpi_rules.is_empty() {
            return Err(InsightsError::InvalidConfig(
                "at least one KPI rule is required".to_string(),
            ));
        }
        if let Some(rule) = self.kpi_rules.iter().find(|r| r.keywords.is_empty()) {
            return Err(InsightsError::InvalidConfig(format!(
                "KPI rule '{}' has no keywords",
                rule.kpi_key
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(InsightsError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.layout.first_data_row <= self.layout.header_row {
            return Err(InsightsError::InvalidConfig(format!(
                "first data row {} must come after header row {}",
                self.layout.first_data_row, self.layout.header_row
            )));
        }
        Ok(())
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.data_dir.join(&self.workbook_file)
    }

    pub fn business_climate_path(&self) -> PathBuf {
        self.data_dir.join(&self.business_climate_file)
    }

    pub fn composite_index_path(&self) -> PathBuf {
        self.data_dir.join(&self.composite_index_file)
    }

    pub fn composite_report_path(&self) -> PathBuf {
        self.data_dir.join(&self.composite_report_file)
    }

    pub fn examples_path(&self) -> PathBuf {
        self.data_dir.join(&self.examples_file)
    }

    pub fn segment_for_sheet(&self, sheet: &str) -> Option<&SegmentSheet> {
        self.segments.iter().find(|s| s.sheet == sheet)
    }
}

pub fn default_segments() -> Vec<SegmentSheet> {
    vec![
        SegmentSheet::new("FinSum", "total_bank"),
        SegmentSheet::new("CB", "corporate_bank"),
        SegmentSheet::new("IB", "investment_bank"),
        SegmentSheet::new("PB", "private_bank"),
    ]
}

pub fn default_kpi_rules() -> Vec<KpiRule> {
    vec![
        KpiRule::new(
            PRIMARY_KPI,
            &[
                "provision for credit losses",
                "credit losses",
                "llp",
                "pcl",
                "bps",
                "basispunkte",
            ],
        ),
        KpiRule::new(
            "allowance_for_loan_losses_in_eur_bn",
            &["allowance for loan losses"],
        ),
        KpiRule::new(
            "average_loans_gross_of_allowance_for_loan_losses_in_eur_bn",
            &["average loans (gross of allowance for loan losses)"],
        ),
        KpiRule::new(
            "loans_gross_of_allowance_for_loan_losses_in_eur_bn",
            &["loans (gross of allowance for loan losses)"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.layout.header_row, 3);
        assert_eq!(config.layout.first_data_row, 5);
        assert_eq!(config.document_char_budget, 3000);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay(), Duration::from_secs(3));
        assert_eq!(
            config.segment_for_sheet("PB").map(|s| s.segment_key.as_str()),
            Some("private_bank")
        );
    }

    #[test]
    fn test_rule_matching_is_case_insensitive_substring() {
        let rule = KpiRule::new("pcl", &["Provision for Credit Losses", "llp"]);
        assert!(rule.matches("provision for credit losses (bps of average loans)"));
        assert!(rule.matches("llp ratio"));
        assert!(!rule.matches("net interest income"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "data_dir": "/srv/data", "retry": {{ "max_attempts": 2, "delay_secs": 0 }} }}"#
        )
        .unwrap();

        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.segments.len(), 4);
        assert_eq!(
            config.workbook_path(),
            PathBuf::from("/srv/data/FDS-Q4-2024-13032025.xlsb")
        );
    }

    #[test]
    fn test_validate_rejects_bad_layout() {
        let config = AnalysisConfig {
            layout: WorkbookLayout {
                header_row: 5,
                first_data_row: 5,
            },
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(InsightsError::InvalidConfig(_))
        ));
    }
}
