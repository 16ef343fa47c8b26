//! The single-request analysis pipeline.
//!
//! Extraction, period ordering, alignment and chart assembly run strictly in
//! sequence. Every stage degrades instead of failing, so a response always
//! carries a valid chart; the degradations observed along the way are
//! returned with it. Narrative generation is the only external call and its
//! terminal failure is reported in the result rather than as an error.

use log::{info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::asset_quality::extract_asset_quality;
use crate::chart::{build_chart, ChartSeries, MacroOverlay};
use crate::config::{AnalysisConfig, DEFAULT_SEGMENT_SHEET, PRIMARY_KPI};
use crate::context::{InstructionPromptRenderer, PromptContext, PromptRenderer};
use crate::documents::collect_uploaded_texts;
use crate::generation::{generate_with_retry, TextGenerator};
use crate::indicators::{load_business_climate, load_composite_index, IndicatorTable};
use crate::outcome::{Degradation, Outcome};
use crate::prompts::COMPOSITE_REPORT_NOTE;
use crate::schema::KpiSeries;
use crate::workbook::extract_kpis;

/// Macro indicators a request can select, by their front-end names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum MacroIndicator {
    #[serde(rename = "Ifo")]
    BusinessClimate,
    #[serde(rename = "PMI")]
    CompositeIndex,
}

impl MacroIndicator {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Ifo" => Some(MacroIndicator::BusinessClimate),
            "PMI" => Some(MacroIndicator::CompositeIndex),
            _ => None,
        }
    }
}

const TREND_SUMMARY: &str =
    "The AI has analyzed trends based on the provided data and macro indicators.";

/// Maps a front-end segment name to its workbook sheet.
pub fn sheet_for_segment(name: &str) -> &'static str {
    match name {
        "Retail" => "PB",
        "Corporate" => "CB",
        "Investment" => "IB",
        "Total" => "FinSum",
        _ => DEFAULT_SEGMENT_SHEET,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Front-end segment name (`Retail`, `Corporate`, `Investment`, `Total`).
    pub segment: String,
    /// Selected indicator names; unknown names are ignored.
    pub kpis: Vec<String>,
    pub comments: String,
    pub main_documents: Vec<String>,
    pub additional_documents: Vec<String>,
}

impl AnalysisRequest {
    pub fn includes(&self, indicator: MacroIndicator) -> bool {
        self.kpis
            .iter()
            .any(|name| MacroIndicator::from_name(name) == Some(indicator))
    }

    fn document_names(&self) -> Vec<&str> {
        self.main_documents
            .iter()
            .chain(self.additional_documents.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Everything derived from the input files for one request, before the
/// narrative is generated.
#[derive(Debug, Clone)]
pub struct PreparedAnalysis {
    pub segment_key: String,
    pub context: PromptContext,
    pub kpi_series: KpiSeries,
    pub chart: ChartSeries,
    pub composite_chart: Option<ChartSeries>,
    pub attachment: Option<PathBuf>,
    pub business_climate_selected: bool,
    pub composite_selected: bool,
    pub degradations: Vec<Degradation>,
}

fn load_table(
    result: crate::error::Result<IndicatorTable>,
    stage: &str,
    degradations: &mut Vec<Degradation>,
) -> Option<IndicatorTable> {
    Outcome::from_result(result.map(Some), &format!("Loading {} failed", stage))
        .collect_into(degradations, stage)
}

/// Runs every file-based stage of the pipeline.
pub fn prepare_analysis(config: &AnalysisConfig, request: &AnalysisRequest) -> PreparedAnalysis {
    let mut degradations = Vec::new();

    let sheet = sheet_for_segment(&request.segment);
    let segment_key = match config.segment_for_sheet(sheet) {
        Some(segment) => segment.segment_key.clone(),
        None => {
            warn!("Sheet '{}' is not configured, using it as segment key", sheet);
            sheet.to_string()
        }
    };
    info!(
        "Preparing analysis for segment '{}' (sheet '{}')",
        segment_key, sheet
    );

    let business_climate_selected = request.includes(MacroIndicator::BusinessClimate);
    let composite_selected = request.includes(MacroIndicator::CompositeIndex);

    let uploaded_documents_text = collect_uploaded_texts(
        &config.uploads_dir,
        &request.document_names(),
        config.document_char_budget,
    );

    let business_climate = if business_climate_selected {
        load_table(
            load_business_climate(&config.business_climate_path(), config.business_climate_start),
            "business_climate",
            &mut degradations,
        )
    } else {
        None
    };
    let composite = if composite_selected {
        load_table(
            load_composite_index(&config.composite_index_path()),
            "composite_index",
            &mut degradations,
        )
    } else {
        None
    };

    let mapping = extract_kpis(
        &config.workbook_path(),
        &config.segments,
        &config.kpi_rules,
        &config.layout,
    )
    .collect_into(&mut degradations, "kpi_extraction");
    let bank_data = mapping.segment(&segment_key).cloned().unwrap_or_default();

    let asset_quality = (sheet == DEFAULT_SEGMENT_SHEET).then(|| {
        extract_asset_quality(&config.workbook_path())
            .collect_into(&mut degradations, "asset_quality")
    });

    let examples_path = config.examples_path();
    let example = Outcome::from_result(
        std::fs::read_to_string(&examples_path),
        &format!("Reading examples '{}' failed", examples_path.display()),
    )
    .collect_into(&mut degradations, "examples");

    let attachment = if composite_selected {
        let report = config.composite_report_path();
        if report.exists() {
            Some(report)
        } else {
            Outcome::degraded(
                (),
                format!("Composite report '{}' not found", report.display()),
            )
            .collect_into(&mut degradations, "composite_report");
            None
        }
    } else {
        None
    };

    let mut context = PromptContext::new(segment_key.clone(), bank_data);
    context.asset_quality = asset_quality;
    context.business_climate_data = business_climate.as_ref().map(IndicatorTable::to_text);
    context.composite_index_note = composite_selected.then(|| COMPOSITE_REPORT_NOTE.to_string());
    context.composite_index_data = composite.as_ref().map(IndicatorTable::to_text);
    context.user_comments = request.comments.clone();
    context.example = example;
    context.uploaded_documents_text = uploaded_documents_text;

    let kpi_series = context
        .bank_data
        .kpi(PRIMARY_KPI)
        .cloned()
        .unwrap_or_default();

    let overlays: Vec<MacroOverlay<'_>> = business_climate
        .as_ref()
        .map(MacroOverlay::business_climate)
        .into_iter()
        .collect();
    let chart = build_chart(&kpi_series, &overlays).collect_into(&mut degradations, "chart");

    let composite_chart = composite.as_ref().map(|table| {
        build_chart(&kpi_series, &[MacroOverlay::composite_index(table)])
            .collect_into(&mut degradations, "composite_chart")
    });

    PreparedAnalysis {
        segment_key,
        context,
        kpi_series,
        chart,
        composite_chart,
        attachment,
        business_climate_selected,
        composite_selected,
        degradations,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct VarianceAnalysis {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TrendAnalysis {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct AnalysisResult {
    pub variance_analysis: VarianceAnalysis,
    pub trend_analysis: TrendAnalysis,
    /// KPI chart, with the business-climate overlay when selected.
    pub chart: ChartSeries,
    /// KPI chart with the composite-index overlay, when selected and loaded.
    pub pmi_chart: Option<ChartSeries>,
    pub ifo_chart: bool,
    pub pmi_chart_selected: bool,
    pub generation_error: Option<String>,
    pub degradations: Vec<Degradation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct AnalysisResponse {
    pub success: bool,
    pub message: String,
    pub result: AnalysisResult,
}

impl AnalysisResponse {
    pub fn json_schema() -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(schemars::schema_for!(AnalysisResponse))
    }
}

/// Serves analysis requests with one generator and prompt renderer.
pub struct AnalysisService<G, R = InstructionPromptRenderer> {
    config: AnalysisConfig,
    generator: G,
    renderer: R,
}

impl<G: TextGenerator> AnalysisService<G> {
    pub fn new(config: AnalysisConfig, generator: G) -> Self {
        Self {
            config,
            generator,
            renderer: InstructionPromptRenderer,
        }
    }
}

impl<G: TextGenerator, R: PromptRenderer> AnalysisService<G, R> {
    pub fn with_renderer(config: AnalysisConfig, generator: G, renderer: R) -> Self {
        Self {
            config,
            generator,
            renderer,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResponse {
        let prepared = prepare_analysis(&self.config, request);

        let generated = match self.renderer.render(&prepared.context) {
            Ok(prompt) => {
                generate_with_retry(
                    &self.generator,
                    &prompt,
                    prepared.attachment.as_deref(),
                    &self.config.retry,
                )
                .await
            }
            Err(e) => Err(e),
        };

        let (content, generation_error) = match generated {
            Ok(text) => (text, None),
            Err(e) => {
                warn!("Narrative generation failed: {}", e);
                (format!("Error generating analysis: {}", e), Some(e.to_string()))
            }
        };

        info!(
            "Analysis for '{}' completed with {} degradation(s)",
            prepared.segment_key,
            prepared.degradations.len()
        );

        AnalysisResponse {
            success: true,
            message: "Analysis completed successfully".to_string(),
            result: AnalysisResult {
                variance_analysis: VarianceAnalysis {
                    title: "Variance Analysis".to_string(),
                    content,
                },
                trend_analysis: TrendAnalysis {
                    title: "Trend Analysis".to_string(),
                    summary: TREND_SUMMARY.to_string(),
                },
                chart: prepared.chart,
                pmi_chart: prepared.composite_chart,
                ifo_chart: prepared.business_climate_selected,
                pmi_chart_selected: prepared.composite_selected,
                generation_error,
                degradations: prepared.degradations,
            },
        }
    }
}
