//! # Segment KPI Insights
//!
//! Tolerant extraction of bank segment KPIs from a multi-sheet financial
//! workbook, normalization of their reporting periods, and alignment with
//! monthly macro indicators into a chart series that a rendering client can
//! draw as is. The same data feeds the prompt for a generated narrative.
//!
//! ## Core Concepts
//!
//! - **KPI mapping**: `segment -> kpi -> period label -> raw value`, built from
//!   the workbook by ordered keyword rules
//! - **Periods**: quarter labels (`Q1 2023`, `Q1_2023`) sort before fiscal-year
//!   labels (`FY2023`); year-over-year columns (`... vs ...`) are dropped
//! - **Macro series**: monthly business-climate and composite indices, reduced
//!   per period by last observation or by mean
//! - **Outcomes**: every stage returns a usable value; failures are carried as
//!   [`Outcome::Degraded`] instead of aborting the request
//!
//! ## Example
//!
//! ```rust,ignore
//! use segment_kpi_insights::*;
//!
//! let config = AnalysisConfig::default();
//! let mapping = extract_kpis(
//!     &config.workbook_path(),
//!     &config.segments,
//!     &config.kpi_rules,
//!     &config.layout,
//! )
//! .into_value();
//!
//! let kpi = mapping.kpi("total_bank", PRIMARY_KPI).cloned().unwrap_or_default();
//! let climate = load_business_climate(&config.business_climate_path(), None)?;
//! let chart = build_chart(&kpi, &[MacroOverlay::business_climate(&climate)]).into_value();
//! println!("{}", serde_json::to_string_pretty(&chart)?);
//! ```

pub mod align;
pub mod asset_quality;
pub mod chart;
pub mod config;
pub mod context;
pub mod documents;
pub mod error;
pub mod generation;
pub mod indicators;
pub mod outcome;
pub mod period;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod utils;
pub mod workbook;

#[cfg(feature = "gemini")]
pub mod llm;

pub use align::{align, align_labels, Aggregation, IndicatorSelector};
pub use asset_quality::{extract_asset_quality, AssetQuality, AssetQualityTable};
pub use chart::{build_chart, clean_value, ChartDataset, ChartSeries, MacroOverlay};
pub use config::*;
pub use context::{InstructionPromptRenderer, PromptContext, PromptRenderer};
pub use documents::{collect_uploaded_texts, extract_document, extract_text, DocumentKind};
pub use error::{InsightsError, Result};
pub use generation::{generate_with_retry, TextGenerator};
pub use indicators::{
    load_business_climate, load_composite_index, IndicatorTable, MacroObservation, MacroSeries,
};
pub use outcome::{Degradation, Outcome};
pub use period::{sort_periods, PeriodKey};
pub use pipeline::*;
pub use schema::*;
pub use workbook::{extract_kpis, RawWorkbookRow};
