use segment_kpi_insights::{
    build_chart, extract_kpis, load_business_climate, load_composite_index, AnalysisConfig,
    MacroOverlay, PRIMARY_KPI,
};
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => AnalysisConfig::from_json_file(Path::new(&path))?,
        None => AnalysisConfig::default(),
    };
    let segment_key = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "total_bank".to_string());

    println!("📊 Reading KPIs from {:?}", config.workbook_path());
    let outcome = extract_kpis(
        &config.workbook_path(),
        &config.segments,
        &config.kpi_rules,
        &config.layout,
    );
    if let Some(reason) = outcome.reason() {
        println!("⚠️  Extraction degraded: {}", reason);
    }
    let mapping = outcome.into_value();

    let kpi = mapping
        .kpi(&segment_key, PRIMARY_KPI)
        .cloned()
        .unwrap_or_default();
    println!("   {} periods for '{}'", kpi.len(), segment_key);

    let climate =
        load_business_climate(&config.business_climate_path(), config.business_climate_start).ok();
    let composite = load_composite_index(&config.composite_index_path()).ok();

    let mut overlays = Vec::new();
    if let Some(table) = &climate {
        overlays.push(MacroOverlay::business_climate(table));
    }
    if let Some(table) = &composite {
        overlays.push(MacroOverlay::composite_index(table));
    }

    let chart = build_chart(&kpi, &overlays);
    if let Some(reason) = chart.reason() {
        println!("⚠️  Chart degraded: {}", reason);
    }
    println!("{}", serde_json::to_string_pretty(chart.value())?);
    Ok(())
}
