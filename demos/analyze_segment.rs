use dotenv::dotenv;
use segment_kpi_insights::llm::{GeminiClient, GeminiNarrator};
use segment_kpi_insights::{AnalysisConfig, AnalysisRequest, AnalysisService};
use std::error::Error;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let config = match std::env::var("INSIGHTS_CONFIG") {
        Ok(path) => AnalysisConfig::from_json_file(Path::new(&path))?,
        Err(_) => AnalysisConfig::default(),
    };
    config.validate()?;

    let request = AnalysisRequest {
        segment: std::env::args().nth(1).unwrap_or_else(|| "Total".to_string()),
        kpis: vec!["Ifo".to_string(), "PMI".to_string()],
        comments: "Comment on the drivers of credit loss provisions.".to_string(),
        ..AnalysisRequest::default()
    };

    println!("🚀 Analyzing segment '{}'...\n", request.segment);

    let client = GeminiClient::from_env()?;
    let narrator = GeminiNarrator::from_config(&client, &config);
    let service = AnalysisService::new(config, narrator);

    let response = service.analyze(&request).await;
    for degradation in &response.result.degradations {
        println!("⚠️  {}: {}", degradation.stage, degradation.reason);
    }
    if let Some(error) = &response.result.generation_error {
        println!("❌ Generation failed: {}", error);
    }

    println!("\n📝 {}\n", response.result.variance_analysis.title);
    println!("{}\n", response.result.variance_analysis.content);
    println!("{}", serde_json::to_string_pretty(&response.result.chart)?);
    Ok(())
}
