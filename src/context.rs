//! Prompt context assembly and rendering.

use serde::Serialize;

use crate::asset_quality::AssetQuality;
use crate::error::Result;
use crate::prompts::ANALYST_INSTRUCTION;
use crate::schema::Segment;

/// Everything the narrative prompt is built from for one request.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub segment: String,
    pub domain: String,
    pub product_type: String,
    pub bank_data: Segment,
    /// Only populated for the whole-bank segment.
    pub asset_quality: Option<AssetQuality>,
    pub business_climate_data: Option<String>,
    pub composite_index_note: Option<String>,
    pub composite_index_data: Option<String>,
    pub user_comments: String,
    pub example: String,
    pub uploaded_documents_text: String,
}

impl PromptContext {
    pub fn new(segment: impl Into<String>, bank_data: Segment) -> Self {
        Self {
            segment: segment.into(),
            domain: "Banking".to_string(),
            product_type: "Loans".to_string(),
            bank_data,
            asset_quality: None,
            business_climate_data: None,
            composite_index_note: None,
            composite_index_data: None,
            user_comments: String::new(),
            example: String::new(),
            uploaded_documents_text: String::new(),
        }
    }
}

pub trait PromptRenderer {
    fn render(&self, context: &PromptContext) -> Result<String>;
}

/// Fixed analyst instruction followed by one section per populated field.
#[derive(Debug, Clone, Default)]
pub struct InstructionPromptRenderer;

impl InstructionPromptRenderer {
    fn section(out: &mut String, title: &str, body: &str) {
        if body.trim().is_empty() {
            return;
        }
        out.push_str("\n## ");
        out.push_str(title);
        out.push('\n');
        out.push_str(body.trim_end());
        out.push('\n');
    }
}

impl PromptRenderer for InstructionPromptRenderer {
    fn render(&self, context: &PromptContext) -> Result<String> {
        let mut out = String::from(ANALYST_INSTRUCTION.trim_start());

        Self::section(
            &mut out,
            "SEGMENT",
            &format!(
                "{} (domain: {}, product type: {})",
                context.segment, context.domain, context.product_type
            ),
        );
        Self::section(
            &mut out,
            "BANK DATA",
            &serde_json::to_string_pretty(&context.bank_data)?,
        );

        if let Some(quality) = context.asset_quality.as_ref().filter(|q| !q.is_empty()) {
            Self::section(
                &mut out,
                "GROSS CARRYING AMOUNT",
                &serde_json::to_string_pretty(&quality.gross_carrying_amount)?,
            );
            Self::section(
                &mut out,
                "ALLOWANCE FOR CREDIT LOSSES",
                &serde_json::to_string_pretty(&quality.allowance_for_credit_losses)?,
            );
        }

        if let Some(data) = &context.business_climate_data {
            Self::section(&mut out, "BUSINESS CLIMATE INDEX", data);
        }
        if let Some(note) = &context.composite_index_note {
            Self::section(&mut out, "COMPOSITE INDEX", note);
        }
        if let Some(data) = &context.composite_index_data {
            Self::section(&mut out, "COMPOSITE INDEX TIME SERIES", data);
        }

        Self::section(&mut out, "ANALYST COMMENTS", &context.user_comments);
        Self::section(&mut out, "UPLOADED DOCUMENTS", &context.uploaded_documents_text);
        Self::section(&mut out, "STYLE EXAMPLES", &context.example);

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{KpiMapping, PeriodValue};

    fn segment() -> Segment {
        let mut builder = KpiMapping::builder();
        builder.record(
            "private_bank",
            "provision_for_credit_losses_bps_avg_loans",
            vec![PeriodValue::new("Q1_2023", "12.5")],
        );
        builder
            .build()
            .segment("private_bank")
            .cloned()
            .unwrap_or_default()
    }

    #[test]
    fn test_render_includes_populated_sections_only() {
        let mut context = PromptContext::new("private_bank", segment());
        context.user_comments = "Focus on mortgages.".to_string();
        context.business_climate_data = Some("Monat/Jahr\tgeschaeftsklima\n".to_string());

        let prompt = InstructionPromptRenderer.render(&context).unwrap();
        assert!(prompt.starts_with("You are a senior credit-risk analyst"));
        assert!(prompt.contains("## SEGMENT\nprivate_bank (domain: Banking, product type: Loans)"));
        assert!(prompt.contains("\"Q1_2023\": \"12.5\""));
        assert!(prompt.contains("## ANALYST COMMENTS\nFocus on mortgages."));
        assert!(prompt.contains("## BUSINESS CLIMATE INDEX"));
        assert!(!prompt.contains("## COMPOSITE INDEX"));
        assert!(!prompt.contains("## UPLOADED DOCUMENTS"));
        assert!(!prompt.contains("## GROSS CARRYING AMOUNT"));
    }

    #[test]
    fn test_context_serializes_for_external_templates() {
        let context = PromptContext::new("total_bank", Segment::default());
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["domain"], "Banking");
        assert_eq!(json["product_type"], "Loans");
        assert!(json["composite_index_note"].is_null());
    }
}
