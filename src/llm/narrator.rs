use log::info;
use std::path::Path;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::generation::TextGenerator;
use crate::llm::client::GeminiClient;
use crate::llm::types::{GenerationConfig, Part};

/// [`TextGenerator`] backed by a shared [`GeminiClient`].
pub struct GeminiNarrator<'a> {
    client: &'a GeminiClient,
    model: String,
    max_output_tokens: u32,
}

impl<'a> GeminiNarrator<'a> {
    pub fn new(client: &'a GeminiClient, model: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_output_tokens,
        }
    }

    pub fn from_config(client: &'a GeminiClient, config: &AnalysisConfig) -> Self {
        Self::new(client, config.model.clone(), config.max_output_tokens)
    }
}

impl TextGenerator for GeminiNarrator<'_> {
    async fn generate(&self, prompt: &str, attachment: Option<&Path>) -> Result<String> {
        let mut parts = vec![Part::text(prompt)];
        if let Some(path) = attachment {
            info!("Uploading attachment '{}'", path.display());
            let document = self.client.upload_document(path).await?;
            parts.push(Part::file(&document));
        }
        self.client
            .generate_text(
                &self.model,
                parts,
                GenerationConfig::narrative(self.max_output_tokens),
            )
            .await
    }
}
