use crate::error::{InsightsError, Result};
use crate::llm::types::*;
use log::debug;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_UPLOAD_URL: &str = "https://generativelanguage.googleapis.com/upload/v1beta/files";
const UPLOAD_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

fn api_error(message: impl Into<String>) -> InsightsError {
    InsightsError::Generation {
        attempts: 1,
        message: message.into(),
    }
}

async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await?;
    Err(api_error(format!("{} failed (status {}): {}", action, status, body)))
}

fn string_field(file: &Value, key: &str) -> Result<String> {
    file.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| api_error(format!("Upload response has no '{}'", key)))
}

fn file_state(file: &Value) -> String {
    file.get("state")
        .and_then(Value::as_str)
        .unwrap_or("PROCESSING")
        .to_string()
}

/// Thin Gemini REST client. Construct once and share by reference.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Reads the key from `GOOGLE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(InsightsError::InvalidConfig(format!(
                "API key not found; set {} in the environment or .env file",
                API_KEY_VAR
            ))),
        }
    }

    /// Resumable upload, then polls until the file is `ACTIVE`.
    pub async fn upload_document(&self, path: &Path) -> Result<RemoteDocument> {
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| api_error(format!("Invalid attachment path '{}'", path.display())))?
            .to_string();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        let bytes = fs::read(path).await?;

        let session_url = self
            .open_upload_session(&display_name, &mime_type, bytes.len())
            .await?;
        let file = self.send_upload_bytes(&session_url, bytes).await?;

        let uri = string_field(&file, "uri")?;
        let name = string_field(&file, "name")?;
        let state = self
            .wait_until_active(&name, file_state(&file), &display_name)
            .await?;

        Ok(RemoteDocument {
            uri,
            name,
            display_name,
            mime_type,
            state,
        })
    }

    async fn open_upload_session(
        &self,
        display_name: &str,
        mime_type: &str,
        length: usize,
    ) -> Result<String> {
        let response = self
            .client
            .post(format!("{}?key={}", GEMINI_UPLOAD_URL, self.api_key))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", length.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let response = ensure_success(response, "Upload session").await?;

        response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| api_error("Upload session returned no upload URL"))
    }

    async fn send_upload_bytes(&self, session_url: &str, bytes: Vec<u8>) -> Result<Value> {
        let response = self
            .client
            .post(session_url)
            .header("Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let mut body: Value = ensure_success(response, "Upload").await?.json().await?;
        body.get_mut("file")
            .map(Value::take)
            .ok_or_else(|| api_error("Upload response has no file object"))
    }

    async fn wait_until_active(
        &self,
        name: &str,
        mut state: String,
        display_name: &str,
    ) -> Result<String> {
        let status_url = format!("{}/{}?key={}", self.base_url, name, self.api_key);
        loop {
            if state == "ACTIVE" {
                return Ok(state);
            }
            if state == "FAILED" {
                return Err(api_error(format!(
                    "Processing of '{}' failed on the server",
                    display_name
                )));
            }
            sleep(UPLOAD_POLL_INTERVAL).await;
            let body: Value = self.client.get(&status_url).send().await?.json().await?;
            state = file_state(body.get("file").unwrap_or(&body));
            debug!("Attachment '{}' state: {}", display_name, state);
        }
    }

    /// Single `generateContent` call; the text parts of the first candidate
    /// are concatenated.
    pub async fn generate_text(
        &self,
        model: &str,
        parts: Vec<Part>,
        generation_config: GenerationConfig,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let payload = GenerateContentRequest {
            contents: vec![Content::user(parts)],
            generation_config,
        };

        let response = self.client.post(&url).json(&payload).send().await?;
        let response = ensure_success(response, "generateContent").await?;

        let body: GenerateContentResponse = response.json().await?;
        let candidate = body
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| api_error("No candidates returned"))?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text),
                Part::FileData { .. } => None,
            })
            .collect();

        if text.is_empty() {
            return Err(api_error("Model returned no text"));
        }
        Ok(text)
    }
}
